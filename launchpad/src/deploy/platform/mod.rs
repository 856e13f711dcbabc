//! Hosting platforms that publish build output

pub mod static_host;
pub mod vercel;

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::errors::PipelineError;
use crate::models::project::ProjectType;

pub use static_host::StaticHostPlatform;
pub use vercel::VercelPlatform;

/// What to publish
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub deployment_id: String,
    pub project_id: String,
    pub repository_name: String,
    pub project_type: ProjectType,
    /// Build output directory inside the working tree
    pub output_dir: PathBuf,
    pub env_vars: BTreeMap<String, String>,
}

/// Result of a successful publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub preview_url: String,
    pub log: String,
}

/// Uploads build output and returns a public preview URL
#[async_trait]
pub trait HostingPlatform: Send + Sync {
    fn name(&self) -> &'static str;

    async fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome, PipelineError>;
}

/// Lowercase DNS-safe slug of at most 52 characters
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug: String = slug.trim_matches('-').chars().take(52).collect();
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "site".to_string()
    } else {
        slug
    }
}
