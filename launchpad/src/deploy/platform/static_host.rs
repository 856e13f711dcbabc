//! Local static hosting

use async_trait::async_trait;
use tracing::info;

use crate::deploy::platform::{slugify, HostingPlatform, PublishOutcome, PublishRequest};
use crate::errors::PipelineError;
use crate::filesys::dir::Dir;

/// Copies build output under a sites directory served by a local web server
pub struct StaticHostPlatform {
    sites_dir: Dir,
    base_domain: String,
}

impl StaticHostPlatform {
    pub fn new(sites_dir: Dir, base_domain: impl Into<String>) -> Self {
        Self {
            sites_dir,
            base_domain: base_domain.into(),
        }
    }
}

#[async_trait]
impl HostingPlatform for StaticHostPlatform {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome, PipelineError> {
        if !request.output_dir.is_dir() {
            return Err(PipelineError::PlatformError(format!(
                "output directory not found: {}",
                request.output_dir.display()
            )));
        }

        let site = self.sites_dir.subdir(&request.deployment_id);
        let copied = site.replace_with_copy_of(&request.output_dir).await?;
        let preview_url = format!(
            "https://{}.{}",
            slugify(&request.deployment_id),
            self.base_domain
        );
        info!(
            deployment_id = %request.deployment_id,
            "Published {} files to {}",
            copied,
            site.path().display()
        );

        Ok(PublishOutcome {
            log: format!(
                "Copied {} files to {}\nPreview available at {}",
                copied,
                site.path().display(),
                preview_url
            ),
            preview_url,
        })
    }
}
