//! Vercel deployments API client

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use base64::Engine;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::deploy::platform::{slugify, HostingPlatform, PublishOutcome, PublishRequest};
use crate::errors::PipelineError;
use crate::http::client::HttpClient;
use crate::utils::sha256_hash;

/// Upper bound on the inline payload
const MAX_INLINE_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Serialize)]
struct InlineFile {
    file: String,
    data: String,
    encoding: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectSettings {
    framework: Option<String>,
}

#[derive(Debug, Serialize)]
struct BuildSettings {
    env: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateDeployment {
    name: String,
    files: Vec<InlineFile>,
    project_settings: ProjectSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    build: Option<BuildSettings>,
    meta: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedDeployment {
    id: String,
    url: String,
    #[serde(default)]
    ready_state: Option<String>,
}

/// Publishes build output through `POST /v13/deployments` with inline files
pub struct VercelPlatform {
    client: HttpClient,
    team_id: Option<String>,
}

impl VercelPlatform {
    pub fn new(
        api_url: &str,
        token: SecretString,
        team_id: Option<String>,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            client: HttpClient::new(api_url)?.with_token(token),
            team_id,
        })
    }

    fn deployments_path(&self) -> String {
        match &self.team_id {
            Some(team_id) => format!("/v13/deployments?teamId={team_id}"),
            None => "/v13/deployments".to_string(),
        }
    }
}

/// Read every file under `root` as base64, with paths relative to `root`
fn collect_files(root: &Path) -> Result<(Vec<InlineFile>, u64, String), PipelineError> {
    let mut files = Vec::new();
    let mut total = 0u64;
    let mut digest_input = Vec::new();

    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| PipelineError::IoError(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| PipelineError::Internal(e.to_string()))?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        let bytes = std::fs::read(entry.path())?;
        total += bytes.len() as u64;
        if total > MAX_INLINE_BYTES {
            return Err(PipelineError::PlatformError(format!(
                "build output exceeds the {} MiB inline upload limit",
                MAX_INLINE_BYTES / 1024 / 1024
            )));
        }

        digest_input.extend_from_slice(name.as_bytes());
        digest_input.extend_from_slice(&bytes);
        files.push(InlineFile {
            file: name,
            data: base64::engine::general_purpose::STANDARD.encode(&bytes),
            encoding: "base64",
        });
    }

    Ok((files, total, sha256_hash(&digest_input)))
}

fn framework_slug(request: &PublishRequest) -> Option<String> {
    use crate::models::project::ProjectType;

    let slug = match request.project_type {
        ProjectType::React => "create-react-app",
        ProjectType::NextJs => "nextjs",
        ProjectType::Vue => "vue",
        ProjectType::Angular => "angular",
        ProjectType::Svelte => "svelte",
        ProjectType::Nuxt => "nuxtjs",
        ProjectType::Gatsby => "gatsby",
        ProjectType::NodeJs
        | ProjectType::Django
        | ProjectType::Flask
        | ProjectType::Python
        | ProjectType::Static
        | ProjectType::Unknown => return None,
    };
    Some(slug.to_string())
}

#[async_trait]
impl HostingPlatform for VercelPlatform {
    fn name(&self) -> &'static str {
        "vercel"
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome, PipelineError> {
        if !request.output_dir.is_dir() {
            return Err(PipelineError::PlatformError(format!(
                "output directory not found: {}",
                request.output_dir.display()
            )));
        }

        let root = request.output_dir.clone();
        let (files, total_bytes, digest) =
            tokio::task::spawn_blocking(move || collect_files(&root))
                .await
                .map_err(|e| PipelineError::Internal(e.to_string()))??;
        let file_count = files.len();
        debug!(
            deployment_id = %request.deployment_id,
            "Uploading {} files ({} bytes) to Vercel",
            file_count,
            total_bytes
        );

        let body = CreateDeployment {
            name: slugify(&request.repository_name),
            files,
            project_settings: ProjectSettings {
                framework: framework_slug(request),
            },
            build: (!request.env_vars.is_empty()).then(|| BuildSettings {
                env: request.env_vars.clone(),
            }),
            meta: [
                ("launchpadDeploymentId".to_string(), request.deployment_id.clone()),
                ("launchpadProjectId".to_string(), request.project_id.clone()),
            ]
            .into_iter()
            .collect(),
        };

        let created: CreatedDeployment = self.client.post(&self.deployments_path(), &body).await?;
        let preview_url = if created.url.starts_with("http") {
            created.url.clone()
        } else {
            format!("https://{}", created.url)
        };
        info!(
            deployment_id = %request.deployment_id,
            "Vercel deployment {} created at {}",
            created.id,
            preview_url
        );

        Ok(PublishOutcome {
            log: format!(
                "Uploaded {} files ({} bytes, sha256 {})\nVercel deployment {} ({})\nPreview available at {}",
                file_count,
                total_bytes,
                digest,
                created.id,
                created.ready_state.as_deref().unwrap_or("QUEUED"),
                preview_url
            ),
            preview_url,
        })
    }
}
