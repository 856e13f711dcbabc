//! Repository models (owned by the repository collaborator)

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::project::ProjectType;

/// Deployment configuration stored on a repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentSettings {
    /// Deploy on push; manual, webhook, retry and rollback triggers ignore it
    pub auto_deploy: bool,
    pub build_command: Option<String>,
    pub install_command: Option<String>,
    pub output_directory: Option<String>,
    pub env_vars: BTreeMap<String, String>,
    pub project_type: Option<ProjectType>,
}

impl Default for DeploymentSettings {
    fn default() -> Self {
        Self {
            auto_deploy: true,
            build_command: None,
            install_command: None,
            output_directory: None,
            env_vars: BTreeMap::new(),
            project_type: None,
        }
    }
}

/// Last known tree of the repository's default branch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeSnapshot {
    pub files: Vec<String>,
    pub package_json: Option<String>,
    pub requirements_txt: Option<String>,
}

/// A repository that can be deployed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub clone_url: String,
    #[serde(default = "default_branch")]
    pub default_branch: String,
    #[serde(default)]
    pub settings: DeploymentSettings,
    #[serde(default)]
    pub tree: TreeSnapshot,
}

fn default_branch() -> String {
    "main".to_string()
}
