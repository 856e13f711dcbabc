//! Deployment models

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use launchpad_models::DeploymentResponse;
use serde::{Deserialize, Serialize};

use crate::deploy::fsm::DeploymentStatus;
use crate::models::project::ProjectType;

/// Why a deployment attempt was created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Push,
    Manual,
    Webhook,
    Retry,
    Rollback,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Push => "push",
            Trigger::Manual => "manual",
            Trigger::Webhook => "webhook",
            Trigger::Retry => "retry",
            Trigger::Rollback => "rollback",
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Effective build configuration of one attempt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfiguration {
    pub build_command: Option<String>,
    pub install_command: Option<String>,
    pub output_directory: String,
    #[serde(default)]
    pub env_vars: BTreeMap<String, String>,
}

/// Call-site overrides supplied when creating a deployment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigOverrides {
    pub project_type: Option<ProjectType>,
    pub build_command: Option<String>,
    pub install_command: Option<String>,
    pub output_directory: Option<String>,
    pub env_vars: Option<BTreeMap<String, String>>,
}

/// One deployment attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub id: String,
    pub repository_id: String,
    pub project_id: String,

    pub commit_hash: String,
    pub branch: String,
    pub trigger: Trigger,

    pub project_type: ProjectType,
    pub config: BuildConfiguration,

    pub status: DeploymentStatus,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Seconds between start (or creation) and completion
    pub duration_secs: Option<i64>,

    pub preview_url: Option<String>,
    #[serde(default)]
    pub build_log: String,
    #[serde(default)]
    pub deploy_log: String,
    pub error_message: Option<String>,

    /// Same-commit attempt number, starting at 1
    #[serde(default = "first_attempt")]
    pub attempt: u32,
    /// Record a retry or rollback was spawned from
    pub parent_id: Option<String>,
}

fn first_attempt() -> u32 {
    1
}

impl DeploymentRecord {
    /// Concatenated build and deploy logs plus the error message
    pub fn combined_log(&self) -> String {
        let mut text = String::with_capacity(self.build_log.len() + self.deploy_log.len() + 64);
        text.push_str(&self.build_log);
        if !self.deploy_log.is_empty() {
            text.push('\n');
            text.push_str(&self.deploy_log);
        }
        if let Some(error) = &self.error_message {
            text.push('\n');
            text.push_str(error);
        }
        text
    }

    pub fn to_response(&self) -> DeploymentResponse {
        DeploymentResponse {
            id: self.id.clone(),
            repository_id: self.repository_id.clone(),
            project_id: self.project_id.clone(),
            commit_hash: self.commit_hash.clone(),
            branch: self.branch.clone(),
            trigger: self.trigger.to_string(),
            project_type: self.project_type.to_string(),
            status: self.status.to_string(),
            build_command: self.config.build_command.clone(),
            install_command: self.config.install_command.clone(),
            output_directory: self.config.output_directory.clone(),
            env_var_names: self.config.env_vars.keys().cloned().collect(),
            preview_url: self.preview_url.clone(),
            error_message: self.error_message.clone(),
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            build_duration_secs: self.duration_secs,
            attempt: self.attempt,
            parent_id: self.parent_id.clone(),
        }
    }
}

/// Status change requested through the deployment service
#[derive(Debug, Clone, Default)]
pub struct StatusUpdate {
    pub status: DeploymentStatus,
    pub preview_url: Option<String>,
    pub build_log: Option<String>,
    pub deploy_log: Option<String>,
    pub error_message: Option<String>,
}

impl StatusUpdate {
    pub fn new(status: DeploymentStatus) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    pub fn with_build_log(mut self, log: impl Into<String>) -> Self {
        self.build_log = Some(log.into());
        self
    }

    pub fn with_deploy_log(mut self, log: impl Into<String>) -> Self {
        self.deploy_log = Some(log.into());
        self
    }

    pub fn with_preview_url(mut self, url: impl Into<String>) -> Self {
        self.preview_url = Some(url.into());
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}
