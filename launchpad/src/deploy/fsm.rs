//! Finite state machine for deployment records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::PipelineError;
use crate::models::deployment::{DeploymentRecord, StatusUpdate};

/// Deployment status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    /// Created, waiting for the executor
    #[default]
    Pending,

    /// Source checkout and build in progress
    Building,

    /// Uploading the build output to the hosting platform
    Deploying,

    /// Published with a preview URL
    Success,

    /// A step failed or the attempt timed out
    Failed,

    /// Cancelled before reaching another terminal state
    Cancelled,
}

impl DeploymentStatus {
    pub const ALL: [DeploymentStatus; 6] = [
        DeploymentStatus::Pending,
        DeploymentStatus::Building,
        DeploymentStatus::Deploying,
        DeploymentStatus::Success,
        DeploymentStatus::Failed,
        DeploymentStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::Pending => "pending",
            DeploymentStatus::Building => "building",
            DeploymentStatus::Deploying => "deploying",
            DeploymentStatus::Success => "success",
            DeploymentStatus::Failed => "failed",
            DeploymentStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeploymentStatus::Success | DeploymentStatus::Failed | DeploymentStatus::Cancelled
        )
    }

    /// Whether `next` may follow `self`.
    ///
    /// A non-terminal status may be re-entered to append logs.
    pub fn can_transition_to(&self, next: DeploymentStatus) -> bool {
        use DeploymentStatus::*;

        match (*self, next) {
            (from, _) if from.is_terminal() => false,
            (_, Cancelled) => true,
            (Pending, Pending) | (Pending, Building) => true,
            (Building, Building) | (Building, Deploying) | (Building, Failed) => true,
            (Deploying, Deploying) | (Deploying, Success) | (Deploying, Failed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeploymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeploymentStatus::ALL
            .iter()
            .find(|status| status.as_str() == s.trim().to_lowercase())
            .copied()
            .ok_or_else(|| format!("Invalid deployment status: {}", s))
    }
}

/// Apply a status update to a record in place.
///
/// Sets `started_at` on first entry into BUILDING or DEPLOYING, sets
/// `completed_at` and the duration on entry into a terminal status, and
/// appends (never replaces) log text.
pub fn apply_update(
    record: &mut DeploymentRecord,
    update: &StatusUpdate,
    now: DateTime<Utc>,
) -> Result<(), PipelineError> {
    let from = record.status;
    let to = update.status;

    if !from.can_transition_to(to) {
        return Err(PipelineError::InvalidState(format!(
            "deployment {} cannot move from {} to {}",
            record.id, from, to
        )));
    }

    if matches!(to, DeploymentStatus::Building | DeploymentStatus::Deploying)
        && record.started_at.is_none()
    {
        record.started_at = Some(now);
    }

    if let Some(log) = &update.build_log {
        append_log(&mut record.build_log, log);
    }
    if let Some(log) = &update.deploy_log {
        append_log(&mut record.deploy_log, log);
    }

    if to == DeploymentStatus::Success {
        if let Some(url) = &update.preview_url {
            record.preview_url = Some(url.clone());
        }
    }
    if to == DeploymentStatus::Failed {
        record.error_message = update
            .error_message
            .clone()
            .or_else(|| Some("deployment failed".to_string()));
    } else if to == DeploymentStatus::Cancelled {
        if let Some(message) = &update.error_message {
            record.error_message = Some(message.clone());
        }
    }

    if to.is_terminal() {
        let start = record.started_at.unwrap_or(record.created_at);
        let completed = if now < start { start } else { now };
        record.completed_at = Some(completed);
        record.duration_secs = Some((completed - start).num_seconds().max(0));
    }

    record.status = to;
    Ok(())
}

fn append_log(target: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    if !target.is_empty() && !target.ends_with('\n') {
        target.push('\n');
    }
    target.push_str(text);
}
