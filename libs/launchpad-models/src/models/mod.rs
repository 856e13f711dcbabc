//! Projection models

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of deployment event delivered to the notification collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Succeeded,
    Failed,
    Cancelled,
    TimedOut,
    RetryScheduled,
    RollbackStarted,
}

/// Deployment event payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentEvent {
    pub kind: EventKind,
    pub deployment_id: String,
    pub repository_id: String,
    pub project_id: String,
    pub commit_hash: String,
    pub branch: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Record this event's deployment was spawned from (retry / rollback)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub in_flight: usize,
}

/// Version response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Rolling deployment metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub window_hours: u32,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub success_rate: f64,
    pub avg_duration_secs: f64,
}

/// One failure category within a health report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureTrend {
    pub category: String,
    pub count: usize,
    pub percentage: f64,
}

/// Repository health report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthScoreResponse {
    pub repository_id: String,
    pub window_days: u32,
    pub score: u32,
    pub total_deployments: usize,
    pub success_rate: f64,
    pub avg_duration_secs: f64,
    pub failure_trends: Vec<FailureTrend>,
    pub recommendations: Vec<String>,
}

/// Read-only view of a deployment record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentResponse {
    pub id: String,
    pub repository_id: String,
    pub project_id: String,
    pub commit_hash: String,
    pub branch: String,
    pub trigger: String,
    pub project_type: String,
    pub status: String,
    pub build_command: Option<String>,
    pub install_command: Option<String>,
    pub output_directory: String,
    pub env_var_names: Vec<String>,
    pub preview_url: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub build_duration_secs: Option<i64>,
    pub attempt: u32,
    pub parent_id: Option<String>,
}

/// Aggregated deployment statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsResponse {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_trigger: BTreeMap<String, usize>,
    pub avg_duration_secs: Option<f64>,
    pub recent: Vec<DeploymentResponse>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}
