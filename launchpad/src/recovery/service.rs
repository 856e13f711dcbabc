//! Failure analysis, auto-retry and rollback

use std::sync::Arc;

use chrono::{Duration, Utc};
use launchpad_models::{EventKind, HealthScoreResponse};
use serde::Serialize;
use tracing::{debug, info};

use crate::deploy::fsm::DeploymentStatus;
use crate::deploy::service::{DeploymentService, NewAttempt};
use crate::errors::PipelineError;
use crate::models::deployment::{DeploymentRecord, Trigger};
use crate::recovery::analyzer::{ErrorAnalysis, ErrorAnalyzer, ErrorCategory, ErrorSeverity};
use crate::recovery::health;
use crate::store::{DeploymentQuery, DeploymentStore};

/// Rollback targets and similar failures offered per analysis
const HISTORY_LIMIT: usize = 5;

pub const DEFAULT_HEALTH_WINDOW_DAYS: u32 = 30;

/// What an operator can do about a failed deployment
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryOptions {
    pub can_retry: bool,
    /// Successful deployments older than the failure, newest first
    pub rollback_targets: Vec<DeploymentRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    pub deployment_id: String,
    pub error_analysis: ErrorAnalysis,
    pub recovery_options: RecoveryOptions,
    pub recovery_plan: Vec<String>,
    pub similar_failures: Vec<DeploymentRecord>,
    pub auto_retry_recommended: bool,
    pub rollback_available: bool,
}

pub struct RecoveryService {
    store: Arc<dyn DeploymentStore>,
    deployments: Arc<DeploymentService>,
    analyzer: ErrorAnalyzer,
    max_attempts_per_commit: u32,
}

impl RecoveryService {
    pub fn new(
        store: Arc<dyn DeploymentStore>,
        deployments: Arc<DeploymentService>,
        analyzer: ErrorAnalyzer,
        max_attempts_per_commit: u32,
    ) -> Self {
        Self {
            store,
            deployments,
            analyzer,
            max_attempts_per_commit,
        }
    }

    pub fn analyzer(&self) -> &ErrorAnalyzer {
        &self.analyzer
    }

    fn analyze_record(&self, record: &DeploymentRecord) -> ErrorAnalysis {
        self.analyzer
            .analyze(&record.combined_log(), record.project_type)
    }

    /// Classify a FAILED deployment and list the ways out of it
    pub async fn analyze_failure(&self, id: &str) -> Result<FailureReport, PipelineError> {
        let record = self.deployments.get(id).await?;
        if record.status != DeploymentStatus::Failed {
            return Err(PipelineError::InvalidState(format!(
                "deployment {id} is {}, only failed deployments can be analyzed",
                record.status
            )));
        }

        let analysis = self.analyze_record(&record);
        let rollback_targets = self.rollback_targets(&record, HISTORY_LIMIT).await?;
        let similar_failures: Vec<DeploymentRecord> = self
            .store
            .list(
                &DeploymentQuery::repository(&record.repository_id)
                    .with_status(DeploymentStatus::Failed),
            )
            .await?
            .into_iter()
            .filter(|r| r.id != record.id)
            .take(HISTORY_LIMIT)
            .collect();

        let auto_retry_recommended = should_auto_retry(&analysis);
        let rollback_available = !rollback_targets.is_empty();
        let recovery_plan = recovery_plan(&analysis);

        Ok(FailureReport {
            deployment_id: record.id,
            recovery_options: RecoveryOptions {
                can_retry: auto_retry_recommended,
                rollback_targets,
            },
            error_analysis: analysis,
            recovery_plan,
            similar_failures,
            auto_retry_recommended,
            rollback_available,
        })
    }

    /// Retry a failed deployment with the same commit and configuration.
    ///
    /// Returns `None` when the failure is not retryable, the record already
    /// has a retry, or the commit has used up its attempts.
    pub async fn auto_retry(&self, id: &str) -> Result<Option<DeploymentRecord>, PipelineError> {
        let record = self.deployments.get(id).await?;
        if record.status != DeploymentStatus::Failed {
            debug!(deployment_id = %id, "Not retrying a {} deployment", record.status);
            return Ok(None);
        }

        let analysis = self.analyze_record(&record);
        if !should_auto_retry(&analysis) {
            debug!(
                deployment_id = %id,
                "Not retrying {} failure ({})",
                analysis.category,
                analysis.severity
            );
            return Ok(None);
        }

        let siblings = self
            .store
            .list(&DeploymentQuery::repository(&record.repository_id))
            .await?;
        if siblings
            .iter()
            .any(|r| r.trigger == Trigger::Retry && r.parent_id.as_deref() == Some(id))
        {
            debug!(deployment_id = %id, "Deployment already retried");
            return Ok(None);
        }

        // rollbacks redeploy an older commit and do not spend its budget
        let attempts = siblings
            .iter()
            .filter(|r| r.commit_hash == record.commit_hash && r.trigger != Trigger::Rollback)
            .count();
        if attempts >= self.max_attempts_per_commit as usize {
            info!(
                deployment_id = %id,
                "Commit {} reached {} attempts, not retrying",
                record.commit_hash,
                attempts
            );
            return Ok(None);
        }

        let retry = self
            .deployments
            .create_with_config(NewAttempt::from_record(&record, Trigger::Retry, id))
            .await?;
        info!(
            deployment_id = %retry.id,
            "Scheduled retry of {} after {} failure",
            id,
            analysis.category
        );
        self.deployments
            .lifecycle()
            .announce(EventKind::RetryScheduled, &retry)
            .await;
        Ok(Some(retry))
    }

    /// Redeploy a known good commit.
    ///
    /// Without `target_id`, the newest successful deployment older than `id`
    /// is used.
    pub async fn rollback(
        &self,
        id: &str,
        target_id: Option<&str>,
    ) -> Result<DeploymentRecord, PipelineError> {
        let record = self.deployments.get(id).await?;

        let target = match target_id {
            Some(target_id) => {
                let target = self.deployments.get(target_id).await?;
                if target.status != DeploymentStatus::Success {
                    return Err(PipelineError::InvalidState(format!(
                        "rollback target {target_id} is {}, not success",
                        target.status
                    )));
                }
                if target.repository_id != record.repository_id {
                    return Err(PipelineError::InvalidState(format!(
                        "rollback target {target_id} belongs to another repository"
                    )));
                }
                target
            }
            None => self
                .rollback_targets(&record, 1)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    PipelineError::InvalidState(format!(
                        "no successful deployment before {id} to roll back to"
                    ))
                })?,
        };

        let rollback = self
            .deployments
            .create_with_config(NewAttempt::from_record(&target, Trigger::Rollback, id))
            .await?;
        info!(
            deployment_id = %rollback.id,
            "Rolling back {} to {} ({})",
            id,
            target.id,
            target.commit_hash
        );
        self.deployments
            .lifecycle()
            .announce(EventKind::RollbackStarted, &rollback)
            .await;
        Ok(rollback)
    }

    /// Health of a repository over the last `window_days`
    pub async fn health_score(
        &self,
        repository_id: &str,
        window_days: u32,
    ) -> Result<HealthScoreResponse, PipelineError> {
        let since = Utc::now() - Duration::days(i64::from(window_days));
        let records = self
            .store
            .list(&DeploymentQuery::repository(repository_id).created_after(since))
            .await?;
        Ok(health::score(
            repository_id,
            window_days,
            &records,
            &self.analyzer,
        ))
    }

    async fn rollback_targets(
        &self,
        record: &DeploymentRecord,
        limit: usize,
    ) -> Result<Vec<DeploymentRecord>, PipelineError> {
        self.store
            .list(
                &DeploymentQuery::repository(&record.repository_id)
                    .with_status(DeploymentStatus::Success)
                    .created_before(record.created_at)
                    .limit(limit),
            )
            .await
    }
}

/// Only transient categories below critical severity are retried
pub fn should_auto_retry(analysis: &ErrorAnalysis) -> bool {
    analysis.severity != ErrorSeverity::Critical
        && matches!(
            analysis.category,
            ErrorCategory::NetworkError | ErrorCategory::PlatformError | ErrorCategory::Timeout
        )
}

fn recovery_plan(analysis: &ErrorAnalysis) -> Vec<String> {
    let mut plan = Vec::new();
    if analysis.severity == ErrorSeverity::Critical {
        plan.push("Investigate immediately: the failure is critical".to_string());
    }

    let steps: &[&str] = match analysis.category {
        ErrorCategory::BuildFailure => &[
            "Reproduce the build locally",
            "Fix the first compiler or bundler error and push a new commit",
        ],
        ErrorCategory::DependencyError => &[
            "Reinstall dependencies from a clean state",
            "Pin or add the missing packages",
        ],
        ErrorCategory::ConfigurationError => &[
            "Review build command, output directory and environment variables",
            "Redeploy after correcting the configuration",
        ],
        ErrorCategory::ResourceLimit => &[
            "Reduce memory or disk usage of the build",
            "Redeploy once the build fits the limits",
        ],
        ErrorCategory::NetworkError => &["Retry the deployment"],
        ErrorCategory::PlatformError => &[
            "Check the hosting platform status and credentials",
            "Retry once the platform is available",
        ],
        ErrorCategory::Timeout => &[
            "Find the step that stalled in the logs",
            "Retry the deployment",
        ],
        ErrorCategory::PermissionError => &[
            "Verify repository and platform credentials",
            "Fix file permissions and redeploy",
        ],
        ErrorCategory::Unknown => &["Read the full build and deploy logs"],
    };
    plan.extend(steps.iter().map(|s| s.to_string()));
    plan.push("Consider rolling back to the last successful deployment".to_string());
    plan
}
