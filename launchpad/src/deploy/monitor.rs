//! Stuck-deployment sweep and rolling metrics

use std::sync::Arc;

use chrono::{Duration, Utc};
use launchpad_models::MetricsResponse;
use tracing::{info, warn};

use crate::deploy::fsm::DeploymentStatus;
use crate::deploy::lifecycle::Lifecycle;
use crate::errors::PipelineError;
use crate::models::deployment::DeploymentRecord;
use crate::store::{DeploymentQuery, DeploymentStore};

pub struct DeploymentMonitor {
    store: Arc<dyn DeploymentStore>,
    lifecycle: Arc<Lifecycle>,
    stuck_timeout: Duration,
}

impl DeploymentMonitor {
    pub fn new(
        store: Arc<dyn DeploymentStore>,
        lifecycle: Arc<Lifecycle>,
        stuck_timeout: Duration,
    ) -> Self {
        Self {
            store,
            lifecycle,
            stuck_timeout,
        }
    }

    /// Fail every building or deploying record that started more than the
    /// stuck timeout ago. Returns the records that were failed.
    pub async fn scan_active(&self) -> Result<Vec<DeploymentRecord>, PipelineError> {
        let active = self
            .store
            .list(&DeploymentQuery::all().with_statuses(&[
                DeploymentStatus::Building,
                DeploymentStatus::Deploying,
            ]))
            .await?;

        let cutoff = Utc::now() - self.stuck_timeout;
        let mut failed = Vec::new();
        for record in active {
            if record.started_at.is_none_or(|started| started >= cutoff) {
                continue;
            }

            let message = format!(
                "deployment timed out after {} minutes in {}",
                self.stuck_timeout.num_minutes(),
                record.status
            );
            if let Some(record) = self
                .lifecycle
                .fail_if_stale(&record.id, cutoff, message)
                .await?
            {
                warn!(deployment_id = %record.id, "Failed stuck deployment");
                failed.push(record);
            }
        }

        if !failed.is_empty() {
            info!("Monitor failed {} stuck deployments", failed.len());
        }
        Ok(failed)
    }

    /// Success and latency over records created in the last `window_hours`
    pub async fn metrics(&self, window_hours: u32) -> Result<MetricsResponse, PipelineError> {
        let since = Utc::now() - Duration::hours(i64::from(window_hours));
        let records = self
            .store
            .list(&DeploymentQuery::all().created_after(since))
            .await?;

        let mut metrics = MetricsResponse {
            window_hours,
            ..Default::default()
        };
        if records.is_empty() {
            return Ok(metrics);
        }

        metrics.total = records.len();
        metrics.successful = records
            .iter()
            .filter(|r| r.status == DeploymentStatus::Success)
            .count();
        metrics.failed = records
            .iter()
            .filter(|r| r.status == DeploymentStatus::Failed)
            .count();
        metrics.success_rate = metrics.successful as f64 / metrics.total as f64 * 100.0;

        let durations: Vec<i64> = records
            .iter()
            .filter(|r| r.completed_at.is_some())
            .filter_map(|r| r.duration_secs)
            .collect();
        if !durations.is_empty() {
            metrics.avg_duration_secs =
                durations.iter().sum::<i64>() as f64 / durations.len() as f64;
        }
        Ok(metrics)
    }
}
