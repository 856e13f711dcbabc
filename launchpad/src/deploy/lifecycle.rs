//! Status transitions over the record store

use std::sync::Arc;

use chrono::{DateTime, Utc};
use launchpad_models::EventKind;
use tracing::{debug, info};

use crate::deploy::fsm::{apply_update, DeploymentStatus};
use crate::errors::PipelineError;
use crate::integrations::notify::{event_for, notify_quietly, Notifier};
use crate::models::deployment::{DeploymentRecord, StatusUpdate};
use crate::store::DeploymentStore;

/// The single writer of deployment status.
///
/// Every transition is a compare-and-transition inside the store's write
/// lock, and every terminal transition is reported to the notifier.
pub struct Lifecycle {
    store: Arc<dyn DeploymentStore>,
    notifier: Arc<dyn Notifier>,
}

impl Lifecycle {
    pub fn new(store: Arc<dyn DeploymentStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    pub fn store(&self) -> &Arc<dyn DeploymentStore> {
        &self.store
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Apply a status update; fails with `NotFound` or `InvalidState`
    pub async fn update_status(
        &self,
        id: &str,
        update: StatusUpdate,
    ) -> Result<DeploymentRecord, PipelineError> {
        let status = update.status;
        let record = self
            .store
            .update(
                id,
                Box::new(move |record| apply_update(record, &update, Utc::now())),
            )
            .await?;
        debug!(deployment_id = %id, "Deployment moved to {}", status);

        if let Some(kind) = terminal_event_kind(status) {
            self.announce(kind, &record).await;
        }
        Ok(record)
    }

    /// Cancel a non-terminal deployment
    pub async fn cancel(
        &self,
        id: &str,
        reason: Option<String>,
    ) -> Result<DeploymentRecord, PipelineError> {
        let mut update = StatusUpdate::new(DeploymentStatus::Cancelled);
        update.error_message = reason;
        let record = self.update_status(id, update).await?;
        info!(deployment_id = %id, "Deployment cancelled");
        Ok(record)
    }

    /// Fail a deployment that is still building or deploying and started
    /// before `cutoff`.
    ///
    /// The check runs under the store lock, so a deployment that completed
    /// concurrently is left alone and `None` is returned.
    pub async fn fail_if_stale(
        &self,
        id: &str,
        cutoff: DateTime<Utc>,
        message: String,
    ) -> Result<Option<DeploymentRecord>, PipelineError> {
        let update = StatusUpdate::new(DeploymentStatus::Failed).with_error(message);
        let result = self
            .store
            .update(
                id,
                Box::new(move |record| {
                    let stale = matches!(
                        record.status,
                        DeploymentStatus::Building | DeploymentStatus::Deploying
                    ) && record.started_at.is_some_and(|started| started < cutoff);
                    if !stale {
                        return Err(PipelineError::InvalidState(format!(
                            "deployment {} is no longer stale",
                            record.id
                        )));
                    }
                    apply_update(record, &update, Utc::now())
                }),
            )
            .await;

        match result {
            Ok(record) => {
                self.announce(EventKind::TimedOut, &record).await;
                Ok(Some(record))
            }
            Err(PipelineError::InvalidState(reason)) => {
                debug!(deployment_id = %id, "Skipping timeout: {}", reason);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Report an event for a record
    pub async fn announce(&self, kind: EventKind, record: &DeploymentRecord) {
        notify_quietly(self.notifier.as_ref(), event_for(kind, record)).await;
    }
}

fn terminal_event_kind(status: DeploymentStatus) -> Option<EventKind> {
    match status {
        DeploymentStatus::Success => Some(EventKind::Succeeded),
        DeploymentStatus::Failed => Some(EventKind::Failed),
        DeploymentStatus::Cancelled => Some(EventKind::Cancelled),
        DeploymentStatus::Pending | DeploymentStatus::Building | DeploymentStatus::Deploying => {
            None
        }
    }
}
