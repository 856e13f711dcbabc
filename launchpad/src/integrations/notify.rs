//! Deployment event notification

use async_trait::async_trait;
use chrono::Utc;
use launchpad_models::{DeploymentEvent, EventKind};
use tracing::{info, warn};

use crate::errors::PipelineError;
use crate::http::client::HttpClient;
use crate::models::deployment::DeploymentRecord;

/// Receives deployment events. Delivery is best effort.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: DeploymentEvent) -> Result<(), PipelineError>;
}

/// Build the event payload for a record
pub fn event_for(kind: EventKind, record: &DeploymentRecord) -> DeploymentEvent {
    DeploymentEvent {
        kind,
        deployment_id: record.id.clone(),
        repository_id: record.repository_id.clone(),
        project_id: record.project_id.clone(),
        commit_hash: record.commit_hash.clone(),
        branch: record.branch.clone(),
        status: record.status.to_string(),
        preview_url: record.preview_url.clone(),
        error_message: record.error_message.clone(),
        parent_id: record.parent_id.clone(),
        occurred_at: Utc::now(),
    }
}

/// Deliver an event, logging and swallowing any failure
pub async fn notify_quietly(notifier: &dyn Notifier, event: DeploymentEvent) {
    let deployment_id = event.deployment_id.clone();
    if let Err(e) = notifier.notify(event).await {
        warn!(deployment_id = %deployment_id, "Failed to deliver deployment event: {}", e);
    }
}

/// Notifier that only writes events to the log
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: DeploymentEvent) -> Result<(), PipelineError> {
        info!(
            deployment_id = %event.deployment_id,
            repository_id = %event.repository_id,
            "Deployment event {:?} (status: {})",
            event.kind,
            event.status
        );
        Ok(())
    }
}

/// Notifier that POSTs each event as JSON to a webhook
pub struct WebhookNotifier {
    client: HttpClient,
}

impl WebhookNotifier {
    pub fn new(webhook_url: &str) -> Result<Self, PipelineError> {
        url::Url::parse(webhook_url)
            .map_err(|e| PipelineError::ConfigError(format!("invalid webhook url: {e}")))?;
        Ok(Self {
            client: HttpClient::new(webhook_url)?,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, event: DeploymentEvent) -> Result<(), PipelineError> {
        self.client.post_no_content("", &event).await
    }
}
