//! Deployment record lifecycle: creation, lookup, status changes and stats

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use launchpad_models::StatsResponse;
use tracing::info;

use crate::deploy::config::resolve;
use crate::deploy::detector::{DetectionInput, ProjectTypeDetector};
use crate::deploy::dispatcher::Dispatcher;
use crate::deploy::fsm::DeploymentStatus;
use crate::deploy::lifecycle::Lifecycle;
use crate::deploy::source::{validate_branch, validate_commit};
use crate::errors::PipelineError;
use crate::integrations::directory::RepositoryDirectory;
use crate::models::deployment::{
    BuildConfiguration, ConfigOverrides, DeploymentRecord, StatusUpdate, Trigger,
};
use crate::models::project::ProjectType;
use crate::store::{DeploymentQuery, DeploymentStore};
use crate::utils::generate_uuid;

const RECENT_DEPLOYMENTS: usize = 10;

/// Request to deploy a commit
#[derive(Debug, Clone)]
pub struct CreateDeployment {
    pub repository_id: String,
    pub commit_hash: String,
    /// Defaults to the repository's default branch
    pub branch: Option<String>,
    pub trigger: Trigger,
    pub overrides: ConfigOverrides,
}

impl CreateDeployment {
    pub fn new(repository_id: impl Into<String>, commit_hash: impl Into<String>, trigger: Trigger) -> Self {
        Self {
            repository_id: repository_id.into(),
            commit_hash: commit_hash.into(),
            branch: None,
            trigger,
            overrides: ConfigOverrides::default(),
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}

/// A new attempt whose configuration is already resolved
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub repository_id: String,
    pub project_id: String,
    pub commit_hash: String,
    pub branch: String,
    pub trigger: Trigger,
    pub project_type: ProjectType,
    pub config: BuildConfiguration,
    pub parent_id: Option<String>,
}

impl NewAttempt {
    /// Copy source and configuration from an existing record
    pub fn from_record(source: &DeploymentRecord, trigger: Trigger, parent_id: &str) -> Self {
        Self {
            repository_id: source.repository_id.clone(),
            project_id: source.project_id.clone(),
            commit_hash: source.commit_hash.clone(),
            branch: source.branch.clone(),
            trigger,
            project_type: source.project_type,
            config: source.config.clone(),
            parent_id: Some(parent_id.to_string()),
        }
    }
}

/// Owns deployment records from creation to their terminal state
pub struct DeploymentService {
    store: Arc<dyn DeploymentStore>,
    directory: Arc<dyn RepositoryDirectory>,
    detector: ProjectTypeDetector,
    lifecycle: Arc<Lifecycle>,
    dispatcher: Arc<Dispatcher>,
}

impl DeploymentService {
    pub fn new(
        store: Arc<dyn DeploymentStore>,
        directory: Arc<dyn RepositoryDirectory>,
        detector: ProjectTypeDetector,
        lifecycle: Arc<Lifecycle>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            store,
            directory,
            detector,
            lifecycle,
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.lifecycle
    }

    /// Create a PENDING deployment and hand it to the executor.
    ///
    /// Returns as soon as the record is stored; execution failures are
    /// recorded on the record, never returned here.
    pub async fn create(&self, request: CreateDeployment) -> Result<DeploymentRecord, PipelineError> {
        let repository = self
            .directory
            .get(&request.repository_id)
            .await?
            .ok_or_else(|| PipelineError::not_found("repository", &request.repository_id))?;
        if request.trigger == Trigger::Push && !repository.settings.auto_deploy {
            return Err(PipelineError::InvalidState(format!(
                "auto-deploy is disabled for repository {}",
                repository.id
            )));
        }

        let branch = request
            .branch
            .filter(|b| !b.trim().is_empty())
            .unwrap_or_else(|| repository.default_branch.clone());
        validate_commit(&request.commit_hash)?;
        validate_branch(&branch)?;

        let project_type = match request
            .overrides
            .project_type
            .or(repository.settings.project_type)
        {
            Some(project_type) => project_type,
            None => {
                let detection = self.detector.detect(&DetectionInput::from_tree(&repository.tree));
                info!(
                    repository_id = %repository.id,
                    "Detected project type {} (confidence {:.2})",
                    detection.project_type,
                    detection.confidence
                );
                detection.project_type
            }
        };
        let config = resolve(project_type, &repository.settings, &request.overrides);

        self.create_with_config(NewAttempt {
            repository_id: repository.id.clone(),
            project_id: repository.project_id.clone(),
            commit_hash: request.commit_hash,
            branch,
            trigger: request.trigger,
            project_type,
            config,
            parent_id: None,
        })
        .await
    }

    /// Create a PENDING deployment with an explicit configuration, bypassing
    /// detection and resolution
    pub async fn create_with_config(
        &self,
        attempt: NewAttempt,
    ) -> Result<DeploymentRecord, PipelineError> {
        let previous = self
            .store
            .count_attempts(&attempt.repository_id, &attempt.commit_hash)
            .await?;

        let record = DeploymentRecord {
            id: generate_uuid(),
            repository_id: attempt.repository_id,
            project_id: attempt.project_id,
            commit_hash: attempt.commit_hash,
            branch: attempt.branch,
            trigger: attempt.trigger,
            project_type: attempt.project_type,
            config: attempt.config,
            status: DeploymentStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            duration_secs: None,
            preview_url: None,
            build_log: String::new(),
            deploy_log: String::new(),
            error_message: None,
            attempt: previous as u32 + 1,
            parent_id: attempt.parent_id,
        };

        self.store.insert(record.clone()).await?;
        info!(
            deployment_id = %record.id,
            repository_id = %record.repository_id,
            "Created {} deployment of {} ({})",
            record.trigger,
            record.commit_hash,
            record.project_type
        );

        self.dispatcher.submit(&record.id);
        Ok(record)
    }

    pub async fn get(&self, id: &str) -> Result<DeploymentRecord, PipelineError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| PipelineError::not_found("deployment", id))
    }

    pub async fn list(&self, query: &DeploymentQuery) -> Result<Vec<DeploymentRecord>, PipelineError> {
        self.store.list(query).await
    }

    /// Hand every stored PENDING deployment to the executor, oldest first.
    ///
    /// Records reloaded from a snapshot were queued by a previous process
    /// and have no executor of their own.
    pub async fn resume_pending(&self) -> Result<usize, PipelineError> {
        let pending = self
            .store
            .list(&DeploymentQuery::all().with_status(DeploymentStatus::Pending))
            .await?;
        for record in pending.iter().rev() {
            info!(deployment_id = %record.id, "Resuming pending deployment");
            self.dispatcher.submit(&record.id);
        }
        Ok(pending.len())
    }

    /// The only mutator after creation
    pub async fn update_status(
        &self,
        id: &str,
        update: StatusUpdate,
    ) -> Result<DeploymentRecord, PipelineError> {
        self.lifecycle.update_status(id, update).await
    }

    /// Cancel a non-terminal deployment; `InvalidState` otherwise
    pub async fn cancel(&self, id: &str) -> Result<DeploymentRecord, PipelineError> {
        self.lifecycle
            .cancel(id, Some("cancelled by request".to_string()))
            .await
    }

    /// Aggregate counts and durations, optionally scoped to a project
    pub async fn stats(&self, project_id: Option<&str>) -> Result<StatsResponse, PipelineError> {
        let query = match project_id {
            Some(project_id) => DeploymentQuery::project(project_id),
            None => DeploymentQuery::all(),
        };
        let records = self.store.list(&query).await?;

        let mut by_status: BTreeMap<String, usize> = DeploymentStatus::ALL
            .iter()
            .map(|status| (status.to_string(), 0))
            .collect();
        let mut by_trigger: BTreeMap<String, usize> = BTreeMap::new();
        for record in &records {
            *by_status.entry(record.status.to_string()).or_default() += 1;
            *by_trigger.entry(record.trigger.to_string()).or_default() += 1;
        }

        let durations: Vec<i64> = records
            .iter()
            .filter(|r| r.status == DeploymentStatus::Success)
            .filter_map(|r| r.duration_secs)
            .collect();
        let avg_duration_secs = (!durations.is_empty())
            .then(|| durations.iter().sum::<i64>() as f64 / durations.len() as f64);

        Ok(StatsResponse {
            total: records.len(),
            by_status,
            by_trigger,
            avg_duration_secs,
            recent: records
                .iter()
                .take(RECENT_DEPLOYMENTS)
                .map(DeploymentRecord::to_response)
                .collect(),
        })
    }
}
