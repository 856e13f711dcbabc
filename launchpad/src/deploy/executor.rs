//! Deployment executor: clone, build, publish

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::deploy::backend::BuildBackend;
use crate::deploy::dispatcher::DeploymentRunner;
use crate::deploy::fsm::DeploymentStatus;
use crate::deploy::lifecycle::Lifecycle;
use crate::deploy::platform::{HostingPlatform, PublishOutcome, PublishRequest};
use crate::deploy::source::SourceFetcher;
use crate::errors::PipelineError;
use crate::filesys::dir::Dir;
use crate::integrations::directory::RepositoryDirectory;
use crate::models::deployment::{DeploymentRecord, StatusUpdate};
use crate::models::project::BuildStrategy;
use crate::models::repository::Repository;
use crate::utils::short_commit;

/// Outcome of one pipeline step
#[derive(Debug, Clone, Default)]
pub struct StepOutcome {
    pub success: bool,
    pub log: String,
    pub error: Option<String>,
}

impl StepOutcome {
    fn ok(log: String) -> Self {
        Self {
            success: true,
            log,
            error: None,
        }
    }

    fn failed(log: String, error: impl Into<String>) -> Self {
        Self {
            success: false,
            log,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Build,
    Deploy,
}

#[derive(Debug)]
struct StepFailure {
    phase: Phase,
    log: String,
    message: String,
}

impl StepFailure {
    fn build(log: String, message: impl Into<String>) -> Self {
        Self {
            phase: Phase::Build,
            log,
            message: message.into(),
        }
    }

    fn deploy(log: String, message: impl Into<String>) -> Self {
        Self {
            phase: Phase::Deploy,
            log,
            message: message.into(),
        }
    }
}

/// Drives one deployment attempt end to end
pub struct DeploymentExecutor {
    lifecycle: Arc<Lifecycle>,
    directory: Arc<dyn RepositoryDirectory>,
    source: Arc<dyn SourceFetcher>,
    backend: Arc<dyn BuildBackend>,
    platform: Arc<dyn HostingPlatform>,
    workspaces: Dir,
}

impl DeploymentExecutor {
    pub fn new(
        lifecycle: Arc<Lifecycle>,
        directory: Arc<dyn RepositoryDirectory>,
        source: Arc<dyn SourceFetcher>,
        backend: Arc<dyn BuildBackend>,
        platform: Arc<dyn HostingPlatform>,
        workspaces: Dir,
    ) -> Self {
        Self {
            lifecycle,
            directory,
            source,
            backend,
            platform,
            workspaces,
        }
    }

    /// Execute a PENDING deployment and return the final record.
    ///
    /// Step failures end the record in FAILED and are not returned as
    /// errors. The working directory is removed whatever the outcome.
    pub async fn execute(&self, id: &str) -> Result<DeploymentRecord, PipelineError> {
        let Some(record) = self.lifecycle.store().get(id).await? else {
            warn!(deployment_id = %id, "Deployment record not found, nothing to execute");
            return Err(PipelineError::not_found("deployment", id));
        };
        if record.status != DeploymentStatus::Pending {
            info!(deployment_id = %id, "Deployment is {}, not executing", record.status);
            return Ok(record);
        }

        let record = self
            .lifecycle
            .update_status(
                id,
                StatusUpdate::new(DeploymentStatus::Building).with_build_log(format!(
                    "Deploying {} at {} ({}, attempt {})",
                    record.branch,
                    short_commit(&record.commit_hash),
                    record.project_type,
                    record.attempt
                )),
            )
            .await?;

        let repository = match self.directory.get(&record.repository_id).await {
            Ok(Some(repository)) => repository,
            Ok(None) => {
                let failure = StepFailure::build(
                    String::new(),
                    format!("repository {} not found", record.repository_id),
                );
                return self.finish_failed(id, failure).await;
            }
            Err(e) => {
                let failure =
                    StepFailure::build(String::new(), format!("repository lookup failed: {e}"));
                return self.finish_failed(id, failure).await;
            }
        };

        let workdir = self.workspaces.subdir(id);
        let result = self.run_pipeline(&record, &repository, &workdir).await;
        if let Err(e) = workdir.delete().await {
            warn!(deployment_id = %id, "Failed to clean up {}: {}", workdir.path().display(), e);
        }

        match result {
            Ok(outcome) => {
                let record = self
                    .lifecycle
                    .update_status(
                        id,
                        StatusUpdate::new(DeploymentStatus::Success)
                            .with_preview_url(outcome.preview_url)
                            .with_deploy_log(outcome.log),
                    )
                    .await;
                match record {
                    Ok(record) => {
                        info!(deployment_id = %id, "Deployment succeeded");
                        Ok(record)
                    }
                    Err(PipelineError::InvalidState(_)) => self.current(id).await,
                    Err(e) => Err(e),
                }
            }
            Err(failure) => self.finish_failed(id, failure).await,
        }
    }

    async fn run_pipeline(
        &self,
        record: &DeploymentRecord,
        repository: &Repository,
        workdir: &Dir,
    ) -> Result<PublishOutcome, StepFailure> {
        let id = record.id.as_str();

        let setup = async {
            self.workspaces.create().await?;
            workdir.delete().await
        };
        setup
            .await
            .map_err(|e| StepFailure::build(String::new(), format!("workspace setup failed: {e}")))?;

        let step = match self
            .source
            .fetch(repository, &record.commit_hash, &record.branch, workdir.path())
            .await
        {
            Ok(log) => StepOutcome::ok(log),
            Err(e) => StepOutcome::failed(String::new(), format!("source checkout failed: {e}")),
        };
        self.record_build_step(id, step).await?;

        let step = self.build(record, workdir.path()).await;
        self.record_build_step(id, step).await?;

        self.lifecycle
            .update_status(
                id,
                StatusUpdate::new(DeploymentStatus::Deploying)
                    .with_deploy_log(format!("Publishing with {}", self.platform.name())),
            )
            .await
            .map_err(|e| StepFailure::deploy(String::new(), e.to_string()))?;

        let output_dir = resolve_output_dir(workdir.path(), &record.config.output_directory)
            .map_err(|e| StepFailure::deploy(String::new(), e.to_string()))?;
        let request = PublishRequest {
            deployment_id: record.id.clone(),
            project_id: record.project_id.clone(),
            repository_name: repository.name.clone(),
            project_type: record.project_type,
            output_dir,
            env_vars: record.config.env_vars.clone(),
        };

        self.platform
            .publish(&request)
            .await
            .map_err(|e| StepFailure::deploy(String::new(), format!("publish failed: {e}")))
    }

    async fn build(&self, record: &DeploymentRecord, dir: &Path) -> StepOutcome {
        let config = &record.config;
        let strategy = record
            .project_type
            .build_strategy(config.build_command.is_some());

        let commands: Vec<&str> = match strategy {
            BuildStrategy::InstallAndCompile => config
                .install_command
                .iter()
                .chain(config.build_command.iter())
                .map(String::as_str)
                .collect(),
            BuildStrategy::InstallOnly => config.install_command.iter().map(String::as_str).collect(),
            BuildStrategy::NoOp => Vec::new(),
        };
        if commands.is_empty() {
            return StepOutcome::ok(format!("No build step for {} project", record.project_type));
        }

        let mut log = String::new();
        for command in commands {
            log.push_str(&format!("$ {command}\n"));
            match self.backend.run(command, dir, &config.env_vars).await {
                Ok(outcome) if outcome.success => log.push_str(&outcome.log),
                Ok(outcome) => {
                    log.push_str(&outcome.log);
                    let code = outcome
                        .exit_code
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "signal".to_string());
                    return StepOutcome::failed(
                        log,
                        format!("`{command}` exited with status {code}"),
                    );
                }
                Err(e) => return StepOutcome::failed(log, format!("`{command}` could not run: {e}")),
            }
        }
        StepOutcome::ok(log)
    }

    async fn record_build_step(&self, id: &str, step: StepOutcome) -> Result<(), StepFailure> {
        if !step.success {
            let message = step.error.unwrap_or_else(|| "build step failed".to_string());
            return Err(StepFailure::build(step.log, message));
        }
        if step.log.is_empty() {
            return Ok(());
        }
        self.lifecycle
            .update_status(
                id,
                StatusUpdate::new(DeploymentStatus::Building).with_build_log(step.log),
            )
            .await
            .map(|_| ())
            .map_err(|e| StepFailure::build(String::new(), e.to_string()))
    }

    async fn finish_failed(
        &self,
        id: &str,
        failure: StepFailure,
    ) -> Result<DeploymentRecord, PipelineError> {
        error!(deployment_id = %id, "Deployment failed: {}", failure.message);

        let mut update = StatusUpdate::new(DeploymentStatus::Failed).with_error(failure.message);
        if !failure.log.is_empty() {
            update = match failure.phase {
                Phase::Build => update.with_build_log(failure.log),
                Phase::Deploy => update.with_deploy_log(failure.log),
            };
        }

        match self.lifecycle.update_status(id, update).await {
            Ok(record) => Ok(record),
            // finalized elsewhere, e.g. cancelled or timed out meanwhile
            Err(PipelineError::InvalidState(reason)) => {
                debug!(deployment_id = %id, "Not marking failed: {}", reason);
                self.current(id).await
            }
            Err(e) => Err(e),
        }
    }

    async fn current(&self, id: &str) -> Result<DeploymentRecord, PipelineError> {
        self.lifecycle
            .store()
            .get(id)
            .await?
            .ok_or_else(|| PipelineError::not_found("deployment", id))
    }
}

#[async_trait]
impl DeploymentRunner for DeploymentExecutor {
    async fn run(&self, deployment_id: &str) {
        match self.execute(deployment_id).await {
            Ok(record) => info!(
                deployment_id = %deployment_id,
                "Deployment finished as {}",
                record.status
            ),
            Err(e) => error!(deployment_id = %deployment_id, "Deployment execution error: {}", e),
        }
    }
}

/// Join the output directory onto the working tree, refusing paths that
/// leave it
fn resolve_output_dir(workdir: &Path, output_directory: &str) -> Result<PathBuf, PipelineError> {
    let relative = Path::new(output_directory.trim());
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(PipelineError::ValidationFailure(format!(
            "output directory must stay inside the workspace: {output_directory}"
        )));
    }
    Ok(workdir.join(relative))
}
