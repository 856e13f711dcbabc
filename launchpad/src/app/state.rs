//! Application state: every component wired once with explicit dependencies

use std::sync::Arc;

use tracing::info;

use crate::deploy::backend::{BuildBackend, ContainerBackend, ShellBackend};
use crate::deploy::detector::ProjectTypeDetector;
use crate::deploy::dispatcher::Dispatcher;
use crate::deploy::executor::DeploymentExecutor;
use crate::deploy::lifecycle::Lifecycle;
use crate::deploy::monitor::DeploymentMonitor;
use crate::deploy::platform::{HostingPlatform, StaticHostPlatform, VercelPlatform};
use crate::deploy::service::DeploymentService;
use crate::deploy::source::{GitSource, SourceFetcher};
use crate::errors::PipelineError;
use crate::filesys::file::File;
use crate::integrations::directory::{RepositoryDirectory, StaticDirectory};
use crate::integrations::notify::{LogNotifier, Notifier, WebhookNotifier};
use crate::recovery::analyzer::ErrorAnalyzer;
use crate::recovery::service::RecoveryService;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::{BackendKind, ProviderKind, Settings};
use crate::store::{DeploymentStore, MemoryStore};

/// Shared application state
pub struct AppState {
    pub store: Arc<dyn DeploymentStore>,
    pub directory: Arc<dyn RepositoryDirectory>,
    pub deployments: Arc<DeploymentService>,
    pub monitor: Arc<DeploymentMonitor>,
    pub recovery: Arc<RecoveryService>,
}

impl AppState {
    /// Build the state with the collaborators named in the settings
    pub async fn init(settings: &Settings, layout: &StorageLayout) -> Result<Self, PipelineError> {
        layout.setup().await?;

        let store: Arc<dyn DeploymentStore> =
            Arc::new(MemoryStore::open(layout.deployments_file()).await?);

        let repositories_file = match &settings.repositories_file {
            Some(path) => File::new(path),
            None => layout.repositories_file(),
        };
        let directory: Arc<dyn RepositoryDirectory> =
            Arc::new(StaticDirectory::load(&repositories_file).await?);

        let notifier: Arc<dyn Notifier> = match &settings.notifications.webhook_url {
            Some(url) => Arc::new(WebhookNotifier::new(url)?),
            None => Arc::new(LogNotifier),
        };

        let backend: Arc<dyn BuildBackend> = match settings.build.backend {
            BackendKind::Shell => Arc::new(ShellBackend),
            BackendKind::Container => {
                Arc::new(ContainerBackend::new(settings.build.container_image.clone()))
            }
        };

        let platform: Arc<dyn HostingPlatform> = match settings.platform.provider {
            ProviderKind::Vercel => {
                let vercel = &settings.platform.vercel;
                let token = vercel.token.clone().ok_or_else(|| {
                    PipelineError::ConfigError("vercel provider requires a token".to_string())
                })?;
                Arc::new(VercelPlatform::new(
                    &vercel.api_url,
                    token,
                    vercel.team_id.clone(),
                )?)
            }
            ProviderKind::Static => Arc::new(StaticHostPlatform::new(
                layout.sites_dir(),
                settings.platform.static_host.base_domain.clone(),
            )),
        };
        info!(
            "Using {:?} build backend and {} hosting platform",
            settings.build.backend,
            platform.name()
        );

        let state = Self::assemble(
            store,
            directory,
            notifier,
            Components {
                source: Arc::new(GitSource),
                backend,
                platform,
            },
            layout,
            settings,
        )?;

        let resumed = state.deployments.resume_pending().await?;
        if resumed > 0 {
            info!("Resumed {} pending deployments from the snapshot", resumed);
        }
        Ok(state)
    }

    /// Wire the services around the given collaborators
    pub fn assemble(
        store: Arc<dyn DeploymentStore>,
        directory: Arc<dyn RepositoryDirectory>,
        notifier: Arc<dyn Notifier>,
        components: Components,
        layout: &StorageLayout,
        settings: &Settings,
    ) -> Result<Self, PipelineError> {
        let lifecycle = Arc::new(Lifecycle::new(store.clone(), notifier));

        let executor = Arc::new(DeploymentExecutor::new(
            lifecycle.clone(),
            directory.clone(),
            components.source,
            components.backend,
            components.platform,
            layout.workspaces_dir(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(executor));

        let deployments = Arc::new(DeploymentService::new(
            store.clone(),
            directory.clone(),
            ProjectTypeDetector::default(),
            lifecycle.clone(),
            dispatcher,
        ));

        let monitor = Arc::new(DeploymentMonitor::new(
            store.clone(),
            lifecycle,
            chrono::Duration::minutes(i64::from(settings.monitor.stuck_timeout_minutes)),
        ));

        let recovery = Arc::new(RecoveryService::new(
            store.clone(),
            deployments.clone(),
            ErrorAnalyzer::new()?,
            settings.recovery.max_attempts_per_commit,
        ));

        Ok(Self {
            store,
            directory,
            deployments,
            monitor,
            recovery,
        })
    }

    /// Wait for every in-flight deployment to finish
    pub async fn shutdown(&self) -> Result<(), PipelineError> {
        let in_flight = self.deployments.dispatcher().in_flight();
        if !in_flight.is_empty() {
            info!("Waiting for {} in-flight deployments...", in_flight.len());
        }
        self.deployments.dispatcher().wait_idle().await;
        Ok(())
    }
}

/// Execution collaborators; swapped for fakes in tests
pub struct Components {
    pub source: Arc<dyn SourceFetcher>,
    pub backend: Arc<dyn BuildBackend>,
    pub platform: Arc<dyn HostingPlatform>,
}
