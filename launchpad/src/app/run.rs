//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::app::state::AppState;
use crate::deploy::service::CreateDeployment;
use crate::errors::PipelineError;
use crate::models::deployment::DeploymentRecord;
use crate::server::serve::serve;
use crate::server::state::ServerState;
use crate::workers::{monitor, recovery};

/// Run the deployment service until `shutdown_signal` resolves
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), PipelineError> {
    info!("Initializing launchpad...");

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    if let Err(e) = init(&options, shutdown_tx.clone(), &mut shutdown_manager).await {
        error!("Failed to start launchpad: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

/// Create one manual deployment, wait for it to finish and return the final
/// record. No workers or server are started.
pub async fn deploy_once(
    options: AppOptions,
    request: CreateDeployment,
) -> Result<DeploymentRecord, PipelineError> {
    let app_state = AppState::init(&options.settings, &options.layout).await?;

    let record = app_state.deployments.create(request).await?;
    info!(deployment_id = %record.id, "Waiting for deployment to finish...");
    app_state.deployments.dispatcher().wait_for(&record.id).await;

    app_state.deployments.get(&record.id).await
}

// =============================== INITIALIZATION ================================== //

async fn init(
    options: &AppOptions,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<Arc<AppState>, PipelineError> {
    let app_state = Arc::new(AppState::init(&options.settings, &options.layout).await?);
    shutdown_manager.with_app_state(app_state.clone())?;

    init_monitor_worker(
        options.monitor_worker.clone(),
        app_state.clone(),
        shutdown_manager,
        shutdown_tx.subscribe(),
    )?;

    if options.enable_recovery_worker {
        init_recovery_worker(
            options.recovery_worker.clone(),
            app_state.clone(),
            shutdown_manager,
            shutdown_tx.subscribe(),
        )?;
    }

    if options.enable_server {
        init_server(
            options,
            app_state.clone(),
            shutdown_manager,
            shutdown_tx.subscribe(),
        )
        .await?;
    }

    Ok(app_state)
}

fn init_monitor_worker(
    options: monitor::Options,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), PipelineError> {
    info!("Initializing monitor worker...");

    let deployment_monitor = app_state.monitor.clone();
    let handle = tokio::spawn(async move {
        monitor::run(
            &options,
            deployment_monitor.as_ref(),
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_monitor_worker_handle(handle)
}

fn init_recovery_worker(
    options: recovery::Options,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), PipelineError> {
    info!("Initializing recovery worker...");

    let store = app_state.store.clone();
    let recovery_service = app_state.recovery.clone();
    let handle = tokio::spawn(async move {
        recovery::run(
            &options,
            store.as_ref(),
            recovery_service.as_ref(),
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_recovery_worker_handle(handle)
}

async fn init_server(
    options: &AppOptions,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), PipelineError> {
    info!("Initializing operator HTTP server...");

    let server_state = ServerState::new(
        app_state.deployments.clone(),
        app_state.monitor.clone(),
        app_state.recovery.clone(),
        options.monitor_worker.metrics_window_hours,
    );

    let server_handle = serve(&options.server, Arc::new(server_state), async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    shutdown_manager.with_server_handle(server_handle)
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    app_state: Option<Arc<AppState>>,
    server_handle: Option<JoinHandle<Result<(), PipelineError>>>,
    monitor_worker_handle: Option<JoinHandle<()>>,
    recovery_worker_handle: Option<JoinHandle<()>>,
}

impl ShutdownManager {
    pub fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            app_state: None,
            server_handle: None,
            monitor_worker_handle: None,
            recovery_worker_handle: None,
        }
    }

    pub fn with_app_state(&mut self, state: Arc<AppState>) -> Result<(), PipelineError> {
        if self.app_state.is_some() {
            return Err(PipelineError::ShutdownError("app_state already set".to_string()));
        }
        self.app_state = Some(state);
        Ok(())
    }

    pub fn with_monitor_worker_handle(&mut self, handle: JoinHandle<()>) -> Result<(), PipelineError> {
        if self.monitor_worker_handle.is_some() {
            return Err(PipelineError::ShutdownError("monitor_handle already set".to_string()));
        }
        self.monitor_worker_handle = Some(handle);
        Ok(())
    }

    pub fn with_recovery_worker_handle(
        &mut self,
        handle: JoinHandle<()>,
    ) -> Result<(), PipelineError> {
        if self.recovery_worker_handle.is_some() {
            return Err(PipelineError::ShutdownError("recovery_handle already set".to_string()));
        }
        self.recovery_worker_handle = Some(handle);
        Ok(())
    }

    pub fn with_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), PipelineError>>,
    ) -> Result<(), PipelineError> {
        if self.server_handle.is_some() {
            return Err(PipelineError::ShutdownError("server_handle already set".to_string()));
        }
        self.server_handle = Some(handle);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), PipelineError> {
        let _ = self.shutdown_tx.send(());

        let max_delay = self.lifecycle_options.max_shutdown_delay;
        match tokio::time::timeout(max_delay, self.shutdown_impl()).await {
            Ok(result) => result,
            Err(_) => {
                error!("Shutdown timed out after {:?}", max_delay);
                Err(PipelineError::ShutdownError(format!(
                    "shutdown timed out after {max_delay:?}"
                )))
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), PipelineError> {
        info!("Shutting down launchpad...");

        // 1. Recovery worker, so no new retries are created
        if let Some(handle) = self.recovery_worker_handle.take() {
            handle.await.map_err(|e| PipelineError::ShutdownError(e.to_string()))?;
        }

        // 2. Monitor worker
        if let Some(handle) = self.monitor_worker_handle.take() {
            handle.await.map_err(|e| PipelineError::ShutdownError(e.to_string()))?;
        }

        // 3. Operator server
        if let Some(handle) = self.server_handle.take() {
            handle.await.map_err(|e| PipelineError::ShutdownError(e.to_string()))??;
        }

        // 4. In-flight deployments
        if let Some(app_state) = self.app_state.take() {
            app_state.shutdown().await?;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
