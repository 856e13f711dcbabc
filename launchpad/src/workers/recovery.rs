//! Auto-retry policy worker
//!
//! The only caller of `RecoveryService::auto_retry`, so retry-count checks
//! never race each other.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info};

use crate::deploy::fsm::DeploymentStatus;
use crate::recovery::service::RecoveryService;
use crate::store::{DeploymentQuery, DeploymentStore};

/// Recovery worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Interval between policy ticks
    pub interval: Duration,

    /// How far back failed deployments are considered
    pub lookback: chrono::Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            lookback: chrono::Duration::hours(24),
        }
    }
}

/// Run one policy pass; returns the number of retries scheduled
pub async fn tick(
    options: &Options,
    store: &dyn DeploymentStore,
    recovery: &RecoveryService,
) -> usize {
    let query = DeploymentQuery::all()
        .with_status(DeploymentStatus::Failed)
        .created_after(Utc::now() - options.lookback);
    let failed = match store.list(&query).await {
        Ok(failed) => failed,
        Err(e) => {
            error!("Failed to list failed deployments: {}", e);
            return 0;
        }
    };

    let mut scheduled = 0;
    // oldest first so a chain of retries is walked in order
    for record in failed.iter().rev() {
        match recovery.auto_retry(&record.id).await {
            Ok(Some(_)) => scheduled += 1,
            Ok(None) => {}
            Err(e) => error!(deployment_id = %record.id, "Auto-retry failed: {}", e),
        }
    }
    scheduled
}

/// Run the recovery worker
pub async fn run<S, F>(
    options: &Options,
    store: &dyn DeploymentStore,
    recovery: &RecoveryService,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Recovery worker starting...");

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Recovery worker shutting down...");
                return;
            }
            _ = sleep_fn(options.interval) => {}
        }

        let scheduled = tick(options, store, recovery).await;
        if scheduled > 0 {
            info!("Scheduled {} automatic retries", scheduled);
        } else {
            debug!("No deployments to retry");
        }
    }
}
