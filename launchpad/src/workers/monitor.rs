//! Stuck-deployment monitor worker

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::deploy::monitor::DeploymentMonitor;

/// Monitor worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Interval between scans
    pub interval: Duration,

    /// Window of the metrics logged after each scan
    pub metrics_window_hours: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            metrics_window_hours: 24,
        }
    }
}

/// Run the monitor worker
pub async fn run<S, F>(
    options: &Options,
    monitor: &DeploymentMonitor,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Monitor worker starting...");

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Monitor worker shutting down...");
                return;
            }
            _ = sleep_fn(options.interval) => {}
        }

        debug!("Scanning active deployments...");
        if let Err(e) = monitor.scan_active().await {
            error!("Deployment scan failed: {}", e);
        }

        match monitor.metrics(options.metrics_window_hours).await {
            Ok(metrics) => info!(
                window_hours = metrics.window_hours,
                total = metrics.total,
                successful = metrics.successful,
                failed = metrics.failed,
                "Success rate {:.1}%, average duration {:.0}s",
                metrics.success_rate,
                metrics.avg_duration_secs
            ),
            Err(e) => error!("Failed to compute deployment metrics: {}", e),
        }
    }
}
