//! Application configuration options

use std::time::Duration;

use crate::storage::layout::StorageLayout;
use crate::storage::settings::Settings;
use crate::workers::{monitor, recovery};

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Storage layout paths
    pub layout: StorageLayout,

    /// Loaded settings file
    pub settings: Settings,

    /// Enable the operator HTTP server
    pub enable_server: bool,

    /// Enable the auto-retry policy worker
    pub enable_recovery_worker: bool,

    /// Server configuration
    pub server: ServerOptions,

    /// Monitor worker options
    pub monitor_worker: monitor::Options,

    /// Recovery worker options
    pub recovery_worker: recovery::Options,
}

impl AppOptions {
    pub fn new(settings: Settings, layout: StorageLayout) -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            enable_server: settings.server.enabled,
            enable_recovery_worker: settings.recovery.auto_retry,
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            monitor_worker: monitor::Options {
                interval: settings.monitor.scan_interval(),
                metrics_window_hours: settings.monitor.metrics_window_hours,
            },
            recovery_worker: recovery::Options {
                interval: settings.recovery.policy_interval(),
                ..Default::default()
            },
            layout,
            settings,
        }
    }
}

/// Lifecycle options for the service
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown, in-flight deployments included
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(120),
        }
    }
}

/// Operator HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8089,
        }
    }
}
