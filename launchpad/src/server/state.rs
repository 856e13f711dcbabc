//! Server state

use std::sync::Arc;

use crate::deploy::monitor::DeploymentMonitor;
use crate::deploy::service::DeploymentService;
use crate::recovery::service::RecoveryService;

/// Server state shared across handlers
pub struct ServerState {
    pub deployments: Arc<DeploymentService>,
    pub monitor: Arc<DeploymentMonitor>,
    pub recovery: Arc<RecoveryService>,
    pub default_window_hours: u32,
}

impl ServerState {
    pub fn new(
        deployments: Arc<DeploymentService>,
        monitor: Arc<DeploymentMonitor>,
        recovery: Arc<RecoveryService>,
        default_window_hours: u32,
    ) -> Self {
        Self {
            deployments,
            monitor,
            recovery,
            default_window_hours,
        }
    }
}
