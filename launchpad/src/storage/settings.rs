//! Settings file management

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::errors::PipelineError;
use crate::logs::LogLevel;

/// Service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON formatted logs on stdout
    #[serde(default)]
    pub json_logs: bool,

    /// Also write a rolling log file under the storage layout
    #[serde(default = "default_true")]
    pub log_to_file: bool,

    /// Base directory for all storage; platform default when absent
    #[serde(default)]
    pub base_dir: Option<PathBuf>,

    /// Repository directory file; `repositories.json` under the base directory when absent
    #[serde(default)]
    pub repositories_file: Option<PathBuf>,

    /// Operator HTTP server
    #[serde(default)]
    pub server: ServerSettings,

    /// Stuck-deployment monitor
    #[serde(default)]
    pub monitor: MonitorSettings,

    /// Automatic recovery policy
    #[serde(default)]
    pub recovery: RecoverySettings,

    /// Build backend
    #[serde(default)]
    pub build: BuildSettings,

    /// Hosting platform
    #[serde(default)]
    pub platform: PlatformSettings,

    /// Notification collaborator
    #[serde(default)]
    pub notifications: NotificationSettings,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            json_logs: false,
            log_to_file: true,
            base_dir: None,
            repositories_file: None,
            server: ServerSettings::default(),
            monitor: MonitorSettings::default(),
            recovery: RecoverySettings::default(),
            build: BuildSettings::default(),
            platform: PlatformSettings::default(),
            notifications: NotificationSettings::default(),
        }
    }
}

impl Settings {
    /// Validate every section that carries numeric bounds
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.monitor.validate()?;
        self.recovery.validate()?;
        self.platform.validate()?;
        if self.server.port == 0 {
            return Err(PipelineError::ValidationFailure(
                "server.port must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Operator HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_server_host")]
    pub host: String,

    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8089
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

/// Stuck-deployment monitor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    /// Seconds between scans
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,

    /// Minutes after `started_at` before an in-flight deployment is failed
    #[serde(default = "default_stuck_timeout")]
    pub stuck_timeout_minutes: u32,

    /// Window of the rolling metrics logged after each scan
    #[serde(default = "default_metrics_window")]
    pub metrics_window_hours: u32,
}

fn default_scan_interval() -> u64 {
    60
}

fn default_stuck_timeout() -> u32 {
    30
}

fn default_metrics_window() -> u32 {
    24
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            scan_interval_secs: default_scan_interval(),
            stuck_timeout_minutes: default_stuck_timeout(),
            metrics_window_hours: default_metrics_window(),
        }
    }
}

impl MonitorSettings {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.scan_interval_secs == 0 {
            return Err(PipelineError::ValidationFailure(
                "monitor.scan_interval_secs must be at least 1".to_string(),
            ));
        }
        if !(1..=1440).contains(&self.stuck_timeout_minutes) {
            return Err(PipelineError::ValidationFailure(format!(
                "monitor.stuck_timeout_minutes must be within 1..=1440, got {}",
                self.stuck_timeout_minutes
            )));
        }
        if !(1..=720).contains(&self.metrics_window_hours) {
            return Err(PipelineError::ValidationFailure(format!(
                "monitor.metrics_window_hours must be within 1..=720, got {}",
                self.metrics_window_hours
            )));
        }
        Ok(())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }
}

/// Automatic recovery policy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoverySettings {
    /// Run the auto-retry policy loop
    #[serde(default = "default_true")]
    pub auto_retry: bool,

    /// Seconds between policy ticks
    #[serde(default = "default_policy_interval")]
    pub policy_interval_secs: u64,

    /// Attempts allowed per repository and commit, the original included
    #[serde(default = "default_max_attempts")]
    pub max_attempts_per_commit: u32,
}

fn default_policy_interval() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

impl Default for RecoverySettings {
    fn default() -> Self {
        Self {
            auto_retry: true,
            policy_interval_secs: default_policy_interval(),
            max_attempts_per_commit: default_max_attempts(),
        }
    }
}

impl RecoverySettings {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.policy_interval_secs == 0 {
            return Err(PipelineError::ValidationFailure(
                "recovery.policy_interval_secs must be at least 1".to_string(),
            ));
        }
        if !(1..=10).contains(&self.max_attempts_per_commit) {
            return Err(PipelineError::ValidationFailure(format!(
                "recovery.max_attempts_per_commit must be within 1..=10, got {}",
                self.max_attempts_per_commit
            )));
        }
        Ok(())
    }

    pub fn policy_interval(&self) -> Duration {
        Duration::from_secs(self.policy_interval_secs)
    }
}

/// Where build commands run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Shell,
    Container,
}

/// Build backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSettings {
    #[serde(default)]
    pub backend: BackendKind,

    /// Image used by the container backend
    #[serde(default = "default_container_image")]
    pub container_image: String,
}

fn default_container_image() -> String {
    "node:20-bookworm".to_string()
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::Shell,
            container_image: default_container_image(),
        }
    }
}

/// Hosting platform provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Vercel,
    #[default]
    Static,
}

/// Hosting platform settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformSettings {
    #[serde(default)]
    pub provider: ProviderKind,

    #[serde(default)]
    pub vercel: VercelSettings,

    #[serde(default)]
    pub static_host: StaticHostSettings,
}

impl PlatformSettings {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.provider == ProviderKind::Vercel {
            url::Url::parse(&self.vercel.api_url).map_err(|e| {
                PipelineError::ValidationFailure(format!("platform.vercel.api_url: {e}"))
            })?;
            if self.vercel.token.is_none() {
                return Err(PipelineError::ValidationFailure(
                    "platform.vercel.token is required for the vercel provider".to_string(),
                ));
            }
        }
        if self.static_host.base_domain.trim().is_empty() {
            return Err(PipelineError::ValidationFailure(
                "platform.static_host.base_domain must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Vercel credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VercelSettings {
    #[serde(default = "default_vercel_api_url")]
    pub api_url: String,

    #[serde(default, skip_serializing)]
    pub token: Option<SecretString>,

    #[serde(default)]
    pub team_id: Option<String>,
}

fn default_vercel_api_url() -> String {
    "https://api.vercel.com".to_string()
}

impl Default for VercelSettings {
    fn default() -> Self {
        Self {
            api_url: default_vercel_api_url(),
            token: None,
            team_id: None,
        }
    }
}

/// Static host settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticHostSettings {
    #[serde(default = "default_base_domain")]
    pub base_domain: String,
}

fn default_base_domain() -> String {
    "preview.localhost".to_string()
}

impl Default for StaticHostSettings {
    fn default() -> Self {
        Self {
            base_domain: default_base_domain(),
        }
    }
}

/// Notification collaborator settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationSettings {
    /// Endpoint receiving deployment events; events are only logged when unset
    #[serde(default)]
    pub webhook_url: Option<String>,
}
