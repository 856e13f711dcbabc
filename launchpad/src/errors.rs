//! Error types for the launchpad pipeline

use thiserror::Error;

/// Main error type for the deployment pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Unknown repository or deployment id
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation is not legal for the record's current status
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A build or deploy step failed; recorded on the deployment record
    #[error("Execution failure: {0}")]
    ExecutionFailure(String),

    /// Malformed configuration values
    #[error("Validation error: {0}")]
    ValidationFailure(String),

    #[error("Platform error: {0}")]
    PlatformError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn not_found(kind: &str, id: &str) -> Self {
        PipelineError::NotFound(format!("{kind} {id}"))
    }
}

impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        PipelineError::Internal(err.to_string())
    }
}
