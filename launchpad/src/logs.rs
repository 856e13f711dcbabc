//! Logging configuration

use std::path::PathBuf;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::errors::PipelineError;

const LOG_FILE_PREFIX: &str = "launchpad.log";

/// Log level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_level(&self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }

    pub fn to_filter_string(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

impl serde::Serialize for LogLevel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_filter_string())
    }
}

impl<'de> serde::Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging options
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Log level
    pub log_level: LogLevel,

    /// Write logs to stdout
    pub stdout: bool,

    /// Directory for the rolling log file, if file output is wanted
    pub log_dir: Option<PathBuf>,

    /// Enable JSON format
    pub json_format: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            stdout: true,
            log_dir: None,
            json_format: false,
        }
    }
}

/// Initialize logging
///
/// The returned guard must be held for as long as file logging should keep
/// flushing.
pub fn init_logging(options: LogOptions) -> Result<Option<WorkerGuard>, PipelineError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(options.log_level.to_filter_string()));

    let stdout_layer = options.stdout.then(|| {
        if options.json_format {
            fmt::layer().json().boxed()
        } else {
            fmt::layer().boxed()
        }
    });

    let (file_layer, guard) = match &options.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer).boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| PipelineError::ConfigError(e.to_string()))?;

    Ok(guard)
}
