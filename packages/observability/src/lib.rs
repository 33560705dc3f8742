//! # Observability
//!
//! Logging setup for Event Horizon binaries.
//!
//! Library code only uses `tracing` macros; binaries call
//! `observability::init_with_config()` once at startup to decide where those
//! events go:
//!
//! - compact human-readable lines on stderr (default), or
//! - JSON lines appended to a file, optionally mirrored to stderr.
//!
//! `RUST_LOG` always overrides the configured default level.
//!
//! ## Usage
//!
//! ```rust,ignore
//! fn main() {
//!     observability::init("horizon").expect("logging");
//!     tracing::info!("service started");
//! }
//! ```
//!
//! Or with configuration:
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "horizon".into(),
//!     default_level: "debug".into(),
//!     log_path: Some("/tmp/horizon.jsonl".into()),
//!     also_stderr: true,
//! })?;
//! ```

mod file_writer;
mod json_layer;

pub use file_writer::{LogFileWriter, LogFileWriterFactory};
pub use json_layer::{JsonLayer, LogEntry};

use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Observability error type.
#[derive(Error, Debug)]
pub enum ObservabilityError {
    /// Log file could not be opened
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A global subscriber is already installed
    #[error("Subscriber init failed: {0}")]
    Init(String),
}

/// Result type alias using ObservabilityError.
pub type ObservabilityResult<T> = Result<T, ObservabilityError>;

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, included in every JSON log line.
    pub service_name: String,

    /// Default level filter (e.g., "debug", "info").
    /// Can be overridden by the `RUST_LOG` environment variable.
    pub default_level: String,

    /// Write JSON lines to this file instead of compact stderr output.
    pub log_path: Option<PathBuf>,

    /// Mirror compact output to stderr when writing to a file.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Initialize logging with default settings for `service_name`.
pub fn init(service_name: &str) -> ObservabilityResult<()> {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    })
}

/// Initialize logging with custom configuration.
pub fn init_with_config(config: LogConfig) -> ObservabilityResult<()> {
    let Some(log_path) = config.log_path.clone() else {
        return tracing_subscriber::fmt()
            .with_env_filter(env_filter(&config.default_level))
            .with_target(true)
            .with_writer(io::stderr)
            .compact()
            .try_init()
            .map_err(|e| ObservabilityError::Init(e.to_string()));
    };

    let writer = LogFileWriter::new(&log_path)?;
    let json_layer = JsonLayer::new(config.service_name.clone(), LogFileWriterFactory::new(writer));

    let stderr_layer = config.also_stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .compact()
            .with_writer(io::stderr)
            .with_filter(env_filter(&config.default_level))
    });

    tracing_subscriber::registry()
        .with(json_layer.with_filter(env_filter(&config.default_level)))
        .with(stderr_layer)
        .try_init()
        .map_err(|e| ObservabilityError::Init(e.to_string()))?;

    tracing::info!(
        service = %config.service_name,
        log_path = %log_path.display(),
        "observability initialized"
    );
    Ok(())
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Re-export tracing macros for convenience.
pub use tracing::{debug, error, info, instrument, trace, warn};
