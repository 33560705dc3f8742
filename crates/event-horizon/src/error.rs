//! Event Horizon error types.

use thiserror::Error;

/// Event Horizon error type.
#[derive(Error, Debug)]
pub enum HorizonError {
    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Collector URL could not be parsed
    #[error("Invalid collector URL: {0}")]
    Url(#[from] url::ParseError),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (config files, stdin)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No auth token available for the connection URL
    #[error("No auth token available")]
    MissingToken,

    /// Connection is not open
    #[error("Not connected to collector")]
    NotConnected,

    /// Frame could not be handed to the socket
    #[error("Failed to send message: {0}")]
    Send(String),

    /// Supervisor task has exited
    #[error("Supervisor is no longer running")]
    SupervisorStopped,
}

/// Result type alias using HorizonError.
pub type HorizonResult<T> = Result<T, HorizonError>;
