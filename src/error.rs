use thiserror::Error;

/// Main error type for the session client
#[derive(Error, Debug)]
pub enum BoardError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Transport errors
    #[error("Connection open failed: {0}")]
    ConnectionOpen(String),

    #[error("Transport closed: {0}")]
    TransportClosed(String),

    // Protocol errors
    #[error("Protocol decode error: {0}")]
    ProtocolDecode(String),

    #[error("Fatal protocol error: {0}")]
    ProtocolFatal(String),

    #[error("Backend error: {0}")]
    Backend(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Session errors
    #[error("Analysis already running (phase: {phase})")]
    AlreadyRunning { phase: String },

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for BoardError
pub type Result<T> = std::result::Result<T, BoardError>;
