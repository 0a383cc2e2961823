//! Error types for tabscribe.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TabscribeError {
    // Capture errors
    #[error("No active tab to capture")]
    NoTargetSurface,

    #[error("Cannot capture audio from this page")]
    UnsupportedSurface,

    #[error("Cannot inject overlay receiver: {message}")]
    ReceiverInjectionFailed { message: String },

    #[error("No audio tracks found in stream")]
    NoAudioTrack,

    #[error("Stream acquisition failed: {message}")]
    StreamAcquisition { message: String },

    // Inference errors
    #[error("Model load failed: {message}")]
    ModelLoadFailed { message: String },

    #[error("Inference failed: {message}")]
    Inference { message: String },

    // Coordinator timeouts
    #[error("Inference context did not answer liveness probe within {timeout_ms}ms")]
    LivenessTimeout { timeout_ms: u64 },

    #[error("Inference context did not acknowledge start within {timeout_ms}ms")]
    StartAckTimeout { timeout_ms: u64 },

    // Relay errors
    #[error("Relay channel closed: {context}")]
    ChannelClosed { context: String },

    // Session storage errors
    #[error("Session store error: {message}")]
    SessionStore { message: String },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, TabscribeError>;
