//! Error types for the empa sensing and chat stack.

/// Top-level error type for the emotion-aware chat system.
#[derive(Debug, thiserror::Error)]
pub enum EmpaError {
    /// Audio device or stream error.
    #[error("audio error: {0}")]
    Audio(String),

    /// Video frame or expression inference error.
    #[error("vision error: {0}")]
    Vision(String),

    /// Model asset download or loading error.
    #[error("model error: {0}")]
    Model(String),

    /// Sensor hub coordination error.
    #[error("sensor error: {0}")]
    Sensor(String),

    /// Chat backend request error.
    #[error("chat error: {0}")]
    Chat(String),

    /// Speech-to-text dictation error.
    #[error("dictation error: {0}")]
    Dictation(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, EmpaError>;
