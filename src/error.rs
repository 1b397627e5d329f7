//! Error types for the buddy assistant.

/// Top-level error type for the assistant.
#[derive(Debug, thiserror::Error)]
pub enum BuddyError {
    /// Audio device or stream error.
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text transcription error.
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech synthesis error.
    #[error("TTS error: {0}")]
    Tts(String),

    /// Language model service error.
    #[error("LLM error: {0}")]
    Llm(String),

    /// Intent resolver construction error.
    #[error("intent error: {0}")]
    Intent(String),

    /// Mouse/keyboard automation error.
    #[error("automation error: {0}")]
    Automation(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Background task coordination error.
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, BuddyError>;
