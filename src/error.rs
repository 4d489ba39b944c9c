//! Error types for Beacon dialogue

use thiserror::Error;

/// Result type alias for dialogue operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the dialogue manager
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Model discovery failed (fatal for a session)
    #[error("model discovery failed: {0}")]
    Discovery(String),

    /// Chat completion failed
    #[error("completion error: {0}")]
    Completion(String),

    /// Speech adapter error
    #[error("speech error: {0}")]
    Speech(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Session lifecycle error
    #[error("session error: {0}")]
    Session(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
