//! Elite Voices Error Types
//!
//! Centralized error handling for the journal pipeline.

use thiserror::Error;

/// Central error type for Elite Voices
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Journal error: {0}")]
    Journal(String),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Dialogue line has no text to speak")]
    EmptyText,

    #[error("Speech synthesis error: {0}")]
    Synthesis(String),

    #[error("Watcher error: {0}")]
    Watch(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for Elite Voices operations
pub type VoiceResult<T> = Result<T, VoiceError>;

impl From<notify::Error> for VoiceError {
    fn from(err: notify::Error) -> Self {
        VoiceError::Watch(err.to_string())
    }
}
