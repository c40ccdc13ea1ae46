//! Error types for the voice assistant

use std::fmt;

use thiserror::Error;

/// Result type alias for assistant operations
pub type Result<T> = std::result::Result<T, Error>;

/// Remote service a request was addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    /// Speech-to-text endpoint
    SpeechToText,
    /// Text-to-speech endpoint
    TextToSpeech,
    /// Story / help text generator
    TextGeneration,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SpeechToText => "STT",
            Self::TextToSpeech => "TTS",
            Self::TextGeneration => "text generation",
        })
    }
}

/// Errors that can occur in the voice assistant
#[derive(Debug, Error)]
pub enum Error {
    /// Microphone permission denied or no input device
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Remote call failed, timed out or answered with a non-success status
    #[error("{service} service unavailable: {reason}")]
    ServiceUnavailable {
        /// Which service failed
        service: Service,
        /// Human readable cause
        reason: String,
    },

    /// Audio sink could not play a synthesized clip
    #[error("playback failed: {0}")]
    Playback(String),

    /// Audio encoding or decoding error
    #[error("audio error: {0}")]
    Audio(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Build a [`Error::ServiceUnavailable`] for `service`
    #[must_use]
    pub fn unavailable(service: Service, reason: impl fmt::Display) -> Self {
        Self::ServiceUnavailable {
            service,
            reason: reason.to_string(),
        }
    }
}
