//! Remote speech services
//!
//! Speech-to-text and text-to-speech are black-box network calls.
//! Both are single shot: a failure surfaces immediately, retrying is up to
//! the user.

mod http;

use async_trait::async_trait;

pub use http::HttpSpeechService;

use crate::{AudioClip, Result};

/// Gateway to the STT and TTS services
#[async_trait]
pub trait SpeechService: Send + Sync {
    /// Transcribe a recorded clip
    ///
    /// Empty text is a valid result (silence), distinct from failure.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ServiceUnavailable`] on transport error or a
    /// non-success response
    async fn transcribe(&self, clip: AudioClip) -> Result<String>;

    /// Synthesize speech for non-empty `text`
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ServiceUnavailable`] on transport error or a
    /// non-success response
    async fn synthesize(&self, text: &str) -> Result<AudioClip>;
}
