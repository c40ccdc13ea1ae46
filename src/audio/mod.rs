//! Audio capture and playback
//!
//! Handles microphone recording and speaker output.
//! STT and TTS happen remotely (see `speech`)

mod capture;
mod playback;

pub use capture::{
    CpalMicrophone, DisabledMicrophone, FragmentSink, Microphone, Recording, SAMPLE_RATE,
    samples_to_wav,
};
pub use playback::{AudioSink, PlaybackId, SilentSink, SpeakerSink, decode_clip};

/// MIME type of captured clips
pub const WAV_CONTENT_TYPE: &str = "audio/wav";

/// An encoded audio payload tagged with its content type
///
/// Ownership moves at every hand-off: capture → STT, TTS → sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    bytes: Vec<u8>,
    content_type: String,
}

impl AudioClip {
    /// Create a clip from raw bytes
    #[must_use]
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
        }
    }

    /// Create a WAV clip
    #[must_use]
    pub fn wav(bytes: Vec<u8>) -> Self {
        Self::new(bytes, WAV_CONTENT_TYPE)
    }

    /// Encoded payload
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// MIME type, e.g. `audio/wav` or `audio/mpeg`
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Payload size in bytes
    #[must_use]
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the payload is empty
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Consume the clip, returning the payload
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
