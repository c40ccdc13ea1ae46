//! Session event queue
//!
//! Front ends and audio sinks post events; the controller consumes them one
//! at a time, so "what happens when audio ends" depends only on the state at
//! the moment the event is handled.

use tokio::sync::mpsc;

use crate::audio::PlaybackId;

/// Input to the session state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// User pressed record
    StartCapture,
    /// User released record
    StopCapture,
    /// Start when idle, stop when recording
    ToggleCapture,
    /// Text that bypasses STT (typed input)
    Utterance(String),
    /// A playback handle reached its end
    PlaybackFinished(PlaybackId),
    /// A playback handle failed
    PlaybackFailed(PlaybackId, String),
    /// Stop the event loop
    Shutdown,
}

/// Sending half of the session queue
pub type EventSender = mpsc::UnboundedSender<Event>;

/// Receiving half of the session queue
pub type EventReceiver = mpsc::UnboundedReceiver<Event>;

/// Create a session queue
#[must_use]
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
