//! `VoiceVision` Pilot - voice command assistant
//!
//! This library provides the building blocks of a push-to-talk assistant:
//! - Microphone capture and speaker playback (cpal)
//! - Remote STT/TTS gateway
//! - Command interpretation over a fixed Russian vocabulary
//! - Story narration split into resumable sentence chunks
//! - The session state machine tying it all together
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Front end (CLI)                      │
//! │   Enter = record/stop  │  typed text  │  notices    │
//! └────────────────────┬────────────────────────────────┘
//!                      │ events
//! ┌────────────────────▼────────────────────────────────┐
//! │               SessionController                      │
//! │   Capture │ Interpreter │ Narrator │ Playback       │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │        Remote services (HTTP)                        │
//! │   STT  │  TTS  │  Story / help generator            │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod command;
pub mod config;
pub mod error;
pub mod generator;
pub mod narrator;
pub mod session;
pub mod speech;

pub use audio::AudioClip;
pub use command::{Intent, interpret};
pub use config::Config;
pub use error::{Error, Result, Service};
pub use generator::{ChatGenerator, TextGenerator};
pub use narrator::{Advance, StoryNarrator, StoryPlaybackState, segment};
pub use session::{
    ChannelNotifier, Event, EventSender, LogEntry, LogNotifier, Notice, NoticeKind, Notifier,
    Role, SessionController, SessionParts, SessionUpdate, Status, Transcript, event_channel,
};
pub use speech::{HttpSpeechService, SpeechService};
