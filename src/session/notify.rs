//! Operator notifications
//!
//! Failures are surfaced on a side channel in addition to the transcript.
//! Notifying never blocks the session.

use std::fmt;

use tokio::sync::mpsc;

/// Failure category shown to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeKind {
    /// Microphone denied or missing
    MicrophoneDenied,
    /// STT call failed
    SpeechRecognition,
    /// TTS call failed
    VoiceSynthesis,
    /// Audio sink could not play a clip
    Playback,
    /// Story generation failed
    StoryGeneration,
    /// Help generation failed
    Help,
}

impl NoticeKind {
    /// Human readable category
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::MicrophoneDenied => "microphone unavailable",
            Self::SpeechRecognition => "speech recognition failed",
            Self::VoiceSynthesis => "voice synthesis failed",
            Self::Playback => "playback failed",
            Self::StoryGeneration => "story generation failed",
            Self::Help => "help request failed",
        }
    }

    /// Apology appended to the transcript
    #[must_use]
    pub const fn apology(self) -> &'static str {
        match self {
            Self::MicrophoneDenied => "Нет доступа к микрофону. Разрешите доступ и попробуйте снова.",
            Self::SpeechRecognition => "Не могу распознать речь. Попробуйте позже.",
            Self::VoiceSynthesis => "Не могу связаться с сервисом озвучивания. Попробуйте позже.",
            Self::Playback => "Не удалось воспроизвести аудиоответ.",
            Self::StoryGeneration => "Произошла ошибка при генерации сказки.",
            Self::Help => "Произошла ошибка при получении помощи.",
        }
    }
}

impl fmt::Display for NoticeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// A notification for the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Category
    pub kind: NoticeKind,
    /// Short title, derived from `kind`
    pub title: &'static str,
    /// Details, usually the underlying error
    pub description: String,
}

impl Notice {
    /// Create a notice
    #[must_use]
    pub fn new(kind: NoticeKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            title: kind.title(),
            description: description.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.description)
    }
}

/// Side channel to the human operator
pub trait Notifier {
    /// Deliver a notice without blocking
    fn notify(&self, notice: Notice);
}

/// Forwards notices over an unbounded channel
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notice>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiver to drain it
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notice: Notice) {
        if self.tx.send(notice).is_err() {
            tracing::debug!("notice receiver dropped");
        }
    }
}

/// Writes notices to the log only
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        tracing::warn!(kind = %notice.kind, description = %notice.description, "notice");
    }
}
