//! Session state machine
//!
//! The [`SessionController`] owns the status, the transcript, the story
//! narrator, the active recording and the active playback handle. It
//! consumes [`Event`]s one at a time and awaits every remote call of a
//! transition before taking the next event, so at most one transition is
//! ever in flight.
//!
//! Audio sinks report completion through the same queue. Each playback gets
//! a fresh [`PlaybackId`]; completion events for anything but the current
//! handle are stale and ignored.

mod event;
mod notify;
mod transcript;

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::sync::broadcast;

pub use event::{Event, EventReceiver, EventSender, event_channel};
pub use notify::{ChannelNotifier, LogNotifier, Notice, NoticeKind, Notifier};
pub use transcript::{LogEntry, Role, Transcript};

use crate::audio::{AudioSink, Microphone, PlaybackId, Recording};
use crate::command::{self, Intent};
use crate::config::SessionConfig;
use crate::generator::{HELP_INPUT, STORY_REQUEST, TextGenerator};
use crate::narrator::{Advance, StoryNarrator, StoryPlaybackState, segment};
use crate::speech::SpeechService;
use crate::{Error, Result, Service};

/// Spoken when the transcript comes back empty
pub const NOTHING_HEARD: &str = "Я ничего не услышала. Попробуйте еще раз.";

/// Spoken when a story is paused
pub const PAUSE_ACK: &str = "Пауза.";

/// Narrated when the story generator returns nothing usable
pub const STORY_FALLBACK: &str = "Извини, я не смогла придумать сказку.";

const UPDATE_CAPACITY: usize = 64;

/// Session status; exactly one at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Waiting for the user
    Idle,
    /// Microphone is capturing
    Recording,
    /// Waiting for speech recognition
    Recognizing,
    /// A response is playing
    Speaking,
    /// A story is paused
    Paused,
    /// The last action failed; any user action recovers
    Error,
}

impl Status {
    /// Status line shown to the user
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Idle => "Нажмите и говорите",
            Self::Recording => "Записываю...",
            Self::Recognizing => "Распознаю...",
            Self::Speaking => "Говорю...",
            Self::Paused => "Пауза",
            Self::Error => "Ошибка",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Recognizing => "recognizing",
            Self::Speaking => "speaking",
            Self::Paused => "paused",
            Self::Error => "error",
        })
    }
}

/// Observable change in the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// Status changed
    Status(Status),
    /// An entry was appended to the transcript
    Logged(LogEntry),
}

/// Collaborators of a session
pub struct SessionParts {
    /// Audio input
    pub microphone: Box<dyn Microphone>,
    /// STT / TTS
    pub speech: Box<dyn SpeechService>,
    /// Story and help text
    pub generator: Box<dyn TextGenerator>,
    /// Audio output
    pub sink: Box<dyn AudioSink>,
    /// Operator side channel
    pub notifier: Box<dyn Notifier>,
}

/// Drives one voice session
pub struct SessionController {
    microphone: Box<dyn Microphone>,
    speech: Box<dyn SpeechService>,
    generator: Box<dyn TextGenerator>,
    sink: Box<dyn AudioSink>,
    notifier: Box<dyn Notifier>,
    request_timeout: Duration,
    status: Status,
    transcript: Transcript,
    narrator: StoryNarrator,
    recording: Option<Recording>,
    playback: Option<PlaybackId>,
    last_playback: u64,
    events: EventSender,
    inbox: EventReceiver,
    updates: broadcast::Sender<SessionUpdate>,
}

impl SessionController {
    /// Create a session
    ///
    /// `events` must be the sending half of `inbox`; the sink handed in
    /// `parts` is expected to post its completion events there too.
    #[must_use]
    pub fn new(
        parts: SessionParts,
        config: &SessionConfig,
        events: EventSender,
        inbox: EventReceiver,
    ) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        let mut transcript = Transcript::new();
        if let Some(greeting) = &config.greeting {
            transcript.push(Role::Assistant, greeting.as_str());
        }

        Self {
            microphone: parts.microphone,
            speech: parts.speech,
            generator: parts.generator,
            sink: parts.sink,
            notifier: parts.notifier,
            request_timeout: config.request_timeout,
            status: Status::Idle,
            transcript,
            narrator: StoryNarrator::new(),
            recording: None,
            playback: None,
            last_playback: 0,
            events,
            inbox,
            updates,
        }
    }

    /// Current status
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    /// Everything said so far
    #[must_use]
    pub const fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Story chunks and cursor
    #[must_use]
    pub const fn story(&self) -> &StoryPlaybackState {
        self.narrator.state()
    }

    /// Narrator, for inspecting the pause gate
    #[must_use]
    pub const fn narrator(&self) -> &StoryNarrator {
        &self.narrator
    }

    /// Live playback handle, if any
    #[must_use]
    pub const fn playback(&self) -> Option<PlaybackId> {
        self.playback
    }

    /// Whether a recording is held
    #[must_use]
    pub const fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    /// Handle for posting events to this session
    #[must_use]
    pub fn sender(&self) -> EventSender {
        self.events.clone()
    }

    /// Receive status changes and transcript entries
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.updates.subscribe()
    }

    /// Consume events until [`Event::Shutdown`], then hand back the
    /// transcript
    #[allow(clippy::future_not_send)]
    pub async fn run(mut self) -> Transcript {
        tracing::info!("session started");

        while let Some(event) = self.inbox.recv().await {
            let shutdown = event == Event::Shutdown;
            self.handle(event).await;
            if shutdown {
                break;
            }
        }

        tracing::info!(entries = self.transcript.len(), "session ended");
        self.transcript
    }

    /// Handle every event already queued, including the ones posted while
    /// handling; returns how many were handled
    #[allow(clippy::future_not_send)]
    pub async fn run_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.inbox.try_recv() {
            let shutdown = event == Event::Shutdown;
            self.handle(event).await;
            handled += 1;
            if shutdown {
                break;
            }
        }
        handled
    }

    /// Apply one event
    #[allow(clippy::future_not_send)]
    pub async fn handle(&mut self, event: Event) {
        tracing::debug!(?event, status = %self.status, "session event");

        match event {
            Event::StartCapture => self.start_capture(),
            Event::StopCapture => self.stop_capture().await,
            Event::ToggleCapture => {
                if self.recording.is_some() {
                    self.stop_capture().await;
                } else {
                    self.start_capture();
                }
            }
            Event::Utterance(text) => self.on_transcript(&text).await,
            Event::PlaybackFinished(id) => self.on_playback_finished(id).await,
            Event::PlaybackFailed(id, reason) => self.on_playback_failed(id, &reason),
            Event::Shutdown => self.shutdown(),
        }
    }

    fn start_capture(&mut self) {
        if self.recording.is_some() {
            tracing::warn!("already recording, start ignored");
            return;
        }

        match self.microphone.start() {
            Ok(recording) => {
                self.recording = Some(recording);
                self.set_status(Status::Recording);
            }
            Err(e) => self.fail(NoticeKind::MicrophoneDenied, &e),
        }
    }

    #[allow(clippy::future_not_send)]
    async fn stop_capture(&mut self) {
        let Some(recording) = self.recording.take() else {
            tracing::debug!("not recording, stop ignored");
            return;
        };

        self.set_status(Status::Recognizing);

        let clip = match self.microphone.stop(Some(recording)) {
            Ok(Some(clip)) => clip,
            Ok(None) => {
                self.settle();
                return;
            }
            Err(e) => {
                self.fail(NoticeKind::SpeechRecognition, &e);
                return;
            }
        };

        tracing::debug!(bytes = clip.len(), "recording captured");

        let transcribed = bounded(
            self.request_timeout,
            Service::SpeechToText,
            self.speech.transcribe(clip),
        )
        .await;

        match transcribed {
            Ok(text) => self.on_transcript(&text).await,
            Err(e) => self.fail(NoticeKind::SpeechRecognition, &e),
        }
    }

    #[allow(clippy::future_not_send)]
    async fn on_transcript(&mut self, text: &str) {
        let text = text.trim();

        if text.is_empty() {
            tracing::info!("nothing heard");
            self.narrator.reset();
            self.say(NOTHING_HEARD).await;
            return;
        }

        self.log(Role::User, text);
        let intent = command::interpret(text);
        self.dispatch(intent).await;
    }

    #[allow(clippy::future_not_send)]
    async fn dispatch(&mut self, intent: Intent) {
        tracing::info!(%intent, "dispatching command");

        if !intent.controls_story() && self.narrator.is_active() {
            tracing::debug!("story interrupted");
            self.narrator.reset();
        }

        match intent {
            Intent::Pause => self.pause_story().await,
            Intent::Resume => self.resume_story().await,
            Intent::TellStory => self.tell_story().await,
            Intent::Help => self.help().await,
            Intent::OpenGames | Intent::OpenPuzzles | Intent::Goodbye | Intent::Unrecognized => {
                match intent.canned_response() {
                    Some(reply) => self.say(reply).await,
                    None => self.leave_recognizing(),
                }
            }
        }
    }

    #[allow(clippy::future_not_send)]
    async fn pause_story(&mut self) {
        if !self.narrator.is_active() || self.narrator.is_paused() {
            tracing::debug!("nothing to pause");
            self.leave_recognizing();
            return;
        }

        self.sink.pause();
        self.narrator.pause();
        self.say(PAUSE_ACK).await;
    }

    #[allow(clippy::future_not_send)]
    async fn resume_story(&mut self) {
        if !self.narrator.is_paused() {
            tracing::debug!("nothing to resume");
            self.leave_recognizing();
            return;
        }

        self.narrator.resume();

        if self.sink.resume() {
            tracing::debug!("playback resumed in place");
            self.settle();
            return;
        }

        // The interrupted chunk is replayed without logging it twice
        match self.narrator.current().map(str::to_owned) {
            Some(chunk) => self.voice(&chunk).await,
            None => self.continue_story().await,
        }
    }

    #[allow(clippy::future_not_send)]
    async fn tell_story(&mut self) {
        self.narrator.reset();
        self.set_status(Status::Recognizing);

        let generated = bounded(
            self.request_timeout,
            Service::TextGeneration,
            self.generator.generate_story(STORY_REQUEST),
        )
        .await;

        match generated {
            Ok(story) => {
                let chunks = segment(&story, STORY_FALLBACK);
                tracing::info!(chunks = chunks.len(), "story ready");
                self.narrator.load(chunks);
                self.continue_story().await;
            }
            Err(e) => self.fail(NoticeKind::StoryGeneration, &e),
        }
    }

    #[allow(clippy::future_not_send)]
    async fn help(&mut self) {
        self.set_status(Status::Recognizing);

        let generated = bounded(
            self.request_timeout,
            Service::TextGeneration,
            self.generator.list_commands(HELP_INPUT),
        )
        .await;

        match generated {
            Ok(text) if text.trim().is_empty() => self.say(&command::command_list()).await,
            Ok(text) => self.say(text.trim()).await,
            Err(e) => self.fail(NoticeKind::Help, &e),
        }
    }

    #[allow(clippy::future_not_send)]
    async fn continue_story(&mut self) {
        match self.narrator.advance() {
            Advance::Chunk(chunk) => self.say(&chunk).await,
            Advance::Finished => {
                tracing::info!("story complete");
                self.settle();
            }
        }
    }

    #[allow(clippy::future_not_send)]
    async fn on_playback_finished(&mut self, id: PlaybackId) {
        if self.playback != Some(id) {
            tracing::debug!(playback = %id, "stale completion ignored");
            return;
        }

        self.playback = None;

        if self.narrator.is_active() && !self.narrator.is_paused() {
            self.continue_story().await;
        } else {
            self.settle();
        }
    }

    fn on_playback_failed(&mut self, id: PlaybackId, reason: &str) {
        if self.playback != Some(id) {
            tracing::debug!(playback = %id, "stale failure ignored");
            return;
        }

        self.fail(NoticeKind::Playback, &reason);
    }

    /// Log `text` as an assistant entry, then speak it
    #[allow(clippy::future_not_send)]
    async fn say(&mut self, text: &str) {
        self.log(Role::Assistant, text);
        self.voice(text).await;
    }

    /// Synthesize and play `text` under a fresh playback id
    #[allow(clippy::future_not_send)]
    async fn voice(&mut self, text: &str) {
        let synthesized = bounded(
            self.request_timeout,
            Service::TextToSpeech,
            self.speech.synthesize(text),
        )
        .await;

        let clip = match synthesized {
            Ok(clip) => clip,
            Err(e) => {
                self.fail(NoticeKind::VoiceSynthesis, &e);
                return;
            }
        };

        self.last_playback += 1;
        let id = PlaybackId(self.last_playback);

        if let Err(e) = self.sink.play(id, clip) {
            self.fail(NoticeKind::Playback, &e);
            return;
        }

        tracing::debug!(playback = %id, "speaking");
        self.playback = Some(id);
        self.settle();
    }

    /// Abandon the current transition
    fn fail(&mut self, kind: NoticeKind, error: &dyn fmt::Display) {
        tracing::error!(kind = %kind, error = %error, "session failure");

        if self.recording.take().is_some() {
            tracing::debug!("recording released");
        }
        self.sink.stop();
        self.playback = None;
        self.narrator.reset();

        self.log(Role::Assistant, kind.apology());
        self.notifier.notify(Notice::new(kind, error.to_string()));
        self.set_status(Status::Error);
    }

    fn shutdown(&mut self) {
        self.recording = None;
        self.sink.stop();
        self.playback = None;
        self.narrator.reset();
        self.set_status(Status::Idle);
    }

    /// Pick the resting status from what is still held
    fn settle(&mut self) {
        let status = if self.recording.is_some() {
            Status::Recording
        } else if self.narrator.is_paused() {
            Status::Paused
        } else if self.playback.is_some() {
            Status::Speaking
        } else {
            Status::Idle
        };
        self.set_status(status);
    }

    /// No-op commands keep the status, unless it is the transient one left
    /// by speech recognition
    fn leave_recognizing(&mut self) {
        if self.status == Status::Recognizing {
            self.settle();
        }
    }

    fn set_status(&mut self, status: Status) {
        if self.status == status {
            return;
        }

        tracing::info!(from = %self.status, to = %status, "status changed");
        self.status = status;
        let _ = self.updates.send(SessionUpdate::Status(status));
    }

    fn log(&mut self, role: Role, text: &str) {
        let entry = self.transcript.push(role, text).clone();
        let _ = self.updates.send(SessionUpdate::Logged(entry));
    }
}

/// Await a remote call for at most `limit`
async fn bounded<T, F>(limit: Duration, service: Service, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| Error::unavailable(service, format!("no response within {limit:?}")))?
}
