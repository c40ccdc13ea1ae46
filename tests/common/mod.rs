//! Shared test utilities
//!
//! In-memory stand-ins for the microphone, remote services, speakers and
//! operator notifications. Synthesized clips carry their text as the payload
//! so tests can read back what was played.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use voicevision_pilot::audio::{AudioSink, Microphone, PlaybackId, Recording, SAMPLE_RATE};
use voicevision_pilot::config::SessionConfig;
use voicevision_pilot::{
    AudioClip, Error, Event, EventSender, Notice, Notifier, Result, Service, SessionController,
    SessionParts, SpeechService, TextGenerator, event_channel,
};

/// Content type of fake synthesized clips
pub const FAKE_CLIP_TYPE: &str = "text/plain";

/// Microphone that records a short burst of silence
#[derive(Clone, Default)]
pub struct FakeMicrophone {
    pub denied: bool,
    pub starts: Arc<AtomicUsize>,
}

impl Microphone for FakeMicrophone {
    fn start(&mut self) -> Result<Recording> {
        if self.denied {
            return Err(Error::DeviceUnavailable("permission denied".to_string()));
        }
        self.starts.fetch_add(1, Ordering::SeqCst);

        let recording = Recording::detached(SAMPLE_RATE);
        recording.sink().push(&[0.0; 160]);
        recording.sink().push(&[0.1; 160]);
        Ok(recording)
    }
}

/// Speech service answering from a script
///
/// Each `transcribe` pops the next entry; `None` means the call fails.
#[derive(Clone, Default)]
pub struct ScriptedSpeech {
    pub transcripts: Arc<Mutex<VecDeque<Option<String>>>>,
    pub synthesized: Arc<Mutex<Vec<String>>>,
    pub fail_synthesis: Arc<AtomicBool>,
    pub synthesis_delay: Option<Duration>,
}

impl ScriptedSpeech {
    pub fn hearing(transcripts: &[Option<&str>]) -> Self {
        let script = transcripts
            .iter()
            .map(|t| t.map(ToString::to_string))
            .collect();
        Self {
            transcripts: Arc::new(Mutex::new(script)),
            ..Self::default()
        }
    }

    pub fn break_synthesis(&self) {
        self.fail_synthesis.store(true, Ordering::SeqCst);
    }

    pub fn synthesized(&self) -> Vec<String> {
        self.synthesized.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechService for ScriptedSpeech {
    async fn transcribe(&self, clip: AudioClip) -> Result<String> {
        assert!(!clip.is_empty(), "transcribe called with an empty clip");

        let next = self.transcripts.lock().unwrap().pop_front();
        match next {
            Some(Some(text)) => Ok(text),
            Some(None) => Err(Error::unavailable(Service::SpeechToText, "status 500")),
            None => Ok(String::new()),
        }
    }

    async fn synthesize(&self, text: &str) -> Result<AudioClip> {
        if let Some(delay) = self.synthesis_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_synthesis.load(Ordering::SeqCst) {
            return Err(Error::unavailable(Service::TextToSpeech, "connection refused"));
        }

        self.synthesized.lock().unwrap().push(text.to_string());
        Ok(AudioClip::new(text.as_bytes().to_vec(), FAKE_CLIP_TYPE))
    }
}

/// Generator with fixed answers; `None` means the call fails
#[derive(Clone)]
pub struct FakeGenerator {
    pub story: Option<String>,
    pub help: Option<String>,
    pub calls: Arc<AtomicUsize>,
}

impl FakeGenerator {
    pub fn story(story: &str) -> Self {
        Self {
            story: Some(story.to_string()),
            ..Self::default()
        }
    }
}

impl Default for FakeGenerator {
    fn default() -> Self {
        Self {
            story: Some("Жил кот. Он спал.".to_string()),
            help: Some("Скажи: расскажи сказку.".to_string()),
            calls: Arc::default(),
        }
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate_story(&self, _request: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.story
            .clone()
            .ok_or_else(|| Error::unavailable(Service::TextGeneration, "status 503"))
    }

    async fn list_commands(&self, _user_input: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.help
            .clone()
            .ok_or_else(|| Error::unavailable(Service::TextGeneration, "status 503"))
    }
}

/// What a [`FakeSink`] was asked to do
#[derive(Debug, Default)]
pub struct SinkLog {
    pub played: Vec<(PlaybackId, String)>,
    pub current: Option<PlaybackId>,
    pub paused: bool,
    pub pauses: usize,
    pub stops: usize,
}

/// Sink that records plays; with `auto_finish` every clip completes at once
#[derive(Clone)]
pub struct FakeSink {
    pub events: EventSender,
    pub auto_finish: bool,
    pub fail_play: bool,
    pub log: Arc<Mutex<SinkLog>>,
}

impl FakeSink {
    pub fn played_texts(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .played
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn last_id(&self) -> PlaybackId {
        self.log
            .lock()
            .unwrap()
            .played
            .last()
            .map(|(id, _)| *id)
            .expect("nothing was played")
    }
}

impl AudioSink for FakeSink {
    fn play(&mut self, id: PlaybackId, clip: AudioClip) -> Result<()> {
        if self.fail_play {
            return Err(Error::Playback("no output device".to_string()));
        }

        let text = String::from_utf8(clip.into_bytes()).expect("fake clips are utf-8");
        {
            let mut log = self.log.lock().unwrap();
            log.played.push((id, text));
            log.current = Some(id);
            log.paused = false;
        }

        if self.auto_finish {
            self.events.send(Event::PlaybackFinished(id)).unwrap();
        }
        Ok(())
    }

    fn pause(&mut self) {
        let mut log = self.log.lock().unwrap();
        log.pauses += 1;
        if log.current.is_some() {
            log.paused = true;
        }
    }

    fn resume(&mut self) -> bool {
        let mut log = self.log.lock().unwrap();
        if log.paused && log.current.is_some() {
            log.paused = false;
            return true;
        }
        false
    }

    fn stop(&mut self) {
        let mut log = self.log.lock().unwrap();
        log.stops += 1;
        log.current = None;
        log.paused = false;
    }
}

/// Notifier that keeps every notice
#[derive(Clone, Default)]
pub struct CollectingNotifier {
    pub notices: Arc<Mutex<Vec<Notice>>>,
}

impl CollectingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

/// Knobs for [`harness`]
pub struct HarnessOptions {
    pub microphone: FakeMicrophone,
    pub speech: ScriptedSpeech,
    pub generator: FakeGenerator,
    pub auto_finish: bool,
    pub fail_play: bool,
    pub request_timeout: Duration,
    pub greeting: Option<String>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            microphone: FakeMicrophone::default(),
            speech: ScriptedSpeech::default(),
            generator: FakeGenerator::default(),
            auto_finish: true,
            fail_play: false,
            request_timeout: Duration::from_secs(5),
            greeting: None,
        }
    }
}

/// A session wired to fakes, plus handles to inspect them
pub struct Harness {
    pub session: SessionController,
    pub microphone: FakeMicrophone,
    pub speech: ScriptedSpeech,
    pub generator: FakeGenerator,
    pub sink: FakeSink,
    pub notifier: CollectingNotifier,
}

impl Harness {
    /// Post `event` and handle everything it leads to
    pub async fn send(&mut self, event: Event) {
        self.session.sender().send(event).unwrap();
        self.session.run_pending().await;
    }

    /// Record, stop and let the scripted transcript flow through
    pub async fn speak(&mut self) {
        self.send(Event::StartCapture).await;
        self.send(Event::StopCapture).await;
    }

    /// Transcript texts, oldest first
    pub fn log(&self) -> Vec<String> {
        self.session
            .transcript()
            .entries()
            .iter()
            .map(|e| e.text.clone())
            .collect()
    }
}

/// Build a session from `options`
pub fn harness(options: HarnessOptions) -> Harness {
    let (events, inbox) = event_channel();

    let sink = FakeSink {
        events: events.clone(),
        auto_finish: options.auto_finish,
        fail_play: options.fail_play,
        log: Arc::default(),
    };
    let notifier = CollectingNotifier::default();

    let parts = SessionParts {
        microphone: Box::new(options.microphone.clone()),
        speech: Box::new(options.speech.clone()),
        generator: Box::new(options.generator.clone()),
        sink: Box::new(sink.clone()),
        notifier: Box::new(notifier.clone()),
    };

    let config = SessionConfig {
        request_timeout: options.request_timeout,
        greeting: options.greeting,
    };

    Harness {
        session: SessionController::new(parts, &config, events, inbox),
        microphone: options.microphone,
        speech: options.speech,
        generator: options.generator,
        sink,
        notifier,
    }
}
