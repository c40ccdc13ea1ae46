use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tokio::sync::{broadcast, mpsc};
use tracing_subscriber::EnvFilter;

use voicevision_pilot::audio::{
    AudioSink, CpalMicrophone, DisabledMicrophone, Microphone, PlaybackId, SAMPLE_RATE,
    SilentSink, SpeakerSink, decode_clip, samples_to_wav,
};
use voicevision_pilot::session::EventReceiver;
use voicevision_pilot::{
    AudioClip, ChannelNotifier, ChatGenerator, Config, Event, EventSender, HttpSpeechService,
    Notice, Role, SessionController, SessionParts, SessionUpdate, SpeechService, event_channel,
};

/// `VoiceVision` Pilot - push-to-talk voice assistant
#[derive(Parser)]
#[command(name = "voicevision", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Type commands instead of speaking them
    #[arg(long, env = "VOICEVISION_TEXT_ONLY")]
    text_only: bool,

    /// Do not play responses on the speakers
    #[arg(long, env = "VOICEVISION_MUTE")]
    mute: bool,

    /// Write the transcript as JSON to this file on exit
    #[arg(long, value_name = "PATH")]
    save_transcript: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Привет! Это проверка синтеза речи.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,voicevision_pilot=info",
        1 => "info,voicevision_pilot=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::TestTts { text } => test_tts(&text).await,
        };
    }

    let config = Config::load_with_options(cli.text_only, cli.mute)?;
    tracing::debug!(?config, "loaded configuration");

    let timeout = config.session.request_timeout;
    let (events, inbox) = event_channel();
    let (notifier, notices) = ChannelNotifier::channel();

    let microphone: Box<dyn Microphone> = if config.audio.input_enabled {
        Box::new(CpalMicrophone::new())
    } else {
        Box::new(DisabledMicrophone)
    };

    let parts = SessionParts {
        microphone,
        speech: Box::new(HttpSpeechService::new(&config.speech, timeout)?),
        generator: Box::new(ChatGenerator::new(&config.generator, timeout)?),
        sink: output_sink(config.audio.output_enabled, events.clone()),
        notifier: Box::new(notifier),
    };

    let session = SessionController::new(parts, &config.session, events.clone(), inbox);

    for entry in session.transcript().entries() {
        print_entry(entry.role, &entry.text);
    }
    if config.audio.input_enabled {
        println!("Enter: начать/закончить запись, текст: отправить команду, q: выход");
    } else {
        println!("Введите команду, q: выход");
    }

    tokio::spawn(print_updates(session.subscribe(), notices));

    // Blocking stdin reads live on their own thread so shutdown never waits
    // for a pending line
    let input_events = events.clone();
    let microphone_enabled = config.audio.input_enabled;
    std::thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || read_input(std::io::stdin().lock(), &input_events, microphone_enabled))
        .context("failed to spawn input reader")?;

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = events.send(Event::Shutdown);
        }
    });

    tracing::info!(
        speech = %config.speech.base_url,
        microphone = config.audio.input_enabled,
        speakers = config.audio.output_enabled,
        "voice assistant ready"
    );

    // cpal streams are not Send; the session stays on this task
    let transcript = session.run().await;

    if let Some(path) = cli.save_transcript {
        transcript.save(&path)?;
    }

    Ok(())
}

/// Speakers when available, otherwise a sink that only reports completion
fn output_sink(enabled: bool, events: EventSender) -> Box<dyn AudioSink> {
    if !enabled {
        return Box::new(SilentSink::new(events));
    }

    match SpeakerSink::new(events.clone()) {
        Ok(sink) => Box::new(sink),
        Err(e) => {
            tracing::warn!(error = %e, "speakers unavailable, responses will not be played");
            Box::new(SilentSink::new(events))
        }
    }
}

/// Forward input lines to the session until EOF or `q`
fn read_input(input: impl BufRead, events: &EventSender, microphone: bool) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read input");
                break;
            }
        };

        let event = match line.trim() {
            "q" | "quit" => break,
            "" if microphone => Event::ToggleCapture,
            "" => continue,
            text => Event::Utterance(text.to_string()),
        };

        if events.send(event).is_err() {
            return;
        }
    }

    let _ = events.send(Event::Shutdown);
}

/// Print status changes, transcript lines and notices
async fn print_updates(
    mut updates: broadcast::Receiver<SessionUpdate>,
    mut notices: mpsc::UnboundedReceiver<Notice>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(SessionUpdate::Status(status)) => println!("[{}]", status.message()),
                Ok(SessionUpdate::Logged(entry)) => print_entry(entry.role, &entry.text),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "update printer lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            Some(notice) = notices.recv() => {
                eprintln!("! {}: {}", notice.title, notice.description);
            }
        }
    }
}

fn print_entry(role: Role, text: &str) {
    match role {
        Role::User => println!("> {}", text.trim()),
        Role::Assistant => println!("< {}", text.trim()),
    }
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut microphone = CpalMicrophone::new();
    let recording = microphone.start()?;
    println!("Sample rate: {} Hz", recording.sample_rate());
    println!("---");

    tokio::time::sleep(Duration::from_secs(duration)).await;

    let clip = microphone
        .stop(Some(recording))?
        .context("microphone produced no recording")?;
    let (samples, _) = decode_clip(&clip)?;

    let energy = calculate_rms(&samples);
    let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

    println!(
        "Captured {} samples ({} bytes WAV) | RMS: {energy:.4} | Peak: {peak:.4}",
        samples.len(),
        clip.len()
    );

    println!("\n---");
    if energy > 0.001 {
        println!("Your mic is working!");
    } else {
        println!("RMS stayed near 0, check:");
        println!("  1. Is your mic plugged in?");
        println!("  2. Run: pactl info | grep 'Default Source'");
        println!("  3. Run: arecord -l (to list devices)");
    }

    Ok(())
}

/// Calculate RMS energy
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test speaker output with a sine wave
#[allow(clippy::future_not_send)]
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let frequency = 440.0_f32;
    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..SAMPLE_RATE * 2)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    println!("Playing {} samples at {} Hz...", samples.len(), SAMPLE_RATE);
    play_to_end(AudioClip::wav(samples_to_wav(&samples, SAMPLE_RATE)?)).await?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");

    Ok(())
}

/// Test TTS output via the speech server
#[allow(clippy::future_not_send)]
async fn test_tts(text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = Config::load()?;
    let speech = HttpSpeechService::new(&config.speech, config.session.request_timeout)?;

    println!("Synthesizing speech via {}...", speech.tts_url());
    let clip = speech.synthesize(text).await?;
    println!("Got {} bytes of {}", clip.len(), clip.content_type());

    println!("Playing audio...");
    play_to_end(clip).await?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}

/// Play one clip and wait for the sink to report completion
#[allow(clippy::future_not_send)]
async fn play_to_end(clip: AudioClip) -> anyhow::Result<()> {
    let (events, mut inbox): (EventSender, EventReceiver) = event_channel();
    let mut sink = SpeakerSink::new(events)?;
    let id = PlaybackId(1);
    sink.play(id, clip)?;

    while let Some(event) = inbox.recv().await {
        match event {
            Event::PlaybackFinished(done) if done == id => break,
            Event::PlaybackFailed(failed, reason) if failed == id => {
                anyhow::bail!("playback failed: {reason}");
            }
            _ => {}
        }
    }

    sink.stop();
    Ok(())
}
