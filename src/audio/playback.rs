//! Audio playback to speakers
//!
//! Playback never blocks the session: `play` starts a stream and returns,
//! completion is reported later as an event on the session queue.

use std::fmt;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};

use super::AudioClip;
use crate::session::{Event, EventSender};
use crate::{Error, Result};

/// Identifies one playback handle
///
/// Completion events carry the id so stale ones can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaybackId(pub u64);

impl fmt::Display for PlaybackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Output side of the session
///
/// At most one handle is live: `play` stops whatever was playing before.
pub trait AudioSink {
    /// Start playing `clip`; completion is posted as
    /// [`Event::PlaybackFinished`] or [`Event::PlaybackFailed`] with `id`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Playback`] if the clip cannot be decoded or the
    /// output device cannot be opened
    fn play(&mut self, id: PlaybackId, clip: AudioClip) -> Result<()>;

    /// Suspend the live handle, if any
    fn pause(&mut self);

    /// Continue a handle suspended by [`AudioSink::pause`]
    ///
    /// Returns false when there is nothing to resume.
    fn resume(&mut self) -> bool;

    /// Stop and release the live handle
    fn stop(&mut self);
}

struct ActivePlayback {
    id: PlaybackId,
    stream: Stream,
    paused: bool,
    finished: Arc<AtomicBool>,
}

/// Plays clips on the default output device
pub struct SpeakerSink {
    events: EventSender,
    current: Option<ActivePlayback>,
}

impl SpeakerSink {
    /// Create a sink that reports completion to `events`
    ///
    /// # Errors
    ///
    /// Returns error if no output device is available
    pub fn new(events: EventSender) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Playback("no output device available".to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            "audio playback initialized"
        );

        Ok(Self {
            events,
            current: None,
        })
    }

    /// Id of the live handle, if any
    #[must_use]
    pub fn current(&self) -> Option<PlaybackId> {
        self.current.as_ref().map(|p| p.id)
    }
}

impl AudioSink for SpeakerSink {
    fn play(&mut self, id: PlaybackId, clip: AudioClip) -> Result<()> {
        self.stop();

        let (samples, clip_rate) = decode_clip(&clip)?;

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Playback("no output device".to_string()))?;

        let config: StreamConfig = device
            .default_output_config()
            .map_err(|e| Error::Playback(e.to_string()))?
            .config();

        let device_rate = config.sample_rate.0;
        let samples = if clip_rate == device_rate {
            samples
        } else {
            resample_audio(&samples, clip_rate, device_rate)?
        };

        let channels = usize::from(config.channels);
        let sample_count = samples.len();
        let finished = Arc::new(AtomicBool::new(false));
        let done = Arc::clone(&finished);
        let events = self.events.clone();
        let error_events = self.events.clone();
        let mut feed = SampleFeed::new(samples);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if feed.fill(data, channels) && !done.swap(true, Ordering::SeqCst) {
                        let _ = events.send(Event::PlaybackFinished(id));
                    }
                },
                move |err| {
                    tracing::error!(error = %err, playback = %id, "audio playback error");
                    let _ = error_events.send(Event::PlaybackFailed(id, err.to_string()));
                },
                None,
            )
            .map_err(|e| Error::Playback(e.to_string()))?;

        stream.play().map_err(|e| Error::Playback(e.to_string()))?;

        tracing::debug!(
            playback = %id,
            samples = sample_count,
            sample_rate = device_rate,
            channels,
            "playback started"
        );

        self.current = Some(ActivePlayback {
            id,
            stream,
            paused: false,
            finished,
        });

        Ok(())
    }

    fn pause(&mut self) {
        let Some(active) = self.current.as_mut() else {
            return;
        };

        if active.paused || active.finished.load(Ordering::SeqCst) {
            return;
        }

        match active.stream.pause() {
            Ok(()) => {
                active.paused = true;
                tracing::debug!(playback = %active.id, "playback paused");
            }
            Err(e) => tracing::warn!(error = %e, playback = %active.id, "failed to pause playback"),
        }
    }

    fn resume(&mut self) -> bool {
        let Some(active) = self.current.as_mut() else {
            return false;
        };

        if !active.paused || active.finished.load(Ordering::SeqCst) {
            return false;
        }

        match active.stream.play() {
            Ok(()) => {
                active.paused = false;
                tracing::debug!(playback = %active.id, "playback resumed");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, playback = %active.id, "failed to resume playback");
                false
            }
        }
    }

    fn stop(&mut self) {
        if let Some(active) = self.current.take() {
            drop(active.stream);
            tracing::debug!(playback = %active.id, "playback stopped");
        }
    }
}

/// Copies mono samples into interleaved device buffers
struct SampleFeed {
    samples: Vec<f32>,
    position: usize,
}

impl SampleFeed {
    const fn new(samples: Vec<f32>) -> Self {
        Self {
            samples,
            position: 0,
        }
    }

    /// Fill `data`, padding with silence past the end
    ///
    /// Returns true once a whole buffer was written after the last sample,
    /// so the buffer holding the tail has already been handed to the device.
    fn fill(&mut self, data: &mut [f32], channels: usize) -> bool {
        let drained = self.position >= self.samples.len();

        for frame in data.chunks_mut(channels.max(1)) {
            let sample = self.samples.get(self.position).copied().unwrap_or(0.0);
            frame.fill(sample);
            if self.position < self.samples.len() {
                self.position += 1;
            }
        }

        drained
    }
}

/// Sink for headless runs: every clip "finishes" immediately
pub struct SilentSink {
    events: EventSender,
}

impl SilentSink {
    /// Create a sink that reports completion to `events`
    #[must_use]
    pub const fn new(events: EventSender) -> Self {
        Self { events }
    }
}

impl AudioSink for SilentSink {
    fn play(&mut self, id: PlaybackId, clip: AudioClip) -> Result<()> {
        tracing::debug!(playback = %id, bytes = clip.len(), "discarding clip");
        let _ = self.events.send(Event::PlaybackFinished(id));
        Ok(())
    }

    fn pause(&mut self) {}

    fn resume(&mut self) -> bool {
        false
    }

    fn stop(&mut self) {}
}

/// Decode a synthesized clip into mono f32 samples and their sample rate
///
/// WAV and MP3 payloads are supported; the format is taken from the content
/// type, falling back to the payload's magic bytes.
///
/// # Errors
///
/// Returns [`Error::Playback`] if the payload is not a supported format
pub fn decode_clip(clip: &AudioClip) -> Result<(Vec<f32>, u32)> {
    let content_type = clip.content_type().to_lowercase();
    let bytes = clip.bytes();

    match content_type.as_str() {
        "audio/mpeg" | "audio/mp3" => decode_mp3(bytes),
        "audio/wav" | "audio/wave" | "audio/x-wav" => decode_wav(bytes),
        _ if bytes.starts_with(b"RIFF") => decode_wav(bytes),
        _ if bytes.starts_with(b"ID3") || bytes.starts_with(&[0xFF, 0xFB]) => decode_mp3(bytes),
        other => Err(Error::Playback(format!("unsupported audio format: {other}"))),
    }
}

/// Decode WAV bytes, mixing channels down to mono
#[allow(clippy::cast_precision_loss)]
fn decode_wav(data: &[u8]) -> Result<(Vec<f32>, u32)> {
    let reader =
        hound::WavReader::new(Cursor::new(data)).map_err(|e| Error::Playback(e.to_string()))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Playback(e.to_string()))?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|s| s as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::Playback(e.to_string()))?
        }
    };

    let channels = usize::from(spec.channels.max(1));
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    Ok((samples, spec.sample_rate))
}

/// Decode MP3 bytes to f32 samples
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn decode_mp3(mp3_data: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = 24000_u32;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                sample_rate = frame.sample_rate as u32;
                if frame.channels == 2 {
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Playback(format!("MP3 decode error: {e}"))),
        }
    }

    Ok((samples, sample_rate))
}

/// Resample mono audio using rubato
///
/// The final partial chunk is zero-padded so the tail is not lost.
fn resample_audio(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    use rubato::{FftFixedIn, Resampler};

    const CHUNK_SIZE: usize = 1024;

    let mut resampler =
        FftFixedIn::<f32>::new(from_rate as usize, to_rate as usize, CHUNK_SIZE, 2, 1)
            .map_err(|e| Error::Playback(format!("resampler init failed: {e}")))?;

    let mut output = Vec::with_capacity(samples.len() * to_rate as usize / from_rate.max(1) as usize);

    for chunk in samples.chunks(CHUNK_SIZE) {
        let mut block = chunk.to_vec();
        block.resize(CHUNK_SIZE, 0.0);
        let result = resampler
            .process(&[block], None)
            .map_err(|e| Error::Playback(format!("resample failed: {e}")))?;
        output.extend_from_slice(&result[0]);
    }

    Ok(output)
}
