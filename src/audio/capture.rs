//! Audio capture from microphone

use std::fmt;
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};

use super::AudioClip;
use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Fragments appended by the capture callback, in arrival order
type Fragments = Arc<Mutex<Vec<Vec<f32>>>>;

/// Source of recordings
///
/// The session controller holds at most one [`Recording`] at a time and
/// refuses to call `start` again while one is active.
pub trait Microphone {
    /// Acquire the input device and begin buffering audio
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceUnavailable`] if permission is denied or no
    /// input device exists
    fn start(&mut self) -> Result<Recording>;

    /// Finalize a recording into a single clip
    ///
    /// Stopping with no active recording is a no-op returning `None`.
    ///
    /// # Errors
    ///
    /// Returns error if the buffered audio cannot be encoded
    fn stop(&mut self, recording: Option<Recording>) -> Result<Option<AudioClip>> {
        recording.map(Recording::finish).transpose()
    }
}

/// An in-progress recording
///
/// Owns the input stream; dropping or finishing it releases the device.
pub struct Recording {
    fragments: Fragments,
    sample_rate: u32,
    stream: Option<Stream>,
}

impl Recording {
    /// Create a recording that is not backed by a device
    ///
    /// Audio is supplied through [`Recording::sink`].
    #[must_use]
    pub fn detached(sample_rate: u32) -> Self {
        Self {
            fragments: Arc::default(),
            sample_rate,
            stream: None,
        }
    }

    /// Handle for appending fragments to this recording
    #[must_use]
    pub fn sink(&self) -> FragmentSink {
        FragmentSink(Arc::clone(&self.fragments))
    }

    /// Sample rate of the buffered audio
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of fragments buffered so far
    #[must_use]
    pub fn fragment_count(&self) -> usize {
        self.fragments.lock().map(|buf| buf.len()).unwrap_or_default()
    }

    /// Release the device and concatenate every fragment into one WAV clip
    ///
    /// # Errors
    ///
    /// Returns error if WAV encoding fails
    pub fn finish(self) -> Result<AudioClip> {
        let Self {
            fragments,
            sample_rate,
            stream,
        } = self;

        // Stream goes first so no fragment lands after the take
        if let Some(stream) = stream {
            drop(stream);
            tracing::debug!("audio capture stopped");
        }

        let fragments = fragments
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default();
        let samples = fragments.concat();

        tracing::debug!(
            fragments = fragments.len(),
            samples = samples.len(),
            "recording finalized"
        );

        samples_to_wav(&samples, sample_rate).map(AudioClip::wav)
    }
}

impl fmt::Debug for Recording {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recording")
            .field("sample_rate", &self.sample_rate)
            .field("fragments", &self.fragment_count())
            .field("device_backed", &self.stream.is_some())
            .finish()
    }
}

/// Appends audio fragments to a [`Recording`]
#[derive(Clone)]
pub struct FragmentSink(Fragments);

impl FragmentSink {
    /// Append one fragment of mono f32 samples
    pub fn push(&self, samples: &[f32]) {
        if let Ok(mut buf) = self.0.lock() {
            buf.push(samples.to_vec());
        }
    }
}

/// Captures audio from the default input device
#[derive(Debug, Default)]
pub struct CpalMicrophone;

impl CpalMicrophone {
    /// Create a microphone bound to the host's default input device
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Microphone for CpalMicrophone {
    fn start(&mut self) -> Result<Recording> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::DeviceUnavailable("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .ok_or_else(|| Error::DeviceUnavailable("no suitable audio config found".to_string()))?;

        let config: StreamConfig = supported_config
            .with_sample_rate(SampleRate(SAMPLE_RATE))
            .config();

        let fragments: Fragments = Arc::default();
        let sink = FragmentSink(Arc::clone(&fragments));

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| sink.push(data),
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;

        stream
            .play()
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            channels = config.channels,
            "audio capture started"
        );

        Ok(Recording {
            fragments,
            sample_rate: SAMPLE_RATE,
            stream: Some(stream),
        })
    }
}

/// Microphone used when audio input is switched off
#[derive(Debug, Default)]
pub struct DisabledMicrophone;

impl Microphone for DisabledMicrophone {
    fn start(&mut self) -> Result<Recording> {
        Err(Error::DeviceUnavailable(
            "microphone input is disabled".to_string(),
        ))
    }
}

/// Convert f32 samples to WAV bytes for the STT service
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
