//! HTTP speech gateway
//!
//! Talks to a local speech server:
//! - `POST /stt` multipart form with an `audio` file field, answers `{"text": ...}`
//! - `POST /tts` JSON `{"text": ...}`, answers with the audio payload

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use super::SpeechService;
use crate::audio::WAV_CONTENT_TYPE;
use crate::config::SpeechConfig;
use crate::{AudioClip, Error, Result, Service};

/// Response from the STT endpoint
#[derive(serde::Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: Option<String>,
}

/// Request body for the TTS endpoint
#[derive(serde::Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
}

/// Speech service reached over HTTP
pub struct HttpSpeechService {
    client: reqwest::Client,
    stt_url: Url,
    tts_url: Url,
}

impl HttpSpeechService {
    /// Create a gateway for the configured endpoints
    ///
    /// # Errors
    ///
    /// Returns error if an endpoint URL is invalid or the client cannot be built
    pub fn new(config: &SpeechConfig, timeout: Duration) -> Result<Self> {
        let stt_url = join_endpoint(&config.base_url, &config.stt_path)?;
        let tts_url = join_endpoint(&config.base_url, &config.tts_path)?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        tracing::debug!(%stt_url, %tts_url, "speech gateway initialized");

        Ok(Self {
            client,
            stt_url,
            tts_url,
        })
    }

    /// STT endpoint
    #[must_use]
    pub const fn stt_url(&self) -> &Url {
        &self.stt_url
    }

    /// TTS endpoint
    #[must_use]
    pub const fn tts_url(&self) -> &Url {
        &self.tts_url
    }
}

fn join_endpoint(base: &Url, path: &str) -> Result<Url> {
    base.join(path)
        .map_err(|e| Error::Config(format!("invalid endpoint {base} + {path}: {e}")))
}

#[async_trait]
impl SpeechService for HttpSpeechService {
    async fn transcribe(&self, clip: AudioClip) -> Result<String> {
        tracing::debug!(audio_bytes = clip.len(), "starting transcription");

        let content_type = clip.content_type().to_string();
        let part = reqwest::multipart::Part::bytes(clip.into_bytes())
            .file_name("audio.wav")
            .mime_str(&content_type)
            .map_err(|e| Error::unavailable(Service::SpeechToText, e))?;
        let form = reqwest::multipart::Form::new().part("audio", part);

        let response = self
            .client
            .post(self.stt_url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "STT request failed");
                Error::unavailable(Service::SpeechToText, e)
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "STT service error");
            return Err(Error::unavailable(
                Service::SpeechToText,
                format!("status {status}: {body}"),
            ));
        }

        let result: TranscriptionResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse STT response");
            Error::unavailable(Service::SpeechToText, e)
        })?;

        let text = result.text.unwrap_or_default();
        tracing::info!(transcript = %text, "transcription complete");
        Ok(text)
    }

    async fn synthesize(&self, text: &str) -> Result<AudioClip> {
        if text.trim().is_empty() {
            return Err(Error::unavailable(
                Service::TextToSpeech,
                "refusing to synthesize empty text",
            ));
        }

        tracing::debug!(chars = text.chars().count(), "starting synthesis");

        let response = self
            .client
            .post(self.tts_url.clone())
            .json(&SynthesisRequest { text })
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "TTS request failed");
                Error::unavailable(Service::TextToSpeech, e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "TTS service error");
            return Err(Error::unavailable(
                Service::TextToSpeech,
                format!("status {status}: {body}"),
            ));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map_or_else(|| WAV_CONTENT_TYPE.to_string(), |v| v.trim().to_string());

        let audio = response
            .bytes()
            .await
            .map_err(|e| Error::unavailable(Service::TextToSpeech, e))?;

        tracing::debug!(bytes = audio.len(), content_type = %content_type, "synthesis complete");
        Ok(AudioClip::new(audio.to_vec(), content_type))
    }
}
