//! Configuration management for the voice assistant

pub mod file;

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::{Error, Result};
use file::VoiceVisionConfigFile;

/// Default speech server (STT + TTS)
pub const DEFAULT_SPEECH_URL: &str = "http://127.0.0.1:8081";

/// Default chat completions endpoint for stories and help
pub const DEFAULT_GENERATOR_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Default generator model
pub const DEFAULT_GENERATOR_MODEL: &str = "gpt-4o-mini";

/// Default bound for a single remote call
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// First transcript line of a new session
pub const DEFAULT_GREETING: &str = "Здравствуйте! Я ваш голосовой помощник. Нажмите на микрофон и скажите команду. Если нужна помощь, скажите 'помощь'.";

/// Assistant configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// STT/TTS endpoints
    pub speech: SpeechConfig,

    /// Story / help generator
    pub generator: GeneratorConfig,

    /// Session behaviour
    pub session: SessionConfig,

    /// Audio devices
    pub audio: AudioConfig,
}

/// Speech service endpoints
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// Base URL of the speech server
    pub base_url: Url,

    /// STT path relative to `base_url`
    pub stt_path: String,

    /// TTS path relative to `base_url`
    pub tts_path: String,
}

/// Text generator configuration
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Chat completions endpoint
    pub url: Url,

    /// Model identifier
    pub model: String,

    /// Bearer token, if the endpoint needs one
    pub api_key: Option<SecretString>,
}

/// Session state machine configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Upper bound for any single STT, TTS or generator call
    pub request_timeout: Duration,

    /// First transcript line, if any
    pub greeting: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            greeting: Some(DEFAULT_GREETING.to_string()),
        }
    }
}

/// Audio device configuration
#[derive(Debug, Clone, Copy)]
pub struct AudioConfig {
    /// Use the microphone
    pub input_enabled: bool,

    /// Play responses on the speakers
    pub output_enabled: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_enabled: true,
            output_enabled: true,
        }
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| Error::Config(format!("invalid URL {raw:?}: {e}")))
}

impl Config {
    /// Load configuration from the environment and config file
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is invalid
    pub fn load() -> Result<Self> {
        Self::load_with_options(false, false)
    }

    /// Load configuration with explicit device overrides
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is invalid
    pub fn load_with_options(disable_input: bool, mute: bool) -> Result<Self> {
        // env > toml > default
        let fc = file::load_config_file();
        let mut config = Self::resolve(fc, |key| std::env::var(key).ok())?;

        if disable_input {
            tracing::info!("microphone explicitly disabled");
            config.audio.input_enabled = false;
        }
        if mute {
            tracing::info!("speaker output explicitly disabled");
            config.audio.output_enabled = false;
        }

        Ok(config)
    }

    /// Merge a config file with environment lookups over the defaults
    ///
    /// # Errors
    ///
    /// Returns error if a URL does not parse or the timeout is zero
    pub fn resolve<F>(fc: VoiceVisionConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let speech = SpeechConfig {
            base_url: parse_url(
                &env("VOICEVISION_SPEECH_URL")
                    .or(fc.speech.base_url)
                    .unwrap_or_else(|| DEFAULT_SPEECH_URL.to_string()),
            )?,
            stt_path: fc.speech.stt_path.unwrap_or_else(|| "/stt".to_string()),
            tts_path: fc.speech.tts_path.unwrap_or_else(|| "/tts".to_string()),
        };

        let generator = GeneratorConfig {
            url: parse_url(
                &env("VOICEVISION_GENERATOR_URL")
                    .or(fc.generator.url)
                    .unwrap_or_else(|| DEFAULT_GENERATOR_URL.to_string()),
            )?,
            model: env("VOICEVISION_GENERATOR_MODEL")
                .or(fc.generator.model)
                .unwrap_or_else(|| DEFAULT_GENERATOR_MODEL.to_string()),
            api_key: env("OPENAI_API_KEY")
                .or(fc.generator.api_key)
                .filter(|k| !k.is_empty())
                .map(SecretString::from),
        };

        let timeout_secs = env("VOICEVISION_REQUEST_TIMEOUT")
            .and_then(|s| s.parse().ok())
            .or(fc.session.request_timeout_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT.as_secs());
        if timeout_secs == 0 {
            return Err(Error::Config(
                "request timeout must be at least one second".to_string(),
            ));
        }

        let greeting = match fc.session.greeting {
            Some(g) if g.trim().is_empty() => None,
            Some(g) => Some(g),
            None => Some(DEFAULT_GREETING.to_string()),
        };

        let session = SessionConfig {
            request_timeout: Duration::from_secs(timeout_secs),
            greeting,
        };

        let audio = AudioConfig {
            input_enabled: fc.audio.input_enabled.unwrap_or(true),
            output_enabled: fc.audio.output_enabled.unwrap_or(true),
        };

        Ok(Self {
            speech,
            generator,
            session,
            audio,
        })
    }
}
