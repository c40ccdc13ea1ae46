//! TOML configuration file loading
//!
//! Supports `~/.config/omni/voicevision/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct VoiceVisionConfigFile {
    /// STT/TTS endpoints
    #[serde(default)]
    pub speech: SpeechFileConfig,

    /// Story / help generator
    #[serde(default)]
    pub generator: GeneratorFileConfig,

    /// Session behaviour
    #[serde(default)]
    pub session: SessionFileConfig,

    /// Audio devices
    #[serde(default)]
    pub audio: AudioFileConfig,
}

/// Speech service configuration
#[derive(Debug, Default, Deserialize)]
pub struct SpeechFileConfig {
    /// Base URL of the speech server (e.g. `http://127.0.0.1:8081`)
    pub base_url: Option<String>,

    /// STT path relative to the base URL
    pub stt_path: Option<String>,

    /// TTS path relative to the base URL
    pub tts_path: Option<String>,
}

/// Text generator configuration
#[derive(Debug, Default, Deserialize)]
pub struct GeneratorFileConfig {
    /// Chat completions endpoint
    pub url: Option<String>,

    /// Model identifier
    pub model: Option<String>,

    /// API key sent as a bearer token
    pub api_key: Option<String>,
}

/// Session configuration
#[derive(Debug, Default, Deserialize)]
pub struct SessionFileConfig {
    /// Upper bound for any single remote call, in seconds
    pub request_timeout_secs: Option<u64>,

    /// First transcript line; empty string disables it
    pub greeting: Option<String>,
}

/// Audio device configuration
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    /// Use the microphone
    pub input_enabled: Option<bool>,

    /// Play responses on the speakers
    pub output_enabled: Option<bool>,
}

/// Load the TOML config file from the standard path
///
/// Returns `VoiceVisionConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> VoiceVisionConfigFile {
    config_file_path().map_or_else(VoiceVisionConfigFile::default, |path| {
        load_config_from(&path)
    })
}

/// Load a config file from `path`, falling back to defaults
pub fn load_config_from(path: &Path) -> VoiceVisionConfigFile {
    if !path.exists() {
        return VoiceVisionConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                VoiceVisionConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            VoiceVisionConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/omni/voicevision/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| {
        d.config_dir()
            .join("omni")
            .join("voicevision")
            .join("config.toml")
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_partial_file_overlay() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[speech]\nbase_url = \"http://10.0.0.5:9000\"\n\n[session]\nrequest_timeout_secs = 5"
        )
        .unwrap();

        let fc = load_config_from(file.path());
        assert_eq!(fc.speech.base_url.as_deref(), Some("http://10.0.0.5:9000"));
        assert!(fc.speech.stt_path.is_none());
        assert_eq!(fc.session.request_timeout_secs, Some(5));
        assert!(fc.generator.model.is_none());
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[speech\nbase_url = ").unwrap();

        let fc = load_config_from(file.path());
        assert!(fc.speech.base_url.is_none());
    }

    #[test]
    fn test_missing_file_is_default() {
        let fc = load_config_from(Path::new("/nonexistent/voicevision/config.toml"));
        assert!(fc.audio.input_enabled.is_none());
    }
}
