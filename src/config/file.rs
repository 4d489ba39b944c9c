//! TOML configuration file loading
//!
//! Supports `~/.config/omni/beacon-dialogue/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::completion::ChatOptions;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct DialogueConfigFile {
    /// Completion service configuration
    #[serde(default)]
    pub completion: CompletionFileConfig,

    /// Speech adapter configuration
    #[serde(default)]
    pub speech: SpeechFileConfig,
}

/// Completion service configuration
#[derive(Debug, Default, Deserialize)]
pub struct CompletionFileConfig {
    /// Service base URL (e.g. "http://localhost:11434")
    pub endpoint: Option<String>,

    /// Model identifier (e.g. "gemma2")
    pub model: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,

    /// Sampling options passed through to the service
    #[serde(default)]
    pub options: ChatOptions,
}

/// Speech adapter configuration
#[derive(Debug, Default, Deserialize)]
pub struct SpeechFileConfig {
    /// Backend name ("console" or "audio")
    pub backend: Option<String>,

    /// Recognition locale (e.g. "en-US")
    pub locale: Option<String>,

    /// Synthesis voice (e.g. "alloy")
    pub voice: Option<String>,

    /// Listening window before a no-input is reported
    pub no_input_timeout_ms: Option<u64>,

    /// Trailing silence that ends an utterance (0 = backend default)
    pub complete_timeout_ms: Option<u64>,

    /// Recognitions below this confidence are dropped
    pub min_confidence: Option<f32>,

    /// Whisper-compatible transcription URL
    pub stt_url: Option<String>,

    /// Transcription model
    pub stt_model: Option<String>,

    /// OpenAI-compatible speech synthesis URL
    pub tts_url: Option<String>,

    /// Synthesis model
    pub tts_model: Option<String>,

    /// Synthesis speed multiplier
    pub tts_speed: Option<f64>,
}

/// Load the TOML config file from `path`, or from the standard path
///
/// Returns `DialogueConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file(path: Option<&Path>) -> DialogueConfigFile {
    let Some(path) = path.map(Path::to_path_buf).or_else(config_file_path) else {
        return DialogueConfigFile::default();
    };

    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file");
        return DialogueConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
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
                DialogueConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            DialogueConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/omni/beacon-dialogue/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| {
        d.config_dir()
            .join("omni")
            .join("beacon-dialogue")
            .join("config.toml")
    })
}
