//! Configuration management for Beacon dialogue
//!
//! Priority, lowest first: built-in defaults, TOML file, environment.
//! CLI flags are applied on top by the binary.

pub mod file;

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::completion::ChatOptions;
use crate::{Error, Result};

use file::DialogueConfigFile;

/// Default completion service (local Ollama)
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Default model identifier
pub const DEFAULT_MODEL: &str = "gemma2";

/// Dialogue manager configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Completion service configuration
    pub completion: CompletionConfig,

    /// Speech adapter configuration
    pub speech: SpeechConfig,
}

/// Completion service configuration
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Service base URL
    pub endpoint: String,

    /// Model identifier
    pub model: String,

    /// Per-request timeout
    pub timeout: Duration,

    /// Sampling options
    pub options: ChatOptions,
}

/// Which speech backend to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Text in, text out on the terminal
    #[default]
    Console,
    /// Microphone and speakers
    Audio,
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "console" | "text" => Ok(Self::Console),
            "audio" | "voice" => Ok(Self::Audio),
            other => Err(invalid(format!("unknown speech backend: {other}"))),
        }
    }
}

/// Speech adapter configuration
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// Backend to use
    pub backend: BackendKind,

    /// Recognition locale (e.g. "en-US")
    pub locale: String,

    /// Synthesis voice understood by the TTS endpoint (e.g. "alloy")
    pub voice: String,

    /// Listening window before a no-input is reported
    pub no_input_timeout: Duration,

    /// Trailing silence that ends an utterance; zero uses the backend default
    pub complete_timeout: Duration,

    /// Recognitions below this confidence are dropped
    pub min_confidence: Option<f32>,

    /// Whisper-compatible transcription URL
    pub stt_url: String,

    /// Transcription model
    pub stt_model: String,

    /// OpenAI-compatible speech synthesis URL
    pub tts_url: String,

    /// Synthesis model
    pub tts_model: String,

    /// Synthesis speed multiplier (0.25 to 4.0)
    pub tts_speed: f64,

    /// Bearer token for the STT/TTS endpoints (from `OPENAI_API_KEY`)
    pub api_key: Option<String>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(60),
            options: ChatOptions::default(),
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Console,
            locale: "en-US".to_string(),
            voice: "alloy".to_string(),
            no_input_timeout: Duration::from_millis(5000),
            complete_timeout: Duration::ZERO,
            min_confidence: None,
            stt_url: "https://api.openai.com/v1/audio/transcriptions".to_string(),
            stt_model: "whisper-1".to_string(),
            tts_url: "https://api.openai.com/v1/audio/speech".to_string(),
            tts_model: "tts-1".to_string(),
            tts_speed: 1.0,
            api_key: None,
        }
    }
}

impl Config {
    /// Load configuration from the config file (explicit `path` or the
    /// standard location) and the process environment
    ///
    /// # Errors
    ///
    /// Returns error if a value is invalid
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = file::load_config_file(path);
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    /// Merge a parsed config file and environment lookups over the defaults
    ///
    /// # Errors
    ///
    /// Returns error if a value is invalid
    pub fn resolve(
        file: DialogueConfigFile,
        env_var: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config = Self::default();

        // File overlay
        let completion = file.completion;
        if let Some(endpoint) = completion.endpoint {
            config.completion.endpoint = endpoint;
        }
        if let Some(model) = completion.model {
            config.completion.model = model;
        }
        if let Some(secs) = completion.timeout_secs {
            config.completion.timeout = Duration::from_secs(secs);
        }
        config.completion.options = completion.options;

        let speech = file.speech;
        if let Some(backend) = speech.backend {
            config.speech.backend = backend.parse()?;
        }
        if let Some(locale) = speech.locale {
            config.speech.locale = locale;
        }
        if let Some(voice) = speech.voice {
            config.speech.voice = voice;
        }
        if let Some(ms) = speech.no_input_timeout_ms {
            config.speech.no_input_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = speech.complete_timeout_ms {
            config.speech.complete_timeout = Duration::from_millis(ms);
        }
        config.speech.min_confidence = speech.min_confidence;
        if let Some(url) = speech.stt_url {
            config.speech.stt_url = url;
        }
        if let Some(model) = speech.stt_model {
            config.speech.stt_model = model;
        }
        if let Some(url) = speech.tts_url {
            config.speech.tts_url = url;
        }
        if let Some(model) = speech.tts_model {
            config.speech.tts_model = model;
        }
        if let Some(speed) = speech.tts_speed {
            config.speech.tts_speed = speed;
        }

        // Environment overrides
        if let Some(endpoint) = env_var("BEACON_DIALOGUE_ENDPOINT") {
            config.completion.endpoint = endpoint;
        }
        if let Some(model) = env_var("BEACON_DIALOGUE_MODEL") {
            config.completion.model = model;
        }
        if let Some(backend) = env_var("BEACON_DIALOGUE_BACKEND") {
            config.speech.backend = backend.parse()?;
        }
        if let Some(locale) = env_var("BEACON_DIALOGUE_LOCALE") {
            config.speech.locale = locale;
        }
        if let Some(voice) = env_var("BEACON_DIALOGUE_VOICE") {
            config.speech.voice = voice;
        }
        if let Some(ms) = env_var("BEACON_DIALOGUE_NO_INPUT_MS") {
            let ms = u64::from_str(&ms)
                .map_err(|e| invalid(format!("BEACON_DIALOGUE_NO_INPUT_MS: {e}")))?;
            config.speech.no_input_timeout = Duration::from_millis(ms);
        }
        config.speech.api_key = env_var("OPENAI_API_KEY").filter(|k| !k.is_empty());

        config.validate()?;
        Ok(config)
    }

    /// Check values that would make a session unusable
    ///
    /// # Errors
    ///
    /// Returns error describing the first invalid value
    pub fn validate(&self) -> Result<()> {
        if self.completion.model.trim().is_empty() {
            return Err(invalid("completion model must not be empty"));
        }

        let endpoint = &self.completion.endpoint;
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            let msg = format!("completion endpoint must be an http(s) URL: {endpoint}");
            return Err(invalid(msg));
        }

        if self.speech.no_input_timeout.is_zero() {
            return Err(invalid("no-input timeout must be positive"));
        }

        let speed = self.speech.tts_speed;
        if !(0.25..=4.0).contains(&speed) {
            let msg = format!("tts speed must be between 0.25 and 4.0, got {speed}");
            return Err(invalid(msg));
        }

        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> Error {
    Error::Config(msg.into())
}
