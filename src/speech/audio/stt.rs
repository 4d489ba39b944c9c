//! Speech-to-text (STT) processing

use crate::speech::Hypothesis;
use crate::{Error, Result};

/// Response from a Whisper-compatible transcription API (`verbose_json`)
#[derive(Debug, serde::Deserialize)]
struct WhisperResponse {
    text: String,
    #[serde(default)]
    segments: Vec<WhisperSegment>,
}

#[derive(Debug, serde::Deserialize)]
struct WhisperSegment {
    avg_logprob: f64,
}

impl WhisperResponse {
    /// Confidence from mean segment log-probability; 1.0 when not reported
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn confidence(&self) -> f32 {
        if self.segments.is_empty() {
            return 1.0;
        }
        let total: f64 = self.segments.iter().map(|s| s.avg_logprob).sum();
        let mean = total / self.segments.len() as f64;
        mean.exp().clamp(0.0, 1.0) as f32
    }
}

/// Transcribes speech through a Whisper-compatible HTTP endpoint
pub struct SpeechToText {
    client: reqwest::blocking::Client,
    url: String,
    model: String,
    language: Option<String>,
    api_key: Option<String>,
}

impl SpeechToText {
    /// Create a transcriber
    ///
    /// `locale` (e.g. "en-US") is reduced to its language code.
    #[must_use]
    pub fn new(url: String, model: String, locale: &str, api_key: Option<String>) -> Self {
        let language = locale
            .split(['-', '_'])
            .next()
            .filter(|l| !l.is_empty())
            .map(str::to_lowercase);

        Self {
            client: reqwest::blocking::Client::new(),
            url,
            model,
            language,
            api_key,
        }
    }

    /// Transcribe WAV audio
    ///
    /// Returns `None` when nothing intelligible was said.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails
    pub fn transcribe(&self, wav: Vec<u8>) -> Result<Option<Hypothesis>> {
        tracing::debug!(audio_bytes = wav.len(), "starting transcription");

        let part = reqwest::blocking::multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| Error::Stt(e.to_string()))?;
        let mut form = reqwest::blocking::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json");
        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        let mut request = self.client.post(&self.url).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().map_err(|e| {
            tracing::error!(error = %e, "STT request failed");
            e
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::error!(status = %status, body = %body, "STT API error");
            return Err(Error::Stt(format!("STT API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json()?;
        let text = result.text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let hypothesis = Hypothesis::new(text, result.confidence());
        tracing::info!(
            transcript = %hypothesis.utterance,
            confidence = hypothesis.confidence,
            "transcription complete"
        );
        Ok(Some(hypothesis))
    }
}
