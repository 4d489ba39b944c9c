//! Text-to-speech (TTS) processing

use crate::{Error, Result};

/// Synthesizes speech through an OpenAI-compatible HTTP endpoint
pub struct TextToSpeech {
    client: reqwest::blocking::Client,
    url: String,
    model: String,
    voice: String,
    speed: f64,
    api_key: Option<String>,
}

impl TextToSpeech {
    /// Create a synthesizer
    #[must_use]
    pub fn new(
        url: String,
        model: String,
        voice: String,
        speed: f64,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            url,
            model,
            voice,
            speed,
            api_key,
        }
    }

    /// Synthesize text to MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    pub fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f64,
            response_format: &'a str,
        }

        let body = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
            response_format: "mp3",
        };

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send()?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(Error::Tts(format!("TTS API error {status}: {body}")));
        }

        let audio = response.bytes()?;
        tracing::debug!(bytes = audio.len(), "speech synthesized");
        Ok(audio.to_vec())
    }
}
