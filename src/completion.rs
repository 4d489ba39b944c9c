//! Chat-completion service client
//!
//! Speaks the Ollama-style HTTP contract: `GET /api/tags` for model discovery
//! and a non-streaming `POST /api/chat` for completions.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::transcript::Turn;
use crate::{Error, Result};

/// Remote language model used by the dialogue controller
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Enumerate the identifiers of available models
    ///
    /// # Errors
    ///
    /// Returns error if the catalog is unreachable or malformed
    async fn list_models(&self) -> Result<Vec<String>>;

    /// Request one assistant reply for the given message list
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the reply has no content
    async fn complete(&self, messages: Vec<Turn>) -> Result<String>;
}

/// Sampling options forwarded verbatim to the service
///
/// Unset fields are omitted from the request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_penalty: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_last_n: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
}

/// Body of a chat request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model identifier
    pub model: String,
    /// Always `false`; replies are read whole
    pub stream: bool,
    /// Ordered role/content pairs
    pub messages: Vec<Turn>,
    /// Sampling options
    pub options: ChatOptions,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ChatResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// HTTP client for an Ollama-compatible completion endpoint
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    options: ChatOptions,
}

impl OllamaClient {
    /// Create a client for `endpoint` (e.g. `http://localhost:11434`)
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        options: ChatOptions,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let endpoint = endpoint.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            endpoint,
            model: model.into(),
            options,
        })
    }

    /// Configured model identifier
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Build the request body for a message list
    #[must_use]
    pub fn chat_request(&self, messages: Vec<Turn>) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            stream: false,
            messages,
            options: self.options.clone(),
        }
    }
}

#[async_trait]
impl CompletionService for OllamaClient {
    async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.endpoint);
        tracing::debug!(%url, "fetching model catalog");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Discovery(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Discovery(format!("status {status}: {body}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Discovery(e.to_string()))?;
        let tags: TagsResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Discovery(format!("malformed catalog: {e}")))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn complete(&self, messages: Vec<Turn>) -> Result<String> {
        let url = format!("{}/api/chat", self.endpoint);
        let request = self.chat_request(messages);
        tracing::debug!(
            %url,
            model = %request.model,
            messages = request.messages.len(),
            "requesting completion"
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Completion(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "completion API error");
            return Err(Error::Completion(format!("status {status}: {body}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Completion(e.to_string()))?;
        let reply: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Completion(format!("malformed reply: {e}")))?;

        let content = reply
            .message
            .and_then(|m| m.content)
            .ok_or_else(|| Error::Completion("reply missing message.content".to_string()))?;

        tracing::debug!(reply_len = content.len(), "completion received");
        Ok(content)
    }
}
