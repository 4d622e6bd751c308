//! Ollama (local) client.

use super::{ChatMessage, CompletionOptions, LlmHttpConfig, LlmProvider, build_http_client};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Ollama local LLM client.
pub struct OllamaClient {
    /// API endpoint.
    endpoint: String,
    /// Model to use.
    model: String,
    /// HTTP client.
    client: reqwest::blocking::Client,
}

impl OllamaClient {
    /// Default API endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "http://localhost:11434";

    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "llama3.2";

    /// Creates a new Ollama client, honoring `OLLAMA_HOST` and `OLLAMA_MODEL`.
    #[must_use]
    pub fn new() -> Self {
        let endpoint =
            std::env::var("OLLAMA_HOST").unwrap_or_else(|_| Self::DEFAULT_ENDPOINT.to_string());
        let model =
            std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| Self::DEFAULT_MODEL.to_string());

        Self {
            endpoint,
            model,
            client: build_http_client(LlmHttpConfig::default()),
        }
    }

    /// Sets the API endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets HTTP client timeouts.
    #[must_use]
    pub fn with_http_config(mut self, config: LlmHttpConfig) -> Self {
        self.client = build_http_client(config);
        self
    }

    fn build_request<'a>(
        &self,
        messages: &'a [ChatMessage],
        options: &CompletionOptions,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model: self.model.clone(),
            messages,
            stream: false,
            options: ModelOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        }
    }

    fn backend_error(cause: impl Into<String>) -> Error {
        Error::Backend {
            provider: "ollama".to_string(),
            cause: cause.into(),
        }
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

impl LlmProvider for OllamaClient {
    fn name(&self) -> &'static str {
        "ollama"
    }

    fn complete_chat(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String> {
        let request = self.build_request(messages, options);

        let response = self
            .client
            .post(format!("{}/api/chat", self.endpoint))
            .json(&request)
            .send()
            .map_err(|e| {
                let error_kind = if e.is_timeout() {
                    "timeout"
                } else if e.is_connect() {
                    "connect"
                } else if e.is_request() {
                    "request"
                } else {
                    "unknown"
                };
                tracing::warn!(
                    provider = "ollama",
                    model = %self.model,
                    error = %e,
                    error_kind = error_kind,
                    "LLM chat request failed"
                );
                Self::backend_error(format!("{error_kind} error: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(Self::backend_error(format!(
                "API returned status: {status} - {body}"
            )));
        }

        let response: ChatResponse = response
            .json()
            .map_err(|e| Self::backend_error(format!("invalid response body: {e}")))?;

        Ok(response.message.content)
    }
}

/// Request to the Chat API.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: String,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ModelOptions,
}

#[derive(Debug, Serialize)]
struct ModelOptions {
    temperature: f32,
    num_predict: u32,
}

/// Response from the Chat API.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}
