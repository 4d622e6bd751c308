//! OpenAI-compatible chat completions client.
//!
//! Defaults to the `OpenRouter` gateway, which speaks the same protocol.

use super::{ChatMessage, CompletionOptions, LlmHttpConfig, LlmProvider, build_http_client};
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// OpenAI-compatible LLM client.
pub struct OpenAiClient {
    /// API key.
    api_key: Option<SecretString>,
    /// API endpoint.
    endpoint: String,
    /// Model to use.
    model: String,
    /// HTTP client.
    client: reqwest::blocking::Client,
}

impl OpenAiClient {
    /// Default API endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "https://openrouter.ai/api/v1";

    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "openai/gpt-oss-20b:free";

    /// Creates a new client, reading `OPENAI_API_KEY` if set.
    #[must_use]
    pub fn new() -> Self {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .map(SecretString::from);
        Self {
            api_key,
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            model: Self::DEFAULT_MODEL.to_string(),
            client: build_http_client(LlmHttpConfig::default()),
        }
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(self, key: impl Into<String>) -> Self {
        self.with_secret_key(SecretString::from(key.into()))
    }

    /// Sets the API key from an already-wrapped secret.
    #[must_use]
    pub fn with_secret_key(mut self, key: SecretString) -> Self {
        self.api_key = Some(key);
        self
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

    /// Returns the configured model.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Checks if the model is a GPT-5 family model.
    ///
    /// GPT-5 models use `max_completion_tokens` instead of `max_tokens`
    /// and only support the default temperature.
    fn is_gpt5_model(&self) -> bool {
        let model = self.model.rsplit('/').next().unwrap_or(&self.model);
        model.starts_with("gpt-5") || model.starts_with("o1") || model.starts_with("o3")
    }

    fn build_request<'a>(
        &self,
        messages: &'a [ChatMessage],
        options: &CompletionOptions,
    ) -> ChatCompletionRequest<'a> {
        if self.is_gpt5_model() {
            ChatCompletionRequest {
                model: self.model.clone(),
                messages,
                max_tokens: None,
                max_completion_tokens: Some(options.max_tokens),
                temperature: None,
            }
        } else {
            ChatCompletionRequest {
                model: self.model.clone(),
                messages,
                max_tokens: Some(options.max_tokens),
                max_completion_tokens: None,
                temperature: Some(options.temperature),
            }
        }
    }

    fn backend_error(cause: impl Into<String>) -> Error {
        Error::Backend {
            provider: "openai".to_string(),
            cause: cause.into(),
        }
    }
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl LlmProvider for OpenAiClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn complete_chat(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| Self::backend_error("OPENAI_API_KEY not set"))?;

        let request = self.build_request(messages, options);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(api_key.expose_secret())
            .json(&request)
            .send()
            .map_err(|e| {
                let error_kind = if e.is_timeout() {
                    "timeout"
                } else if e.is_connect() {
                    "connect"
                } else {
                    "request"
                };
                tracing::warn!(
                    provider = "openai",
                    model = %self.model,
                    error = %e,
                    error_kind = error_kind,
                    "LLM request failed"
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

        let response: ChatCompletionResponse = response
            .json()
            .map_err(|e| Self::backend_error(format!("invalid response body: {e}")))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Self::backend_error("No choices in response"))
    }
}

/// Request to the Chat Completions API.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: String,
    messages: &'a [ChatMessage],
    /// Token limit for GPT-4 and earlier models.
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    /// Token limit for GPT-5/o1/o3 models.
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}
