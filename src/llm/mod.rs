//! Generative backend abstraction.
//!
//! Provides a unified chat-completion interface over OpenAI-compatible APIs
//! (`OpenRouter` by default) and a local Ollama server.

mod ollama;
mod openai;
mod resilience;
pub mod system_prompt;

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;
pub use resilience::{LlmResilienceConfig, ResilientLlmProvider};
pub use system_prompt::{CONTEXT_HEADING, INVESTIGATOR_SYSTEM_PROMPT, RESPONSE_STYLE_REMINDER};

use crate::Result;
use crate::config::{LlmConfig, LlmProviderKind};
use crate::models::{ChatTurn, Role};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// A role-tagged message sent to a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// Message role.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

impl From<&ChatTurn> for ChatMessage {
    fn from(turn: &ChatTurn) -> Self {
        Self {
            role: turn.role,
            content: turn.content.clone(),
        }
    }
}

/// Sampling parameters for one completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    /// Sampling temperature.
    pub temperature: f32,
    /// Output length cap in tokens.
    pub max_tokens: u32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1000,
        }
    }
}

/// Trait for generative backends.
pub trait LlmProvider: Send + Sync {
    /// The provider name.
    fn name(&self) -> &'static str;

    /// Generates a completion for a message sequence.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Backend`] if the backend is unreachable,
    /// answers with a non-success status, or returns no choices.
    fn complete_chat(&self, messages: &[ChatMessage], options: &CompletionOptions)
    -> Result<String>;
}

/// HTTP client configuration for generative backends.
#[derive(Debug, Clone, Copy)]
pub struct LlmHttpConfig {
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
}

impl Default for LlmHttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            connect_timeout_ms: 3_000,
        }
    }
}

impl LlmHttpConfig {
    /// Loads HTTP configuration from config file settings.
    #[must_use]
    pub fn from_config(config: &LlmConfig) -> Self {
        let mut settings = Self::default();
        if let Some(timeout_ms) = config.timeout_ms {
            settings.timeout_ms = timeout_ms;
        }
        if let Some(connect_timeout_ms) = config.connect_timeout_ms {
            settings.connect_timeout_ms = connect_timeout_ms;
        }
        settings
    }
}

/// Builds a blocking HTTP client for backend requests with configured timeouts.
#[must_use]
pub fn build_http_client(config: LlmHttpConfig) -> reqwest::blocking::Client {
    let mut builder = reqwest::blocking::Client::builder();
    if config.timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(config.timeout_ms));
    }
    if config.connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build LLM HTTP client: {err}");
        reqwest::blocking::Client::new()
    })
}

/// Constructs the configured backend, wrapped for resilience.
///
/// Returns `None` when generation is disabled or the provider lacks
/// credentials. The caller then answers every question with the fallback
/// formatter for the rest of its lifetime.
#[must_use]
pub fn build_llm_provider(config: &LlmConfig) -> Option<Arc<dyn LlmProvider>> {
    let http = LlmHttpConfig::from_config(config);
    let resilience = LlmResilienceConfig::from_config(config);

    match config.provider {
        LlmProviderKind::None => {
            tracing::info!("Generative backend disabled; using fallback answers");
            None
        },
        LlmProviderKind::OpenAi => {
            let Some(api_key) = config.api_key.clone() else {
                tracing::warn!(
                    provider = "openai",
                    "No API key configured; using fallback answers for this session"
                );
                return None;
            };
            let mut client = OpenAiClient::new()
                .with_secret_key(api_key)
                .with_http_config(http);
            if let Some(base_url) = &config.base_url {
                client = client.with_endpoint(base_url.clone());
            }
            if let Some(model) = &config.model {
                client = client.with_model(model.clone());
            }
            Some(Arc::new(ResilientLlmProvider::new(client, resilience)))
        },
        LlmProviderKind::Ollama => {
            let mut client = OllamaClient::new().with_http_config(http);
            if let Some(base_url) = &config.base_url {
                client = client.with_endpoint(base_url.clone());
            }
            if let Some(model) = &config.model {
                client = client.with_model(model.clone());
            }
            Some(Arc::new(ResilientLlmProvider::new(client, resilience)))
        },
    }
}
