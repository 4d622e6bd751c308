//! LLM resilience wrapper with circuit breaking and bounded retries.
//!
//! Timeouts are retried up to `max_retries` times; every other failure is
//! returned at once so the caller can fall back without delay. Once the
//! breaker opens, calls fail fast until the reset timeout elapses.

use super::{ChatMessage, CompletionOptions, LlmProvider};
use crate::config::LlmConfig;
use crate::storage::{BreakerConfig, CircuitBreaker};
use crate::{Error, Result};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Resilience configuration for generative calls.
#[derive(Debug, Clone)]
pub struct LlmResilienceConfig {
    /// Maximum number of retries for timeouts.
    pub max_retries: u32,
    /// Backoff between retries in milliseconds.
    pub retry_backoff_ms: u64,
    /// Circuit breaker settings.
    pub breaker: BreakerConfig,
}

impl Default for LlmResilienceConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            retry_backoff_ms: 100,
            breaker: BreakerConfig::default().with_failure_threshold(3),
        }
    }
}

impl LlmResilienceConfig {
    /// Loads resilience configuration from config file settings.
    #[must_use]
    pub fn from_config(config: &LlmConfig) -> Self {
        let mut settings = Self::default();
        if let Some(max_retries) = config.max_retries {
            settings.max_retries = max_retries;
        }
        if let Some(retry_backoff_ms) = config.retry_backoff_ms {
            settings.retry_backoff_ms = retry_backoff_ms;
        }
        if let Some(threshold) = config.breaker_failure_threshold {
            settings.breaker.failure_threshold = threshold.max(1);
        }
        if let Some(reset_ms) = config.breaker_reset_ms {
            settings.breaker.reset_timeout_ms = reset_ms;
        }
        settings
    }
}

/// LLM provider wrapper with circuit breaker and retry handling.
pub struct ResilientLlmProvider<P: LlmProvider> {
    inner: P,
    config: LlmResilienceConfig,
    breaker: Mutex<CircuitBreaker>,
}

impl<P: LlmProvider> ResilientLlmProvider<P> {
    /// Creates a new resilient provider wrapper.
    #[must_use]
    pub fn new(inner: P, config: LlmResilienceConfig) -> Self {
        let breaker = CircuitBreaker::new(&config.breaker, inner.name());
        Self {
            inner,
            config,
            breaker: Mutex::new(breaker),
        }
    }

    fn execute<F>(&self, mut call: F) -> Result<String>
    where
        F: FnMut() -> Result<String>,
    {
        let provider: &'static str = self.inner.name();
        let span = tracing::info_span!(
            "llm.request",
            provider = provider,
            status = tracing::field::Empty
        );
        let _enter = span.enter();

        let mut breaker = self.breaker.lock().unwrap_or_else(PoisonError::into_inner);
        if !breaker.allow() {
            let state = breaker.state_value();
            drop(breaker);
            Self::record_breaker_state(provider, state);
            span.record("status", "circuit_open");
            Self::record_request(provider, "circuit_open", None);
            return Err(Error::Backend {
                provider: provider.to_string(),
                cause: "circuit breaker open".to_string(),
            });
        }
        drop(breaker);

        let max_attempts = self.config.max_retries + 1;
        let mut attempts = 0;
        loop {
            attempts += 1;
            let started = Instant::now();
            let result = call();
            let elapsed = started.elapsed();

            match result {
                Ok(text) => {
                    Self::record_request(provider, "success", Some(elapsed));
                    let mut breaker = self.breaker.lock().unwrap_or_else(PoisonError::into_inner);
                    breaker.on_success();
                    let state = breaker.state_value();
                    drop(breaker);
                    Self::record_breaker_state(provider, state);
                    span.record("status", "success");
                    return Ok(text);
                },
                Err(err) => {
                    let is_timeout = is_timeout_error(&err);
                    let status = if is_timeout { "timeout" } else { "error" };
                    Self::record_request(provider, status, Some(elapsed));
                    span.record("status", status);

                    let mut breaker = self.breaker.lock().unwrap_or_else(PoisonError::into_inner);
                    let tripped = breaker.on_failure();
                    let state = breaker.state_value();
                    drop(breaker);
                    Self::record_breaker_state(provider, state);
                    if tripped {
                        metrics::counter!(
                            "llm_circuit_breaker_trips_total",
                            "provider" => provider
                        )
                        .increment(1);
                        return Err(err);
                    }

                    if !is_timeout || attempts >= max_attempts {
                        return Err(err);
                    }

                    tracing::warn!(
                        provider = provider,
                        attempt = attempts,
                        elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                        "Retrying LLM call after timeout"
                    );
                    metrics::counter!("llm_retries_total", "provider" => provider).increment(1);
                    if self.config.retry_backoff_ms > 0 {
                        std::thread::sleep(Duration::from_millis(self.config.retry_backoff_ms));
                    }
                },
            }
        }
    }

    fn record_request(provider: &'static str, status: &'static str, elapsed: Option<Duration>) {
        metrics::counter!(
            "llm_requests_total",
            "provider" => provider,
            "status" => status
        )
        .increment(1);
        if let Some(elapsed) = elapsed {
            metrics::histogram!(
                "llm_request_duration_ms",
                "provider" => provider,
                "status" => status
            )
            .record(elapsed.as_secs_f64() * 1000.0);
        }
    }

    fn record_breaker_state(provider: &'static str, state: u8) {
        metrics::gauge!("llm_circuit_breaker_state", "provider" => provider)
            .set(f64::from(state));
    }
}

impl<P: LlmProvider> LlmProvider for ResilientLlmProvider<P> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn complete_chat(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String> {
        self.execute(|| self.inner.complete_chat(messages, options))
    }
}

/// Returns whether an error was caused by a request deadline.
pub(crate) fn is_timeout_error(err: &Error) -> bool {
    match err {
        Error::Backend { cause, .. } | Error::OperationFailed { cause, .. } => {
            let lower = cause.to_lowercase();
            lower.contains("timeout")
                || lower.contains("timed out")
                || lower.contains("deadline")
                || lower.contains("elapsed")
        },
        _ => false,
    }
}
