//! Datastore resilience wrapper with circuit breaking.
//!
//! A question fans out into as many as twenty lookups. When the datastore is
//! down, each one would otherwise wait out its own timeout; the breaker
//! rejects the rest immediately once failures pile up, and the retrieval
//! layer treats a rejection like any other per-lookup failure.
//!
//! # Circuit Breaker States
//!
//! ```text
//! +--------+     failures >= threshold     +------+
//! | Closed | --------------------------->  | Open |
//! +--------+                               +------+
//!     ^                                        |
//!     |  success                               | timeout elapsed
//!     |                                        v
//!     +--------------------------------  +-----------+
//!                                        | Half-Open |
//!                                        +-----------+
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use crimegraph::config::DatastoreConfig;
//! use crimegraph::storage::{Neo4jHttpDatastore, ResilientDatastore};
//!
//! # fn main() -> crimegraph::Result<()> {
//! let config = DatastoreConfig::default();
//! let inner = Neo4jHttpDatastore::new(&config)?;
//! let datastore = ResilientDatastore::new(inner, config.breaker());
//! # Ok(())
//! # }
//! ```

use super::traits::{GraphDatastore, Params, Record};
use crate::{Error, Result};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Breaker settings shared by the datastore and generative backend wrappers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Consecutive failures before opening the circuit.
    pub failure_threshold: u32,
    /// How long to keep the circuit open before half-open.
    pub reset_timeout_ms: u64,
    /// Maximum trial calls while half-open.
    pub half_open_max_calls: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl BreakerConfig {
    /// Creates the default settings: 5 failures, 30 s open, 1 half-open trial.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 30_000,
            half_open_max_calls: 1,
        }
    }

    /// Sets the failure threshold.
    #[must_use]
    pub const fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Sets the reset timeout in milliseconds.
    #[must_use]
    pub const fn with_reset_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.reset_timeout_ms = timeout_ms;
        self
    }
}

#[derive(Debug)]
enum BreakerState {
    Closed { failures: u32 },
    Open { opened_at: Instant },
    HalfOpen { attempts: u32 },
}

/// Circuit breaker state machine.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: BreakerState,
    failure_threshold: u32,
    reset_timeout: Duration,
    half_open_max_calls: u32,
    backend_name: &'static str,
}

impl CircuitBreaker {
    /// Creates a closed circuit breaker.
    #[must_use]
    pub fn new(config: &BreakerConfig, backend_name: &'static str) -> Self {
        Self {
            state: BreakerState::Closed { failures: 0 },
            failure_threshold: config.failure_threshold.max(1),
            reset_timeout: Duration::from_millis(config.reset_timeout_ms),
            half_open_max_calls: config.half_open_max_calls.max(1),
            backend_name,
        }
    }

    /// Checks if a request is allowed through.
    pub fn allow(&mut self) -> bool {
        match self.state {
            BreakerState::Closed { .. } => true,
            BreakerState::Open { opened_at } => {
                if opened_at.elapsed() >= self.reset_timeout {
                    tracing::info!(
                        backend = self.backend_name,
                        "Circuit breaker transitioning to half-open"
                    );
                    self.state = BreakerState::HalfOpen { attempts: 1 };
                    true
                } else {
                    false
                }
            },
            BreakerState::HalfOpen { ref mut attempts } => {
                if *attempts >= self.half_open_max_calls {
                    false
                } else {
                    *attempts += 1;
                    true
                }
            },
        }
    }

    /// Records a successful operation, closing the circuit.
    pub fn on_success(&mut self) {
        if !matches!(self.state, BreakerState::Closed { failures: 0 }) {
            tracing::info!(
                backend = self.backend_name,
                "Circuit breaker closing after success"
            );
        }
        self.state = BreakerState::Closed { failures: 0 };
    }

    /// Records a failed operation.
    ///
    /// Returns `true` if the circuit just opened.
    pub fn on_failure(&mut self) -> bool {
        match self.state {
            BreakerState::Closed { ref mut failures } => {
                *failures += 1;
                if *failures >= self.failure_threshold {
                    tracing::warn!(
                        backend = self.backend_name,
                        failures = *failures,
                        threshold = self.failure_threshold,
                        "Circuit breaker opened after consecutive failures"
                    );
                    self.state = BreakerState::Open {
                        opened_at: Instant::now(),
                    };
                    return true;
                }
            },
            BreakerState::HalfOpen { .. } => {
                tracing::warn!(
                    backend = self.backend_name,
                    "Circuit breaker re-opened after half-open failure"
                );
                self.state = BreakerState::Open {
                    opened_at: Instant::now(),
                };
                return true;
            },
            BreakerState::Open { .. } => {},
        }
        false
    }

    /// Returns the current state for metrics: 0 closed, 1 open, 2 half-open.
    #[must_use]
    pub const fn state_value(&self) -> u8 {
        match self.state {
            BreakerState::Closed { .. } => 0,
            BreakerState::Open { .. } => 1,
            BreakerState::HalfOpen { .. } => 2,
        }
    }
}

/// Datastore wrapper with circuit breaker protection.
pub struct ResilientDatastore<D: GraphDatastore> {
    inner: D,
    breaker: Mutex<CircuitBreaker>,
}

impl<D: GraphDatastore> ResilientDatastore<D> {
    /// Wraps a datastore.
    #[must_use]
    pub fn new(inner: D, config: BreakerConfig) -> Self {
        let breaker = CircuitBreaker::new(&config, inner.name());
        Self {
            inner,
            breaker: Mutex::new(breaker),
        }
    }

    /// Returns the wrapped datastore.
    pub const fn inner(&self) -> &D {
        &self.inner
    }

    fn record_metrics(backend: &'static str, status: &'static str, state: u8) {
        metrics::counter!(
            "datastore_requests_total",
            "backend" => backend,
            "status" => status
        )
        .increment(1);
        metrics::gauge!("datastore_circuit_breaker_state", "backend" => backend)
            .set(f64::from(state));
    }
}

impl<D: GraphDatastore> GraphDatastore for ResilientDatastore<D> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn query(&self, statement: &str, params: &Params) -> Result<Vec<Record>> {
        let backend = self.inner.name();
        let mut breaker = self.breaker.lock().unwrap_or_else(PoisonError::into_inner);
        if !breaker.allow() {
            let state = breaker.state_value();
            drop(breaker);
            Self::record_metrics(backend, "circuit_open", state);
            return Err(Error::Datastore {
                statement: super::memory::normalize(statement),
                cause: format!("circuit breaker open for backend '{backend}'"),
            });
        }
        drop(breaker);

        let result = self.inner.query(statement, params);

        let mut breaker = self.breaker.lock().unwrap_or_else(PoisonError::into_inner);
        match &result {
            Ok(_) => {
                breaker.on_success();
                let state = breaker.state_value();
                drop(breaker);
                Self::record_metrics(backend, "success", state);
            },
            Err(_) => {
                let tripped = breaker.on_failure();
                let state = breaker.state_value();
                drop(breaker);
                Self::record_metrics(backend, "error", state);
                if tripped {
                    metrics::counter!(
                        "datastore_circuit_breaker_trips_total",
                        "backend" => backend
                    )
                    .increment(1);
                }
            },
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryDatastore;

    const STATEMENT: &str = "MATCH (c:Crime) RETURN count(c) AS n";

    #[test]
    fn test_breaker_opens_after_threshold() {
        let config = BreakerConfig::default().with_failure_threshold(2);
        let mut breaker = CircuitBreaker::new(&config, "test");

        assert!(breaker.allow());
        assert!(!breaker.on_failure());
        assert!(breaker.on_failure());
        assert_eq!(breaker.state_value(), 1);
        assert!(!breaker.allow());
    }

    #[test]
    fn test_breaker_half_open_then_closes() {
        let config = BreakerConfig::default()
            .with_failure_threshold(1)
            .with_reset_timeout_ms(0);
        let mut breaker = CircuitBreaker::new(&config, "test");

        assert!(breaker.on_failure());
        assert!(breaker.allow());
        assert_eq!(breaker.state_value(), 2);
        assert!(!breaker.allow());
        breaker.on_success();
        assert_eq!(breaker.state_value(), 0);
    }

    #[test]
    fn test_breaker_reopens_on_half_open_failure() {
        let config = BreakerConfig::default()
            .with_failure_threshold(1)
            .with_reset_timeout_ms(0);
        let mut breaker = CircuitBreaker::new(&config, "test");
        breaker.on_failure();
        assert!(breaker.allow());
        assert!(breaker.on_failure());
        assert_eq!(breaker.state_value(), 1);
    }

    #[test]
    fn test_resilient_datastore_short_circuits() {
        let inner = InMemoryDatastore::new().with_failure(STATEMENT, "connection refused");
        let datastore = ResilientDatastore::new(
            inner,
            BreakerConfig::default().with_failure_threshold(2),
        );

        for _ in 0..2 {
            assert!(datastore.query(STATEMENT, &Params::new()).is_err());
        }
        let err = datastore.query(STATEMENT, &Params::new()).unwrap_err();
        assert!(err.to_string().contains("circuit breaker open"));
        assert_eq!(datastore.inner().calls().len(), 2);
    }

    #[test]
    fn test_resilient_datastore_passes_through() {
        let datastore = ResilientDatastore::new(InMemoryDatastore::new(), BreakerConfig::default());
        assert!(datastore.query(STATEMENT, &Params::new()).unwrap().is_empty());
        assert_eq!(datastore.name(), "memory");
    }
}
