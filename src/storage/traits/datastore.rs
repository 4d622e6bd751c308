//! Graph datastore trait.
//!
//! The retrieval core talks to the graph through a single operation: run one
//! declarative statement with bound parameters and get back an ordered list of
//! records. Every call is its own unit of work; nothing spans lookups.
//!
//! # Available Implementations
//!
//! | Backend | Use Case | Notes |
//! |---------|----------|-------|
//! | `Neo4jHttpDatastore` | Default | Transactional HTTP endpoint, auto-commit per call |
//! | `InMemoryDatastore` | Testing, offline | Scripted responses keyed by statement |
//! | `ResilientDatastore` | Wrapper | Circuit breaker around any backend |
//!
//! # Error Modes
//!
//! Implementations return [`crate::Error::Datastore`] for transport failures,
//! non-success responses and server-reported query errors. Callers in the
//! retrieval layer recover from these per lookup.

use crate::Result;
use serde_json::{Map, Value};

/// One result row: column alias to value.
pub type Record = Map<String, Value>;

/// Bound statement parameters.
pub type Params = Map<String, Value>;

/// Builds a parameter map from `(name, value)` pairs.
///
/// # Example
///
/// ```rust
/// use crimegraph::storage::params;
///
/// let p = params([("location", "Loop")]);
/// assert_eq!(p["location"], "Loop");
/// ```
#[must_use]
pub fn params<K, V, I>(pairs: I) -> Params
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Trait for graph datastore backends.
///
/// # Implementor Notes
///
/// - Methods use `&self` so a backend can be shared as `Arc<dyn GraphDatastore>`
/// - Values derived from caller input must travel in `params`, never in `statement`
/// - Record order must follow the order the backend produced rows in
pub trait GraphDatastore: Send + Sync {
    /// Backend name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Executes one read statement and returns its records.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Datastore`] if the backend is unreachable or
    /// rejects the statement.
    fn query(&self, statement: &str, params: &Params) -> Result<Vec<Record>>;
}
