//! Graph datastore access.
//!
//! The retrieval core depends only on [`GraphDatastore`]. Backends:
//! - [`Neo4jHttpDatastore`]: Neo4j over the transactional HTTP endpoint
//! - [`InMemoryDatastore`]: scripted responses for tests and offline runs
//! - [`ResilientDatastore`]: circuit breaker around another backend

mod memory;
mod neo4j;
pub mod resilience;
pub mod traits;

pub use memory::{InMemoryDatastore, RecordedCall, normalize, records};
pub use neo4j::{Neo4jHttpDatastore, http_base_url};
pub use resilience::{BreakerConfig, CircuitBreaker, ResilientDatastore};
pub use traits::{GraphDatastore, Params, Record, params};
