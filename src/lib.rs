//! # Crimegraph
//!
//! Retrieval-augmented question answering over a crime-investigation
//! knowledge graph.
//!
//! Crimegraph takes a natural-language question plus a short conversation
//! history, decides which slices of the graph are relevant, fetches them with
//! parameterized graph queries and answers from what it found, citing the
//! topic keys it used.
//!
//! ## Features
//!
//! - Lexical entity extraction (locations, organizations, person names, crime types)
//! - Declarative trigger table mapping question keywords to graph lookups
//! - Entity carry-over from recent conversation turns for follow-up questions
//! - Generative answers via an OpenAI-compatible or Ollama backend
//! - Deterministic fallback answers when no backend is reachable
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use crimegraph::services::GraphRagService;
//! use crimegraph::storage::Neo4jHttpDatastore;
//!
//! let datastore = Arc::new(Neo4jHttpDatastore::new(&config.datastore)?);
//! let service = GraphRagService::new(datastore, None, config.retrieval.clone());
//!
//! let answer = service.answer("Which criminal organizations operate in Chicago?", &[]);
//! println!("{}\n\nSources: {}", answer.answer, answer.sources.join(", "));
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod llm;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

pub use config::{CrimeGraphConfig, RetrievalConfig};
pub use llm::LlmProvider;
pub use models::{Answer, ChatTurn, ContextMapping, Conversation, Role, TopicData};
pub use services::{ContextAssembler, EntityExtractorService, GraphRagService, OverviewService};
pub use storage::GraphDatastore;

/// Error type for crimegraph operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Question fails validation, malformed config values |
/// | `OperationFailed` | Config file I/O, HTTP client setup, logging init |
/// | `Datastore` | Graph query transport errors or server-side query errors |
/// | `Backend` | Generative backend unreachable, non-2xx, empty output |
/// | `Decode` | A record is missing a field its topic requires |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - A question exceeds the configured maximum length
    /// - A question contains NUL characters
    /// - A config value cannot be parsed
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The graph datastore rejected or failed a query.
    ///
    /// Raised when:
    /// - The datastore is unreachable or times out
    /// - The server answers with a non-success status
    /// - The server reports a query error (syntax, constraint, auth)
    #[error("datastore query failed ({statement}): {cause}")]
    Datastore {
        /// Short identifier of the statement (lookup name or first line).
        statement: String,
        /// The underlying cause.
        cause: String,
    },

    /// The generative backend failed.
    #[error("generative backend '{provider}' failed: {cause}")]
    Backend {
        /// Provider name.
        provider: String,
        /// The underlying cause.
        cause: String,
    },

    /// A datastore record did not have the shape its topic requires.
    #[error("could not decode records for topic '{topic}': {cause}")]
    Decode {
        /// The topic key being decoded.
        topic: String,
        /// The underlying cause.
        cause: String,
    },
}

/// Result type alias for crimegraph operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("question too long".to_string());
        assert_eq!(err.to_string(), "invalid input: question too long");

        let err = Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: "not found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "operation 'read_config_file' failed: not found"
        );

        let err = Error::Datastore {
            statement: "database_stats".to_string(),
            cause: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "datastore query failed (database_stats): connection refused"
        );

        let err = Error::Decode {
            topic: "hotspots".to_string(),
            cause: "missing field `crimes`".to_string(),
        };
        assert!(err.to_string().contains("hotspots"));
    }
}
