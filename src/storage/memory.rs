//! Scripted in-memory datastore.
//!
//! Answers statements from a table of canned responses. Statements are matched
//! after whitespace normalization, so a lookup constant and its scripted copy
//! only need the same tokens. Unknown statements return no records, which is
//! also what the `--offline` CLI mode runs against.

use super::traits::{GraphDatastore, Params, Record};
use crate::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

type Responder = Box<dyn Fn(&Params) -> Result<Vec<Record>> + Send + Sync>;

enum Script {
    Records(Vec<Record>),
    Dynamic(Responder),
    Fail(String),
}

/// A statement the datastore was asked to run.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// Normalized statement text.
    pub statement: String,
    /// Bound parameters.
    pub params: Params,
}

/// In-memory datastore for tests and offline runs.
///
/// # Example
///
/// ```rust
/// use crimegraph::storage::{GraphDatastore, InMemoryDatastore, Params, records};
/// use serde_json::json;
///
/// let datastore = InMemoryDatastore::new()
///     .with_response("MATCH (l:Location) RETURN l.name AS name", records(json!([{"name": "Loop"}])));
///
/// let rows = datastore.query("MATCH (l:Location)\n RETURN l.name AS name", &Params::new()).unwrap();
/// assert_eq!(rows[0]["name"], "Loop");
/// ```
#[derive(Default)]
pub struct InMemoryDatastore {
    scripts: HashMap<String, Script>,
    calls: RwLock<Vec<RecordedCall>>,
}

impl InMemoryDatastore {
    /// Creates a datastore that answers every statement with no records.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts a fixed response for a statement.
    #[must_use]
    pub fn with_response(mut self, statement: &str, records: Vec<Record>) -> Self {
        self.scripts
            .insert(normalize(statement), Script::Records(records));
        self
    }

    /// Scripts a parameter-dependent response for a statement.
    #[must_use]
    pub fn with_responder<F>(mut self, statement: &str, responder: F) -> Self
    where
        F: Fn(&Params) -> Result<Vec<Record>> + Send + Sync + 'static,
    {
        self.scripts
            .insert(normalize(statement), Script::Dynamic(Box::new(responder)));
        self
    }

    /// Scripts a failure for a statement.
    #[must_use]
    pub fn with_failure(mut self, statement: &str, cause: impl Into<String>) -> Self {
        self.scripts
            .insert(normalize(statement), Script::Fail(cause.into()));
        self
    }

    /// Returns every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the calls made for one statement.
    #[must_use]
    pub fn calls_for(&self, statement: &str) -> Vec<RecordedCall> {
        let key = normalize(statement);
        self.calls()
            .into_iter()
            .filter(|call| call.statement == key)
            .collect()
    }
}

impl GraphDatastore for InMemoryDatastore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn query(&self, statement: &str, params: &Params) -> Result<Vec<Record>> {
        let key = normalize(statement);
        self.calls
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                statement: key.clone(),
                params: params.clone(),
            });

        match self.scripts.get(&key) {
            Some(Script::Records(records)) => Ok(records.clone()),
            Some(Script::Dynamic(responder)) => responder(params),
            Some(Script::Fail(cause)) => Err(Error::Datastore {
                statement: key,
                cause: cause.clone(),
            }),
            None => Ok(Vec::new()),
        }
    }
}

/// Collapses runs of whitespace so formatting differences do not matter.
#[must_use]
pub fn normalize(statement: &str) -> String {
    statement.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Converts a JSON array of objects into records, skipping non-objects.
#[must_use]
pub fn records(value: Value) -> Vec<Record> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect(),
        Value::Object(map) => vec![map],
        _ => Vec::new(),
    }
}
