//! Neo4j datastore over the transactional HTTP endpoint.
//!
//! Each [`GraphDatastore::query`] call is posted to
//! `{base}/db/{database}/tx/commit`, which opens, runs and commits a
//! transaction in one round trip. No session or transaction outlives the call.

use super::traits::{GraphDatastore, Params, Record};
use crate::config::DatastoreConfig;
use crate::{Error, Result};
use reqwest::header::ACCEPT;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};

/// Longest statement prefix carried in error messages.
const STATEMENT_LABEL_MAX: usize = 60;

/// Neo4j datastore using the HTTP transactional API.
pub struct Neo4jHttpDatastore {
    commit_url: String,
    user: String,
    password: Option<SecretString>,
    client: reqwest::blocking::Client,
}

impl Neo4jHttpDatastore {
    /// Creates a datastore from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the URI scheme is unsupported or the HTTP client
    /// cannot be built.
    pub fn new(config: &DatastoreConfig) -> Result<Self> {
        let base = http_base_url(&config.uri)?;
        let mut builder = reqwest::blocking::Client::builder();
        if config.timeout_ms > 0 {
            builder = builder.timeout(Duration::from_millis(config.timeout_ms));
        }
        if config.connect_timeout_ms > 0 {
            builder = builder.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
        }
        let client = builder.build().map_err(|e| Error::OperationFailed {
            operation: "build_datastore_client".to_string(),
            cause: e.to_string(),
        })?;

        Ok(Self {
            commit_url: format!("{base}/db/{}/tx/commit", config.database),
            user: config.user.clone(),
            password: config.password.clone(),
            client,
        })
    }

    /// Returns the endpoint every statement is posted to.
    #[must_use]
    pub fn commit_url(&self) -> &str {
        &self.commit_url
    }
}

impl GraphDatastore for Neo4jHttpDatastore {
    fn name(&self) -> &'static str {
        "neo4j"
    }

    fn query(&self, statement: &str, params: &Params) -> Result<Vec<Record>> {
        let start = Instant::now();
        let body = TxRequest {
            statements: vec![TxStatement {
                statement,
                parameters: params,
                result_data_contents: ["row"],
            }],
        };

        let mut request = self
            .client
            .post(&self.commit_url)
            .header(ACCEPT, "application/json")
            .json(&body);
        if let Some(password) = &self.password {
            request = request.basic_auth(&self.user, Some(password.expose_secret()));
        }

        let response = request
            .send()
            .map_err(|e| datastore_error(statement, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(datastore_error(
                statement,
                format!("server returned status: {status} - {body}"),
            ));
        }

        let payload: TxResponse = response
            .json()
            .map_err(|e| datastore_error(statement, format!("invalid response body: {e}")))?;
        let records = decode_response(statement, payload)?;

        tracing::debug!(
            rows = records.len(),
            elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "neo4j statement completed"
        );
        Ok(records)
    }
}

/// Maps a driver-style URI onto the HTTP endpoint base.
///
/// `bolt://` and `neo4j://` map to `http://` on port 7474; their `+s`/`+ssc`
/// variants map to `https://` on the default port. `http(s)://` is kept.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for an empty URI or an unknown scheme.
pub fn http_base_url(uri: &str) -> Result<String> {
    let uri = uri.trim().trim_end_matches('/');
    let (scheme, rest) = uri
        .split_once("://")
        .ok_or_else(|| Error::InvalidInput(format!("datastore uri has no scheme: '{uri}'")))?;
    if rest.is_empty() {
        return Err(Error::InvalidInput(format!(
            "datastore uri has no host: '{uri}'"
        )));
    }

    match scheme.to_lowercase().as_str() {
        "http" | "https" => Ok(uri.to_string()),
        "bolt" | "neo4j" => {
            let host = rest.split(':').next().unwrap_or(rest);
            Ok(format!("http://{host}:7474"))
        },
        "bolt+s" | "bolt+ssc" | "neo4j+s" | "neo4j+ssc" => {
            let host = rest.split(':').next().unwrap_or(rest);
            Ok(format!("https://{host}"))
        },
        other => Err(Error::InvalidInput(format!(
            "unsupported datastore uri scheme: '{other}'"
        ))),
    }
}

/// Turns a transactional response into records.
fn decode_response(statement: &str, payload: TxResponse) -> Result<Vec<Record>> {
    if let Some(error) = payload.errors.first() {
        return Err(datastore_error(
            statement,
            format!("{}: {}", error.code, error.message),
        ));
    }

    let Some(result) = payload.results.into_iter().next() else {
        return Ok(Vec::new());
    };

    let columns = result.columns;
    Ok(result
        .data
        .into_iter()
        .map(|row| columns.iter().cloned().zip(row.row).collect())
        .collect())
}

fn datastore_error(statement: &str, cause: String) -> Error {
    Error::Datastore {
        statement: statement_label(statement),
        cause,
    }
}

/// Short single-line label for a statement.
fn statement_label(statement: &str) -> String {
    let collapsed = statement.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= STATEMENT_LABEL_MAX {
        collapsed
    } else {
        let head: String = collapsed.chars().take(STATEMENT_LABEL_MAX).collect();
        format!("{head}...")
    }
}

#[derive(Debug, Serialize)]
struct TxRequest<'a> {
    statements: Vec<TxStatement<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TxStatement<'a> {
    statement: &'a str,
    parameters: &'a Params,
    result_data_contents: [&'static str; 1],
}

#[derive(Debug, Deserialize)]
struct TxResponse {
    #[serde(default)]
    results: Vec<TxResult>,
    #[serde(default)]
    errors: Vec<TxError>,
}

#[derive(Debug, Deserialize)]
struct TxResult {
    columns: Vec<String>,
    #[serde(default)]
    data: Vec<TxRow>,
}

#[derive(Debug, Deserialize)]
struct TxRow {
    row: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct TxError {
    code: String,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::params;
    use serde_json::json;

    fn response(value: Value) -> TxResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_http_base_url_mapping() {
        assert_eq!(
            http_base_url("bolt://localhost:7687").unwrap(),
            "http://localhost:7474"
        );
        assert_eq!(
            http_base_url("neo4j://graph.internal").unwrap(),
            "http://graph.internal:7474"
        );
        assert_eq!(
            http_base_url("neo4j+s://abc123.databases.neo4j.io").unwrap(),
            "https://abc123.databases.neo4j.io"
        );
        assert_eq!(
            http_base_url("http://localhost:7474/").unwrap(),
            "http://localhost:7474"
        );
    }

    #[test]
    fn test_http_base_url_rejects_bad_uris() {
        assert!(http_base_url("localhost:7687").is_err());
        assert!(http_base_url("ftp://localhost").is_err());
        assert!(http_base_url("bolt://").is_err());
    }

    #[test]
    fn test_commit_url_uses_database() {
        let config = DatastoreConfig {
            uri: "bolt://localhost:7687".to_string(),
            database: "crimes".to_string(),
            ..DatastoreConfig::default()
        };
        let datastore = Neo4jHttpDatastore::new(&config).unwrap();
        assert_eq!(
            datastore.commit_url(),
            "http://localhost:7474/db/crimes/tx/commit"
        );
        assert_eq!(datastore.name(), "neo4j");
    }

    #[test]
    fn test_decode_response_zips_columns() {
        let payload = response(json!({
            "results": [{
                "columns": ["location", "crimes"],
                "data": [
                    {"row": ["Loop", 12], "meta": [null, null]},
                    {"row": ["Pilsen", 7], "meta": [null, null]}
                ]
            }],
            "errors": []
        }));
        let records = decode_response("MATCH ...", payload).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["location"], json!("Loop"));
        assert_eq!(records[1]["crimes"], json!(7));
    }

    #[test]
    fn test_decode_response_surfaces_server_errors() {
        let payload = response(json!({
            "results": [],
            "errors": [{
                "code": "Neo.ClientError.Statement.SyntaxError",
                "message": "Invalid input"
            }]
        }));
        let err = decode_response("MATCH (n RETURN n", payload).unwrap_err();
        match err {
            Error::Datastore { statement, cause } => {
                assert_eq!(statement, "MATCH (n RETURN n");
                assert!(cause.contains("SyntaxError"));
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_decode_response_without_results() {
        let records = decode_response("RETURN 1", response(json!({}))).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_statement_label_collapses_whitespace() {
        let label = statement_label("\n    MATCH (c:Crime)\n    RETURN count(c) AS n\n");
        assert_eq!(label, "MATCH (c:Crime) RETURN count(c) AS n");

        let long = "MATCH (p:Person) ".repeat(10);
        let label = statement_label(&long);
        assert!(label.ends_with("..."));
        assert_eq!(label.chars().count(), STATEMENT_LABEL_MAX + 3);
    }

    #[test]
    fn test_request_body_shape() {
        let p = params([("name", "Ana Ruiz")]);
        let body = TxRequest {
            statements: vec![TxStatement {
                statement: "RETURN $name AS name",
                parameters: &p,
                result_data_contents: ["row"],
            }],
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            json!({"statements": [{
                "statement": "RETURN $name AS name",
                "parameters": {"name": "Ana Ruiz"},
                "resultDataContents": ["row"]
            }]})
        );
    }

    #[test]
    fn test_unreachable_server_is_datastore_error() {
        let config = DatastoreConfig {
            uri: "http://127.0.0.1:9".to_string(),
            timeout_ms: 500,
            connect_timeout_ms: 200,
            ..DatastoreConfig::default()
        };
        let datastore = Neo4jHttpDatastore::new(&config).unwrap();
        let result = datastore.query("RETURN 1 AS n", &Params::new());
        assert!(matches!(result, Err(Error::Datastore { .. })));
    }
}
