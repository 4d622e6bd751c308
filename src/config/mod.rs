//! Configuration management.
//!
//! Settings come from three layers, later ones winning:
//! 1. Built-in defaults
//! 2. A TOML file (`<config_dir>/crimegraph/config.toml` or `--config <path>`)
//! 3. Environment variables (`NEO4J_*`, `OPENAI_API_KEY`, `CRIMEGRAPH_*`)
//!
//! # Example File
//!
//! ```toml
//! [datastore]
//! uri = "bolt://localhost:7687"
//! user = "neo4j"
//! database = "neo4j"
//!
//! [llm]
//! provider = "openai"
//! model = "openai/gpt-oss-20b:free"
//! timeout_ms = 30000
//!
//! [retrieval]
//! person_name_mode = "validated"
//!
//! [logging]
//! format = "json"
//! ```

use crate::storage::BreakerConfig;
use crate::{Error, Result};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Placeholder shown instead of secret values.
const REDACTED: &str = "***REDACTED***";

/// Main configuration for crimegraph.
#[derive(Debug, Clone, Default)]
pub struct CrimeGraphConfig {
    /// Graph datastore connection.
    pub datastore: DatastoreConfig,
    /// Generative backend.
    pub llm: LlmConfig,
    /// Retrieval tuning.
    pub retrieval: RetrievalConfig,
    /// Logging output.
    pub logging: LoggingConfig,
}

/// Graph datastore connection settings.
#[derive(Debug, Clone)]
pub struct DatastoreConfig {
    /// Connection URI (`bolt://`, `neo4j://`, `neo4j+s://` or `http(s)://`).
    pub uri: String,
    /// User name.
    pub user: String,
    /// Password.
    pub password: Option<SecretString>,
    /// Database name.
    pub database: String,
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
    /// Consecutive failures before the breaker opens.
    pub breaker_failure_threshold: u32,
    /// How long the breaker stays open.
    pub breaker_reset_ms: u64,
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: None,
            database: "neo4j".to_string(),
            timeout_ms: 10_000,
            connect_timeout_ms: 3_000,
            breaker_failure_threshold: 5,
            breaker_reset_ms: 30_000,
        }
    }
}

impl DatastoreConfig {
    /// Returns the circuit breaker settings for the datastore.
    #[must_use]
    pub const fn breaker(&self) -> BreakerConfig {
        BreakerConfig::new()
            .with_failure_threshold(self.breaker_failure_threshold)
            .with_reset_timeout_ms(self.breaker_reset_ms)
    }
}

/// Available generative backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    /// OpenAI-compatible chat completions (`OpenRouter` by default).
    #[default]
    OpenAi,
    /// Ollama (local).
    Ollama,
    /// No backend; every answer uses the fallback formatter.
    None,
}

impl LlmProviderKind {
    /// Parses a provider string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "openrouter" => Some(Self::OpenAi),
            "ollama" => Some(Self::Ollama),
            "none" | "off" | "disabled" => Some(Self::None),
            _ => None,
        }
    }

    /// Returns the config-file spelling.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
            Self::None => "none",
        }
    }
}

/// Generative backend settings.
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    /// Which backend to use.
    pub provider: LlmProviderKind,
    /// Model name (provider default when unset).
    pub model: Option<String>,
    /// API key.
    pub api_key: Option<SecretString>,
    /// Base URL (provider default when unset).
    pub base_url: Option<String>,
    /// Request timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: Option<u64>,
    /// Retries after a timeout.
    pub max_retries: Option<u32>,
    /// Backoff between retries in milliseconds.
    pub retry_backoff_ms: Option<u64>,
    /// Consecutive failures before the breaker opens.
    pub breaker_failure_threshold: Option<u32>,
    /// How long the breaker stays open.
    pub breaker_reset_ms: Option<u64>,
}

/// How capitalized bigrams become person-name candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonNameMode {
    /// Every capitalized bigram outside the stoplist is a candidate.
    #[default]
    Heuristic,
    /// Bigrams are kept only if they match a known person name.
    Validated,
}

impl PersonNameMode {
    /// Parses a mode string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "heuristic" => Some(Self::Heuristic),
            "validated" => Some(Self::Validated),
            _ => None,
        }
    }

    /// Returns the config-file spelling.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Heuristic => "heuristic",
            Self::Validated => "validated",
        }
    }
}

/// Retrieval and prompting limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalConfig {
    /// History turns scanned for entity carry-over.
    pub carry_over_window: usize,
    /// History turns included in generative prompts.
    pub prompt_window: usize,
    /// Entities per category that get their own lookups.
    pub max_entities_per_category: usize,
    /// Person-name extraction mode.
    pub person_name_mode: PersonNameMode,
    /// Longest accepted question, in characters.
    pub max_question_chars: usize,
    /// Characters of serialized data kept per topic in prompts.
    pub prompt_chars_per_topic: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            carry_over_window: 6,
            prompt_window: 10,
            max_entities_per_category: 3,
            person_name_mode: PersonNameMode::Heuristic,
            max_question_chars: 4_000,
            prompt_chars_per_topic: 1_500,
        }
    }
}

impl RetrievalConfig {
    /// Sets the person-name mode.
    #[must_use]
    pub const fn with_person_name_mode(mut self, mode: PersonNameMode) -> Self {
        self.person_name_mode = mode;
        self
    }

    /// Sets the maximum question length.
    #[must_use]
    pub const fn with_max_question_chars(mut self, chars: usize) -> Self {
        self.max_question_chars = chars;
        self
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Default filter directive when `CRIMEGRAPH_LOG`/`RUST_LOG` are unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            level: "warn".to_string(),
        }
    }
}

// ============================================================================
// File Format
// ============================================================================

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Datastore section.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datastore: Option<ConfigFileDatastore>,
    /// LLM section.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm: Option<ConfigFileLlm>,
    /// Retrieval section.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieval: Option<ConfigFileRetrieval>,
    /// Logging section.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<ConfigFileLogging>,
}

/// `[datastore]` section.
#[derive(Debug, Default, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct ConfigFileDatastore {
    pub uri: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub timeout_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
    pub breaker_failure_threshold: Option<u32>,
    pub breaker_reset_ms: Option<u64>,
}

/// `[llm]` section.
#[derive(Debug, Default, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct ConfigFileLlm {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub retry_backoff_ms: Option<u64>,
    pub breaker_failure_threshold: Option<u32>,
    pub breaker_reset_ms: Option<u64>,
}

/// `[retrieval]` section.
#[derive(Debug, Default, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct ConfigFileRetrieval {
    pub carry_over_window: Option<usize>,
    pub prompt_window: Option<usize>,
    pub max_entities_per_category: Option<usize>,
    pub person_name_mode: Option<String>,
    pub max_question_chars: Option<usize>,
    pub prompt_chars_per_topic: Option<usize>,
}

/// `[logging]` section.
#[derive(Debug, Default, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct ConfigFileLogging {
    pub format: Option<LogFormat>,
    pub level: Option<String>,
}

impl CrimeGraphConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the platform config file path (`<config_dir>/crimegraph/config.toml`).
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("crimegraph").join("config.toml"))
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid configuration.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;
        Self::from_config_file(file)
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. Platform-specific config dir (`~/Library/Application Support/crimegraph/` on macOS)
    /// 2. XDG config dir (`~/.config/crimegraph/` for Unix compatibility)
    ///
    /// Returns default configuration if no config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let candidates = [
            base_dirs.config_dir().join("crimegraph").join("config.toml"),
            base_dirs
                .home_dir()
                .join(".config")
                .join("crimegraph")
                .join("config.toml"),
        ];

        for path in candidates.iter().filter(|p| p.exists()) {
            match Self::load_from_file(path) {
                Ok(config) => return config,
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config file"),
            }
        }

        Self::default()
    }

    /// Converts a `ConfigFile` to `CrimeGraphConfig`.
    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(ds) = file.datastore {
            let target = &mut config.datastore;
            if let Some(v) = ds.uri {
                target.uri = v;
            }
            if let Some(v) = ds.user {
                target.user = v;
            }
            if let Some(v) = ds.password {
                target.password = Some(SecretString::from(v));
            }
            if let Some(v) = ds.database {
                target.database = v;
            }
            if let Some(v) = ds.timeout_ms {
                target.timeout_ms = v;
            }
            if let Some(v) = ds.connect_timeout_ms {
                target.connect_timeout_ms = v;
            }
            if let Some(v) = ds.breaker_failure_threshold {
                target.breaker_failure_threshold = v.max(1);
            }
            if let Some(v) = ds.breaker_reset_ms {
                target.breaker_reset_ms = v;
            }
        }

        if let Some(llm) = file.llm {
            if let Some(provider) = llm.provider {
                config.llm.provider = LlmProviderKind::parse(&provider).ok_or_else(|| {
                    Error::InvalidInput(format!("unknown llm provider: '{provider}'"))
                })?;
            }
            config.llm.model = llm.model;
            config.llm.api_key = llm.api_key.map(SecretString::from);
            config.llm.base_url = llm.base_url;
            config.llm.timeout_ms = llm.timeout_ms;
            config.llm.connect_timeout_ms = llm.connect_timeout_ms;
            config.llm.max_retries = llm.max_retries;
            config.llm.retry_backoff_ms = llm.retry_backoff_ms;
            config.llm.breaker_failure_threshold = llm.breaker_failure_threshold;
            config.llm.breaker_reset_ms = llm.breaker_reset_ms;
        }

        if let Some(r) = file.retrieval {
            let target = &mut config.retrieval;
            if let Some(v) = r.carry_over_window {
                target.carry_over_window = v;
            }
            if let Some(v) = r.prompt_window {
                target.prompt_window = v;
            }
            if let Some(v) = r.max_entities_per_category {
                target.max_entities_per_category = v;
            }
            if let Some(mode) = r.person_name_mode {
                target.person_name_mode = PersonNameMode::parse(&mode).ok_or_else(|| {
                    Error::InvalidInput(format!("unknown person_name_mode: '{mode}'"))
                })?;
            }
            if let Some(v) = r.max_question_chars {
                target.max_question_chars = v;
            }
            if let Some(v) = r.prompt_chars_per_topic {
                target.prompt_chars_per_topic = v;
            }
        }

        if let Some(logging) = file.logging {
            if let Some(format) = logging.format {
                config.logging.format = format;
            }
            if let Some(level) = logging.level {
                config.logging.level = level;
            }
        }

        Ok(config)
    }

    /// Applies environment variable overrides from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary variable source.
    ///
    /// Empty values are ignored. Unparseable numbers and unknown enum values
    /// are logged and skipped.
    #[must_use]
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("NEO4J_URI") {
            self.datastore.uri = v;
        }
        if let Some(v) = get("NEO4J_USER") {
            self.datastore.user = v;
        }
        if let Some(v) = get("NEO4J_PASSWORD") {
            self.datastore.password = Some(SecretString::from(v));
        }
        if let Some(v) = get("NEO4J_DATABASE") {
            self.datastore.database = v;
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            self.llm.api_key = Some(SecretString::from(v));
        }
        if let Some(v) = get("CRIMEGRAPH_LLM_PROVIDER") {
            match LlmProviderKind::parse(&v) {
                Some(kind) => self.llm.provider = kind,
                None => tracing::warn!(value = %v, "Ignoring unknown CRIMEGRAPH_LLM_PROVIDER"),
            }
        }
        if let Some(v) = get("CRIMEGRAPH_LLM_MODEL") {
            self.llm.model = Some(v);
        }
        if let Some(v) = get("CRIMEGRAPH_LLM_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Some(v) = get("CRIMEGRAPH_LLM_TIMEOUT_MS") {
            match v.parse::<u64>() {
                Ok(ms) => self.llm.timeout_ms = Some(ms),
                Err(_) => tracing::warn!(value = %v, "Ignoring invalid CRIMEGRAPH_LLM_TIMEOUT_MS"),
            }
        }
        if let Some(v) = get("CRIMEGRAPH_LLM_CONNECT_TIMEOUT_MS") {
            match v.parse::<u64>() {
                Ok(ms) => self.llm.connect_timeout_ms = Some(ms),
                Err(_) => {
                    tracing::warn!(value = %v, "Ignoring invalid CRIMEGRAPH_LLM_CONNECT_TIMEOUT_MS");
                },
            }
        }
        if let Some(v) = get("CRIMEGRAPH_PERSON_NAME_MODE") {
            match PersonNameMode::parse(&v) {
                Some(mode) => self.retrieval.person_name_mode = mode,
                None => tracing::warn!(value = %v, "Ignoring unknown CRIMEGRAPH_PERSON_NAME_MODE"),
            }
        }
        self
    }

    /// Renders the effective configuration as TOML with secrets redacted.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_redacted_toml(&self) -> Result<String> {
        let redact = |secret: Option<&SecretString>| secret.map(|_| REDACTED.to_string());
        let file = ConfigFile {
            datastore: Some(ConfigFileDatastore {
                uri: Some(self.datastore.uri.clone()),
                user: Some(self.datastore.user.clone()),
                password: redact(self.datastore.password.as_ref()),
                database: Some(self.datastore.database.clone()),
                timeout_ms: Some(self.datastore.timeout_ms),
                connect_timeout_ms: Some(self.datastore.connect_timeout_ms),
                breaker_failure_threshold: Some(self.datastore.breaker_failure_threshold),
                breaker_reset_ms: Some(self.datastore.breaker_reset_ms),
            }),
            llm: Some(ConfigFileLlm {
                provider: Some(self.llm.provider.as_str().to_string()),
                model: self.llm.model.clone(),
                api_key: redact(self.llm.api_key.as_ref()),
                base_url: self.llm.base_url.clone(),
                timeout_ms: self.llm.timeout_ms,
                connect_timeout_ms: self.llm.connect_timeout_ms,
                max_retries: self.llm.max_retries,
                retry_backoff_ms: self.llm.retry_backoff_ms,
                breaker_failure_threshold: self.llm.breaker_failure_threshold,
                breaker_reset_ms: self.llm.breaker_reset_ms,
            }),
            retrieval: Some(ConfigFileRetrieval {
                carry_over_window: Some(self.retrieval.carry_over_window),
                prompt_window: Some(self.retrieval.prompt_window),
                max_entities_per_category: Some(self.retrieval.max_entities_per_category),
                person_name_mode: Some(self.retrieval.person_name_mode.as_str().to_string()),
                max_question_chars: Some(self.retrieval.max_question_chars),
                prompt_chars_per_topic: Some(self.retrieval.prompt_chars_per_topic),
            }),
            logging: Some(ConfigFileLogging {
                format: Some(self.logging.format),
                level: Some(self.logging.level.clone()),
            }),
        };
        toml::to_string_pretty(&file).map_err(|e| Error::OperationFailed {
            operation: "render_config".to_string(),
            cause: e.to_string(),
        })
    }
}
