//! Log filter resolution.

use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Environment variable checked first for a filter directive.
pub const LOG_ENV: &str = "CRIMEGRAPH_LOG";

/// Picks the filter directive.
///
/// Precedence: `CRIMEGRAPH_LOG`, then `RUST_LOG`, then `debug` when verbose,
/// then the configured level.
#[must_use]
pub fn filter_directive(
    config: &LoggingConfig,
    verbose: bool,
    crimegraph_log: Option<String>,
    rust_log: Option<String>,
) -> String {
    let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    non_empty(crimegraph_log)
        .or_else(|| non_empty(rust_log))
        .unwrap_or_else(|| {
            if verbose {
                "debug".to_string()
            } else {
                config.level.clone()
            }
        })
}

/// Builds the subscriber filter from the process environment.
pub(crate) fn build_filter(config: &LoggingConfig, verbose: bool) -> EnvFilter {
    let directive = filter_directive(
        config,
        verbose,
        std::env::var(LOG_ENV).ok(),
        std::env::var("RUST_LOG").ok(),
    );
    EnvFilter::try_new(&directive).unwrap_or_else(|e| {
        tracing::warn!(directive = %directive, error = %e, "Invalid log filter; using 'warn'");
        EnvFilter::new("warn")
    })
}
