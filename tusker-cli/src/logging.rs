//! Logging setup for the `tusker` binary.
//!
//! Logs always go to stderr; stdout carries nothing but command output.
//!
//! # Environment Variables
//!
//! - `TUSKER_LOG_LEVEL=trace|debug|info|warn|error` - log level (default: warn,
//!   or debug with `--verbose`)
//! - `TUSKER_LOG_FORMAT=compact|pretty|json` - output format (default: compact)
//! - `RUST_LOG` - full filter directive, overrides `TUSKER_LOG_LEVEL`

use std::env;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

/// Resolve the level from a `TUSKER_LOG_LEVEL` value and the verbose flag.
pub fn resolve_level(configured: Option<&str>, verbose: bool) -> &'static str {
    let fallback = if verbose { "debug" } else { "warn" };
    match configured.map(str::to_lowercase).as_deref() {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("info") => "info",
        Some("warn") => "warn",
        Some("error") => "error",
        _ => fallback,
    }
}

/// Resolve the format from a `TUSKER_LOG_FORMAT` value.
pub fn resolve_format(configured: Option<&str>) -> LogFormat {
    match configured.map(str::to_lowercase).as_deref() {
        Some("pretty") => LogFormat::Pretty,
        Some("json") => LogFormat::Json,
        _ => LogFormat::Compact,
    }
}

fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::try_new(format!(
        "warn,tusker={level},tusker_cli={level},tusker_migrate={level},tusker_postgres={level}"
    ))
    .unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init(verbose: bool) {
    let level = resolve_level(env::var("TUSKER_LOG_LEVEL").ok().as_deref(), verbose);
    let format = resolve_format(env::var("TUSKER_LOG_FORMAT").ok().as_deref());
    let filter = match env::var("RUST_LOG") {
        Ok(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| filter_for(level)),
        Err(_) => filter_for(level),
    };

    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init(),
    };

    if result.is_ok() {
        tracing::debug!(level, ?format, "Logging initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_defaults() {
        assert_eq!(resolve_level(None, false), "warn");
        assert_eq!(resolve_level(None, true), "debug");
        assert_eq!(resolve_level(Some("nonsense"), false), "warn");
    }

    #[test]
    fn test_explicit_level_beats_verbose() {
        assert_eq!(resolve_level(Some("INFO"), true), "info");
        assert_eq!(resolve_level(Some("trace"), false), "trace");
    }

    #[test]
    fn test_format() {
        assert_eq!(resolve_format(None), LogFormat::Compact);
        assert_eq!(resolve_format(Some("JSON")), LogFormat::Json);
        assert_eq!(resolve_format(Some("pretty")), LogFormat::Pretty);
        assert_eq!(resolve_format(Some("xml")), LogFormat::Compact);
    }
}
