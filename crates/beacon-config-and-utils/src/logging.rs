//! Logging initialization for SDK hosts.
//!
//! Hosts call one of these once at startup; library crates only emit
//! `tracing` events. Output is structured JSONL in `~/.beacon/logs/sdk.jsonl`.

use crate::Paths;
use std::path::PathBuf;

/// Initialize the logging system for the default `beacon` service.
///
/// # Arguments
///
/// * `level` - Default log level (trace, debug, info, warn, error)
///
/// # Example
///
/// ```ignore
/// init_logging("info");
/// tracing::info!("SDK started");
/// ```
pub fn init_logging(level: &str) {
    init_logging_for_service("beacon", level);
}

/// Like [`init_logging`], but write to `paths.log_file()` so a custom base
/// directory keeps its logs alongside its database.
pub fn init_logging_in(paths: &Paths, level: &str) {
    install("beacon", level, Some(paths.log_file()));
}

/// Initialize logging with a custom service name.
///
/// `BEACON_LOG_FILE` redirects the JSONL stream and `BEACON_LOG_STDERR=0`
/// silences the stderr mirror.
pub fn init_logging_for_service(service_name: &str, level: &str) {
    install(service_name, level, None);
}

fn install(service_name: &str, level: &str, default_path: Option<PathBuf>) {
    let log_path = std::env::var("BEACON_LOG_FILE")
        .ok()
        .and_then(non_empty_env)
        .map(PathBuf::from)
        .or(default_path);
    let also_stderr = std::env::var("BEACON_LOG_STDERR")
        .ok()
        .and_then(non_empty_env)
        .map(|raw| !matches!(raw.to_ascii_lowercase().as_str(), "0" | "false" | "off"))
        .unwrap_or(true);

    observability::init_with_config(observability::LogConfig {
        service_name: service_name.into(),
        default_level: level.into(),
        log_path,
        also_stderr,
    });
}

fn non_empty_env(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_level_all_variants() {
        assert_eq!(parse_level("trace"), tracing::Level::TRACE);
        assert_eq!(parse_level("debug"), tracing::Level::DEBUG);
        assert_eq!(parse_level("info"), tracing::Level::INFO);
        assert_eq!(parse_level("warn"), tracing::Level::WARN);
        assert_eq!(parse_level("warning"), tracing::Level::WARN);
        assert_eq!(parse_level("error"), tracing::Level::ERROR);
    }

    #[test]
    fn parse_level_case_insensitive() {
        assert_eq!(parse_level("DEBUG"), tracing::Level::DEBUG);
        assert_eq!(parse_level("Warning"), tracing::Level::WARN);
    }

    #[test]
    fn parse_level_unknown_defaults_to_info() {
        assert_eq!(parse_level(""), tracing::Level::INFO);
        assert_eq!(parse_level("verbose"), tracing::Level::INFO);
    }

    #[test]
    fn non_empty_env_trims_and_filters() {
        assert_eq!(non_empty_env("  a  ".to_string()).as_deref(), Some("a"));
        assert_eq!(non_empty_env("   ".to_string()), None);
    }
}
