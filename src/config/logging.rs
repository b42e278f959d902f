//! Logging configuration.

use super::parse::env_or;

/// Logging configuration loaded from environment.
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// Log level filter (from LOG_LEVEL or RUST_LOG).
    pub filter: String,
    /// Service name for structured logging.
    pub service_name: String,
    /// One JSON object per line instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "workhall=info".to_string(),
            service_name: "workhall".to_string(),
            json: false,
        }
    }
}

impl LoggingConfig {
    /// Load configuration from environment variables.
    ///
    /// LOG_LEVEL accepts simple values: trace, debug, info, warn, error
    /// RUST_LOG accepts full tracing filter syntax: workhall=debug,hyper=warn
    /// LOG_FORMAT=json selects the JSON formatter
    pub fn from_env() -> Self {
        let log_level = std::env::var("LOG_LEVEL").ok();
        let rust_log = std::env::var("RUST_LOG").ok();

        Self {
            filter: resolve_log_filter(log_level.as_deref(), rust_log.as_deref()),
            service_name: env_or("SERVICE_NAME", "workhall"),
            json: env_or("LOG_FORMAT", "text").eq_ignore_ascii_case("json"),
        }
    }
}

/// Priority: LOG_LEVEL > RUST_LOG > default (info)
fn resolve_log_filter(log_level: Option<&str>, rust_log: Option<&str>) -> String {
    if let Some(level) = log_level {
        let level = level.to_lowercase();
        match level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {
                return format!("workhall={}", level);
            }
            _ => {
                // Invalid level, fall through to RUST_LOG
                eprintln!(
                    "Warning: Invalid LOG_LEVEL '{}', expected: trace, debug, info, warn, error",
                    level
                );
            }
        }
    }

    if let Some(filter) = rust_log.filter(|f| !f.is_empty()) {
        return filter.to_string();
    }

    "workhall=info".to_string()
}
