//! Configuration module for workhall.
//!
//! This module provides centralized configuration loading from environment variables.
//!
//! # Example
//!
//! ```rust,ignore
//! use workhall::config::Config;
//!
//! let config = Config::from_env()?;
//! println!("Listen address: {}", config.server.addr());
//! println!("Workers: {}", config.server.workers);
//! ```

mod error;
mod http;
mod logging;
mod parse;

pub use error::ConfigError;
pub use http::{
    effective_workers, ServerConfig, Settings, DEFAULT_HOST, DEFAULT_PORT, WORKERS_PER_CPU,
};
pub use logging::LoggingConfig;

use parse::env_bool;

/// Complete application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Raw settings, as passed to `ServerRuntime::initialize`.
    pub settings: Settings,
    /// The same settings, validated.
    pub server: ServerConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Access log middleware enabled (ACCESS_LOG=1).
    pub access_log: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let settings = Settings::from_env();
        let server = settings.validate()?;

        Ok(Self {
            settings,
            server,
            logging: LoggingConfig::from_env(),
            access_log: env_bool("ACCESS_LOG", false),
        })
    }

    /// Print configuration summary to log.
    pub fn log_summary(&self) {
        use tracing::info;

        info!("Configuration loaded:");
        info!("  Listen: {}", self.server.addr());
        info!("  Workers: {}", self.server.workers);
        info!("  Upload dir: {}", self.server.upload_dir.display());

        if self.server.debug {
            info!("  Debug: enabled");
        }

        if self.access_log {
            info!("  Access log: enabled");
        }

        if self.logging.json {
            info!("  Log format: json");
        }
    }
}
