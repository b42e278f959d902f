//! HTTP server settings and validation.
//!
//! [`Settings`] is the loosely typed surface callers hand to
//! `ServerRuntime::initialize`: a JSON object where unknown keys are
//! ignored and missing keys take defaults. [`Settings::validate`] turns it
//! into a [`ServerConfig`] or reports every invalid field at once.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

use super::parse::{env_opt, value_as_bool, value_as_i64};
use super::ConfigError;

/// Workers per logical CPU when no explicit count is given.
pub const WORKERS_PER_CPU: usize = 4;

pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
pub const DEFAULT_PORT: u16 = 8080;

/// Raw, unvalidated server settings.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Settings {
    values: Map<String, Value>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings from a JSON value, which must be an object.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        match value {
            Value::Object(values) => Ok(Self { values }),
            other => Err(ConfigError::Parse {
                key: "settings".into(),
                value: other.to_string(),
                error: "expected a JSON object".into(),
            }),
        }
    }

    /// Read `HTTP_HOST`, `HTTP_PORT`, `HTTP_WORKERS`, `HTTP_DEBUG` and
    /// `UPLOAD_DIR`. Unset variables are left out so defaults apply.
    pub fn from_env() -> Self {
        let mut settings = Self::new();
        for (key, var) in [
            ("host", "HTTP_HOST"),
            ("port", "HTTP_PORT"),
            ("workers", "HTTP_WORKERS"),
            ("debug", "HTTP_DEBUG"),
            ("upload_dir", "UPLOAD_DIR"),
        ] {
            if let Some(value) = env_opt(var) {
                settings.values.insert(key.to_string(), Value::String(value));
            }
        }
        settings
    }

    /// Set `key`, returning the updated settings.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Raw value of `key`; `null` counts as absent.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key).filter(|v| !v.is_null())
    }

    /// Validate every field, collecting all failures.
    pub fn validate(&self) -> Result<ServerConfig, ConfigError> {
        let mut invalid = Vec::new();

        let host = match self.get("host") {
            None => Some(DEFAULT_HOST),
            Some(Value::String(s)) => s.trim().parse::<IpAddr>().ok(),
            Some(_) => None,
        };
        if host.is_none() {
            invalid.push("host");
        }

        let port = match self.get("port") {
            None => Some(DEFAULT_PORT),
            Some(v) => value_as_i64(v)
                .filter(|p| (1..=65535).contains(p))
                .map(|p| p as u16),
        };
        if port.is_none() {
            invalid.push("port");
        }

        let workers = match self.get("workers") {
            None => Some(None),
            Some(v) => value_as_i64(v)
                .filter(|w| *w >= 1)
                .map(|w| Some(w as usize)),
        };
        if workers.is_none() {
            invalid.push("workers");
        }

        let debug = match self.get("debug") {
            None => Some(false),
            Some(v) => value_as_bool(v),
        };
        if debug.is_none() {
            invalid.push("debug");
        }

        let upload_dir = match self.get("upload_dir") {
            None => Some(std::env::temp_dir()),
            Some(Value::String(s)) if !s.trim().is_empty() => Some(PathBuf::from(s.trim())),
            Some(_) => None,
        };
        if upload_dir.is_none() {
            invalid.push("upload_dir");
        }

        match (host, port, workers, debug, upload_dir) {
            (Some(host), Some(port), Some(workers), Some(debug), Some(upload_dir))
                if invalid.is_empty() =>
            {
                Ok(ServerConfig {
                    host,
                    port,
                    workers: effective_workers(workers),
                    debug,
                    upload_dir,
                })
            }
            _ => Err(ConfigError::invalid(invalid)),
        }
    }
}

impl From<Map<String, Value>> for Settings {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

/// Effective worker count.
///
/// Targets without a shareable listening socket always run one worker.
pub fn effective_workers(requested: Option<usize>) -> usize {
    if !cfg!(unix) {
        return 1;
    }
    requested.unwrap_or_else(|| num_cpus::get().max(1) * WORKERS_PER_CPU)
}

/// Validated, immutable server configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub workers: usize,
    pub debug: bool,
    /// Directory for multipart upload temp files.
    pub upload_dir: PathBuf,
}

impl ServerConfig {
    /// Listen address.
    #[inline]
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// The effective configuration as a JSON object.
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "host": self.host.to_string(),
            "port": self.port,
            "workers": self.workers,
            "debug": self.debug,
            "upload_dir": self.upload_dir.display().to_string(),
        })
    }
}
