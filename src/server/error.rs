//! Runtime error types.

use std::fmt;
use std::io;
use std::net::SocketAddr;

use crate::config::ConfigError;

/// Errors returned by [`ServerRuntime`](super::ServerRuntime) operations.
#[derive(Debug)]
pub enum RuntimeError {
    /// Invalid settings or job definition.
    Config(ConfigError),

    /// The operation needs `initialize` to have succeeded first.
    NotConfigured,

    /// The runtime is already serving; configuration is frozen.
    AlreadyRunning,

    /// The listening socket could not be bound.
    Bind {
        addr: SocketAddr,
        source: io::Error,
    },

    /// A worker thread could not be spawned.
    Spawn(io::Error),

    /// Some HTTP workers stopped before accepting, e.g. a startup hook panicked.
    WorkerStartup { failed: usize, workers: usize },
}

impl RuntimeError {
    /// Check if this is a lifecycle (state) error rather than a failure.
    pub fn is_state_error(&self) -> bool {
        matches!(self, RuntimeError::NotConfigured | RuntimeError::AlreadyRunning)
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::Config(e) => write!(f, "{}", e),
            RuntimeError::NotConfigured => write!(f, "server is not configured"),
            RuntimeError::AlreadyRunning => write!(f, "server is already running"),
            RuntimeError::Bind { addr, source } => {
                write!(f, "failed to bind {}: {}", addr, source)
            }
            RuntimeError::Spawn(e) => write!(f, "failed to spawn worker: {}", e),
            RuntimeError::WorkerStartup { failed, workers } => {
                write!(f, "{} of {} workers failed to start", failed, workers)
            }
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuntimeError::Config(e) => Some(e),
            RuntimeError::Bind { source, .. } => Some(source),
            RuntimeError::Spawn(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for RuntimeError {
    fn from(e: ConfigError) -> Self {
        RuntimeError::Config(e)
    }
}
