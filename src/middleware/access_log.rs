//! Access logging middleware.
//!
//! Logs one structured line per request under the `access` target.

use std::time::Instant;

use http::StatusCode;

use super::{Middleware, Next};
use crate::core::{DispatchError, Request, Response};

/// Access log middleware configuration.
#[derive(Clone, Debug)]
pub struct AccessLogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,
    /// Include the request body size.
    pub include_request_body: bool,
}

impl Default for AccessLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            include_request_body: false,
        }
    }
}

/// Access logging middleware.
///
/// Entries are emitted at INFO level with target "access". Register it
/// first so the measured duration covers every inner stage.
#[derive(Default)]
pub struct AccessLogMiddleware {
    config: AccessLogConfig,
}

impl AccessLogMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: AccessLogConfig) -> Self {
        Self { config }
    }

    pub fn with_enabled(enabled: bool) -> Self {
        Self {
            config: AccessLogConfig {
                enabled,
                ..Default::default()
            },
        }
    }
}

/// Status the dispatcher will eventually send for `result`.
fn outcome_status(result: &Result<Response, DispatchError>) -> StatusCode {
    match result {
        Ok(res) => res.status(),
        Err(DispatchError::NotFound) => StatusCode::NOT_FOUND,
        Err(DispatchError::Failed(_)) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl Middleware for AccessLogMiddleware {
    fn name(&self) -> &'static str {
        "access_log"
    }

    fn process(&self, req: Request, next: Next<'_>) -> Result<Response, DispatchError> {
        if !self.config.enabled {
            return next.run(req);
        }

        let start = Instant::now();
        let method = req.method().clone();
        let path = req.path().to_string();
        let query = req.uri().query().map(str::to_string);
        let ua = req.header("user-agent").map(str::to_string);
        let ip = req.server_params().get("REMOTE_ADDR").cloned();
        let request_bytes = self
            .config
            .include_request_body
            .then(|| req.body().len() as u64);
        let http_version = req.protocol_version().to_string();

        let result = next.run(req);

        let status = outcome_status(&result).as_u16();
        let bytes = result.as_ref().map(|r| r.body().len() as u64).unwrap_or(0);
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        tracing::info!(
            target: "access",
            method = %method,
            path = path.as_str(),
            query = query.as_deref(),
            status = status,
            bytes = bytes,
            request_bytes = request_bytes,
            duration_ms = duration_ms,
            ip = ip.as_deref(),
            ua = ua.as_deref(),
            http = http_version.as_str(),
            "{} {} {}",
            method,
            path,
            status
        );

        result
    }
}
