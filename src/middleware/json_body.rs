//! JSON request body parsing.

use super::{Middleware, Next};
use crate::core::{DispatchError, Request, Response};

/// Populates `parsed_body` for `application/json` requests.
///
/// A body that fails to decode is passed through untouched; handlers see
/// `parsed_body() == None` and can inspect the raw bytes themselves.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonBodyParser;

impl JsonBodyParser {
    pub fn new() -> Self {
        Self
    }

    fn decode(req: &Request) -> Option<serde_json::Value> {
        let content_type = req.header("content-type")?;
        if !content_type.contains("application/json") {
            return None;
        }

        match serde_json::from_slice(req.body()) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(path = req.path(), error = %e, "JSON body did not parse");
                None
            }
        }
    }
}

impl Middleware for JsonBodyParser {
    fn name(&self) -> &'static str {
        "json_body"
    }

    fn process(&self, req: Request, next: Next<'_>) -> Result<Response, DispatchError> {
        match Self::decode(&req) {
            Some(value) => next.run(req.with_parsed_body(Some(value))),
            None => next.run(req),
        }
    }
}
