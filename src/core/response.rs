//! Immutable HTTP response.

use bytes::Bytes;
use http::StatusCode;

use super::error::{Error, Result};
use super::headers::Headers;

/// Pre-allocated content types.
mod content_types {
    pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
    pub const TEXT_HTML: &str = "text/html; charset=utf-8";
    pub const APPLICATION_JSON: &str = "application/json";
}

/// HTTP response.
///
/// Same copy-on-write discipline as [`Request`](super::Request): every
/// `with_*` method returns a new value and leaves the receiver untouched.
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Bytes,
}

impl Response {
    /// Create a response with a validated status code (100..=599).
    pub fn new(status: u16) -> Result<Self> {
        Ok(Self::empty(validate_status(status)?))
    }

    /// Create a new response builder.
    #[inline]
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder::new()
    }

    /// Create a 200 OK response with body.
    #[inline]
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: StatusCode::OK,
            headers: Headers::new(),
            body: body.into(),
        }
    }

    /// Create a 200 OK response with a JSON body.
    pub fn json(value: &serde_json::Value) -> Self {
        let mut headers = Headers::new();
        headers.set("Content-Type", content_types::APPLICATION_JSON);
        Self {
            status: StatusCode::OK,
            headers,
            body: Bytes::from(value.to_string()),
        }
    }

    /// Empty response for a status already known to be in range.
    #[inline]
    pub(crate) fn empty(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// 404 with an empty body.
    #[inline]
    pub fn not_found() -> Self {
        Self::empty(StatusCode::NOT_FOUND)
    }

    /// 500 with an empty body.
    #[inline]
    pub fn internal_error() -> Self {
        Self::empty(StatusCode::INTERNAL_SERVER_ERROR)
    }

    // Getters

    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[inline]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    #[inline]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    #[inline]
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type")
    }

    // Derivations

    pub fn with_status(&self, status: u16) -> Result<Self> {
        Ok(Self {
            status: validate_status(status)?,
            ..self.clone()
        })
    }

    pub fn with_header(&self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut headers = self.headers.clone();
        headers.set(name, value);
        Self {
            headers,
            ..self.clone()
        }
    }

    pub fn with_added_header(&self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut headers = self.headers.clone();
        headers.append(name, value);
        Self {
            headers,
            ..self.clone()
        }
    }

    pub fn without_header(&self, name: &str) -> Self {
        let mut headers = self.headers.clone();
        headers.remove(name);
        Self {
            headers,
            ..self.clone()
        }
    }

    pub fn with_body(&self, body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            ..self.clone()
        }
    }

    /// Header name/value pairs and body, consuming the response.
    #[inline]
    pub fn into_parts(self) -> (StatusCode, Headers, Bytes) {
        (self.status, self.headers, self.body)
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::empty(StatusCode::OK)
    }
}

#[inline]
fn validate_status(code: u16) -> Result<StatusCode> {
    if !(100..=599).contains(&code) {
        return Err(Error::InvalidStatus(code));
    }
    StatusCode::from_u16(code).map_err(|_| Error::InvalidStatus(code))
}

/// Builder for creating HTTP responses.
pub struct ResponseBuilder {
    status: u16,
    headers: Headers,
    body: Bytes,
}

impl Default for ResponseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseBuilder {
    #[inline]
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK.as_u16(),
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    #[inline]
    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Append a header value.
    #[inline]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    #[inline]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    #[inline]
    pub fn content_type(mut self, content_type: &str) -> Self {
        self.headers.set("Content-Type", content_type);
        self
    }

    #[inline]
    pub fn html(self) -> Self {
        self.content_type(content_types::TEXT_HTML)
    }

    #[inline]
    pub fn json(self) -> Self {
        self.content_type(content_types::APPLICATION_JSON)
    }

    #[inline]
    pub fn text(self) -> Self {
        self.content_type(content_types::TEXT_PLAIN)
    }

    /// Fails with [`Error::InvalidStatus`] outside 100..=599.
    pub fn build(self) -> Result<Response> {
        Ok(Response {
            status: validate_status(self.status)?,
            headers: self.headers,
            body: self.body,
        })
    }
}
