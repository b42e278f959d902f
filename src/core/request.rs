//! Immutable HTTP request.
//!
//! Every `with_*` method borrows the receiver and returns a new request
//! with exactly one field replaced. Containers (headers, attributes, params)
//! are cloned, so the original and the derived request never alias.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use http::{Method, Uri};

use super::error::{Error, Result};
use super::headers::Headers;
use crate::types::{QueryParams, UploadedFiles};

/// Request-scoped attribute value.
type Attribute = Arc<dyn Any + Send + Sync>;

/// HTTP request for middleware and handlers.
#[derive(Clone)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: Headers,
    body: Bytes,
    protocol_version: String,
    server_params: HashMap<String, String>,
    cookie_params: HashMap<String, String>,
    uploaded_files: UploadedFiles,
    query_params: QueryParams,
    form_params: Vec<(String, String)>,
    parsed_body: Option<serde_json::Value>,
    attributes: HashMap<String, Attribute>,
}

impl Request {
    /// Create a request with empty headers, body and parameters.
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: Headers::new(),
            body: Bytes::new(),
            protocol_version: "1.1".to_string(),
            server_params: HashMap::new(),
            cookie_params: HashMap::new(),
            uploaded_files: HashMap::new(),
            query_params: HashMap::new(),
            form_params: Vec::new(),
            parsed_body: None,
            attributes: HashMap::new(),
        }
    }

    /// Start building a request.
    #[inline]
    pub fn builder(method: Method, uri: Uri) -> RequestBuilder {
        RequestBuilder {
            request: Request::new(method, uri),
        }
    }

    // Getters

    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[inline]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Get the request path.
    #[inline]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    #[inline]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// First value of a header (case-insensitive).
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// All values of a header joined with `", "`; empty when absent.
    #[inline]
    pub fn header_line(&self, name: &str) -> String {
        self.headers.line(name).unwrap_or_default()
    }

    #[inline]
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains(name)
    }

    /// Raw request body.
    #[inline]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// A fresh reader positioned at the start of the body.
    ///
    /// The body is shared, so every call rewinds.
    #[inline]
    pub fn body_reader(&self) -> Cursor<Bytes> {
        Cursor::new(self.body.clone())
    }

    /// Protocol version without the `HTTP/` prefix ("1.1", "2.0", ...).
    #[inline]
    pub fn protocol_version(&self) -> &str {
        &self.protocol_version
    }

    #[inline]
    pub fn server_params(&self) -> &HashMap<String, String> {
        &self.server_params
    }

    #[inline]
    pub fn cookie_params(&self) -> &HashMap<String, String> {
        &self.cookie_params
    }

    #[inline]
    pub fn uploaded_files(&self) -> &UploadedFiles {
        &self.uploaded_files
    }

    #[inline]
    pub fn query_params(&self) -> &QueryParams {
        &self.query_params
    }

    /// Text fields of a `multipart/form-data` body.
    #[inline]
    pub fn form_params(&self) -> &[(String, String)] {
        &self.form_params
    }

    /// Structured body, set only by middleware.
    #[inline]
    pub fn parsed_body(&self) -> Option<&serde_json::Value> {
        self.parsed_body.as_ref()
    }

    /// Names of all attributes.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// Typed attribute lookup. `None` when absent or of another type.
    pub fn attribute<T: Any>(&self, key: &str) -> Option<&T> {
        self.attributes.get(key).and_then(|v| v.downcast_ref())
    }

    /// Typed attribute lookup falling back to `default`.
    pub fn attribute_or<'a, T: Any>(&'a self, key: &str, default: &'a T) -> &'a T {
        self.attribute(key).unwrap_or(default)
    }

    #[inline]
    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    // Derivations

    pub fn with_method(&self, method: Method) -> Self {
        Self {
            method,
            ..self.clone()
        }
    }

    pub fn with_uri(&self, uri: Uri) -> Self {
        Self {
            uri,
            ..self.clone()
        }
    }

    /// Replace all values of a header.
    pub fn with_header(&self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut headers = self.headers.clone();
        headers.set(name, value);
        Self {
            headers,
            ..self.clone()
        }
    }

    /// Append a value to a header.
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

    pub fn with_protocol_version(&self, version: impl Into<String>) -> Self {
        Self {
            protocol_version: version.into(),
            ..self.clone()
        }
    }

    pub fn with_cookie_params(&self, cookies: HashMap<String, String>) -> Self {
        Self {
            cookie_params: cookies,
            ..self.clone()
        }
    }

    pub fn with_query_params(&self, query: QueryParams) -> Self {
        Self {
            query_params: query,
            ..self.clone()
        }
    }

    pub fn with_uploaded_files(&self, files: UploadedFiles) -> Self {
        Self {
            uploaded_files: files,
            ..self.clone()
        }
    }

    pub fn with_parsed_body(&self, data: Option<serde_json::Value>) -> Self {
        Self {
            parsed_body: data,
            ..self.clone()
        }
    }

    /// Derive a request carrying `key = value`.
    ///
    /// Fails with [`Error::InvalidArgument`] when `key` is empty.
    pub fn with_attribute<T>(&self, key: impl Into<String>, value: T) -> Result<Self>
    where
        T: Any + Send + Sync,
    {
        let key = key.into();
        if key.is_empty() {
            return Err(Error::InvalidArgument(
                "attribute key must be a non-empty string".to_string(),
            ));
        }

        let mut attributes = self.attributes.clone();
        attributes.insert(key, Arc::new(value));
        Ok(Self {
            attributes,
            ..self.clone()
        })
    }

    /// Derive a request without `key`. An absent key yields an equal copy.
    pub fn without_attribute(&self, key: &str) -> Self {
        let mut attributes = self.attributes.clone();
        attributes.remove(key);
        Self {
            attributes,
            ..self.clone()
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut attributes: Vec<&str> = self.attribute_names().collect();
        attributes.sort_unstable();

        f.debug_struct("Request")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("protocol_version", &self.protocol_version)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .field("query_params", &self.query_params)
            .field("cookie_params", &self.cookie_params)
            .field("parsed_body", &self.parsed_body)
            .field("attributes", &attributes)
            .finish_non_exhaustive()
    }
}

/// Builder used by the translator and by tests.
///
/// Unlike the `with_*` family it mutates in place, since nothing else can
/// observe the request until [`RequestBuilder::build`].
pub struct RequestBuilder {
    request: Request,
}

impl RequestBuilder {
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.headers.append(name, value);
        self
    }

    pub fn headers(mut self, headers: Headers) -> Self {
        self.request.headers = headers;
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.request.body = body.into();
        self
    }

    pub fn protocol_version(mut self, version: impl Into<String>) -> Self {
        self.request.protocol_version = version.into();
        self
    }

    pub fn server_params(mut self, params: HashMap<String, String>) -> Self {
        self.request.server_params = params;
        self
    }

    pub fn cookie_params(mut self, cookies: HashMap<String, String>) -> Self {
        self.request.cookie_params = cookies;
        self
    }

    pub fn uploaded_files(mut self, files: UploadedFiles) -> Self {
        self.request.uploaded_files = files;
        self
    }

    pub fn query_params(mut self, query: QueryParams) -> Self {
        self.request.query_params = query;
        self
    }

    pub fn form_params(mut self, params: Vec<(String, String)>) -> Self {
        self.request.form_params = params;
        self
    }

    #[inline]
    pub fn build(self) -> Request {
        self.request
    }
}
