//! Inbound translation: transport request → [`Request`].

mod multipart;
mod parser;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use http::{Method, Uri, Version};
use http_body_util::BodyExt;
use hyper::body::Incoming;

use crate::core::{Headers, Request};
use crate::types::UploadedFiles;

pub use multipart::{parse_multipart, MultipartData, MAX_UPLOAD_SIZE};
pub use parser::{decode_component, parse_cookies, parse_query_string};

/// Per-connection facts the translator needs.
#[derive(Clone, Debug)]
pub struct RequestContext {
    /// Remote client address
    pub remote_addr: SocketAddr,
    /// Local address the connection was accepted on
    pub local_addr: SocketAddr,
    /// Directory for multipart temp files
    pub upload_dir: PathBuf,
    /// Largest accepted file part
    pub max_upload_size: u64,
}

/// Everything the transport knows about one inbound exchange.
#[derive(Debug)]
pub struct RawRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: Headers,
    pub body: Bytes,
    /// "1.1", "2.0", ...
    pub protocol_version: String,
    pub server_params: HashMap<String, String>,
    pub cookies: HashMap<String, String>,
    pub files: UploadedFiles,
    pub form_params: Vec<(String, String)>,
}

impl RawRequest {
    /// A bare exchange with no transport metadata.
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: Headers::new(),
            body: Bytes::new(),
            protocol_version: "1.1".to_string(),
            server_params: HashMap::new(),
            cookies: HashMap::new(),
            files: HashMap::new(),
            form_params: Vec::new(),
        }
    }

    /// Raw query string, if the URI has one.
    #[inline]
    pub fn query_string(&self) -> Option<&str> {
        self.uri.query()
    }
}

/// Build the immutable [`Request`] for `raw`.
///
/// Never fails: a malformed query string becomes an empty mapping.
pub fn translate(raw: RawRequest) -> Request {
    let query_params = match raw.query_string() {
        Some(query) => parse_query_string(query).unwrap_or_else(|| {
            tracing::debug!(query = query, "malformed query string, using empty params");
            HashMap::new()
        }),
        None => HashMap::new(),
    };

    Request::builder(raw.method, raw.uri)
        .headers(raw.headers)
        .body(raw.body)
        .protocol_version(raw.protocol_version)
        .server_params(raw.server_params)
        .cookie_params(raw.cookies)
        .uploaded_files(raw.files)
        .form_params(raw.form_params)
        .query_params(query_params)
        .build()
}

/// Error reading a request off the wire.
#[derive(Debug)]
pub struct ReadError(pub hyper::Error);

impl std::fmt::Display for ReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to read request body: {}", self.0)
    }
}

impl std::error::Error for ReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

/// Protocol version without the `HTTP/` prefix.
pub fn protocol_version(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2.0",
        Version::HTTP_3 => "3.0",
        _ => "1.1",
    }
}

/// Transport metadata exposed through `server_params`.
fn build_server_params(
    ctx: &RequestContext,
    method: &Method,
    uri: &Uri,
    version: &str,
) -> HashMap<String, String> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();

    let request_uri = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let mut params = HashMap::with_capacity(12);
    params.insert("REQUEST_METHOD".to_string(), method.to_string());
    params.insert("REQUEST_URI".to_string(), request_uri.to_string());
    params.insert(
        "QUERY_STRING".to_string(),
        uri.query().unwrap_or("").to_string(),
    );
    params.insert("SERVER_PROTOCOL".to_string(), format!("HTTP/{}", version));
    params.insert("REMOTE_ADDR".to_string(), ctx.remote_addr.ip().to_string());
    params.insert("REMOTE_PORT".to_string(), ctx.remote_addr.port().to_string());
    params.insert("SERVER_ADDR".to_string(), ctx.local_addr.ip().to_string());
    params.insert("SERVER_PORT".to_string(), ctx.local_addr.port().to_string());
    params.insert(
        "SERVER_SOFTWARE".to_string(),
        crate::SERVER_SOFTWARE.to_string(),
    );
    params.insert("REQUEST_TIME".to_string(), now.as_secs().to_string());
    params.insert(
        "REQUEST_TIME_FLOAT".to_string(),
        format!("{:.6}", now.as_secs_f64()),
    );
    params
}

/// Read a hyper request completely and collect its transport metadata.
///
/// Multipart bodies are parsed into form fields and temp files; a broken
/// multipart body leaves both empty but still yields a request.
pub async fn read_request(
    req: hyper::Request<Incoming>,
    ctx: &RequestContext,
) -> Result<RawRequest, ReadError> {
    let (parts, body) = req.into_parts();
    let body = body.collect().await.map_err(ReadError)?.to_bytes();

    let version = protocol_version(parts.version);
    let headers = Headers::from(&parts.headers);

    // HTTP/2 may split cookies across several header lines
    let cookies = parse_cookies(&headers.get_all("cookie").join("; "));

    let mut raw = RawRequest {
        server_params: build_server_params(ctx, &parts.method, &parts.uri, version),
        method: parts.method,
        uri: parts.uri,
        headers,
        body,
        protocol_version: version.to_string(),
        cookies,
        files: HashMap::new(),
        form_params: Vec::new(),
    };

    let content_type = raw.headers.get("content-type").unwrap_or("").to_string();
    if content_type
        .to_ascii_lowercase()
        .starts_with("multipart/form-data")
    {
        match parse_multipart(
            &content_type,
            raw.body.clone(),
            &ctx.upload_dir,
            ctx.max_upload_size,
        )
        .await
        {
            Ok(data) => {
                raw.form_params = data.fields;
                raw.files = data.files;
            }
            Err(e) => {
                tracing::debug!(error = %e, path = raw.uri.path(), "multipart body ignored");
            }
        }
    }

    Ok(raw)
}
