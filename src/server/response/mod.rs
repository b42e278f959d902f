//! Outbound translation: [`Response`] → transport response.

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE, SERVER};
use http_body_util::Full;

use crate::core::Response;

/// Content type injected when the application sets none.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Transport-side response.
pub type HttpResponse = http::Response<Full<Bytes>>;

/// Convert `res` into a hyper response.
///
/// `Server` and `Content-Type` are filled in only when absent. Multi-value
/// headers become repeated header lines. Names or values hyper would
/// reject are dropped with a debug log instead of failing the exchange.
pub fn to_transport(res: Response) -> HttpResponse {
    let (status, headers, body) = res.into_parts();

    let mut out = http::Response::new(Full::new(body));
    *out.status_mut() = status;

    let map = out.headers_mut();
    map.reserve(headers.len() + 2);

    for (name, value) in headers.iter() {
        let parsed = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        );
        match parsed {
            (Ok(name), Ok(value)) => {
                map.append(name, value);
            }
            _ => {
                tracing::debug!(header = name, "dropping invalid response header");
            }
        }
    }

    if !map.contains_key(SERVER) {
        map.insert(SERVER, HeaderValue::from_static(crate::SERVER_SOFTWARE));
    }
    if !map.contains_key(CONTENT_TYPE) {
        map.insert(CONTENT_TYPE, HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    }

    out
}
