//! Query string and cookie parsing.

use std::borrow::Cow;
use std::collections::HashMap;

use crate::types::{QueryParams, QueryValue};

/// Decode one `application/x-www-form-urlencoded` component.
///
/// `+` becomes a space. Returns `None` when the percent-decoded bytes are
/// not valid UTF-8.
#[inline]
pub fn decode_component(s: &str) -> Option<Cow<'_, str>> {
    if !s.contains(['%', '+']) {
        return Some(Cow::Borrowed(s));
    }

    let spaced = s.replace('+', " ");
    percent_encoding::percent_decode_str(&spaced)
        .decode_utf8()
        .ok()
        .map(|decoded| Cow::Owned(decoded.into_owned()))
}

/// Lossy variant used for cookie values.
#[inline]
fn decode_lossy(s: &str) -> String {
    if s.contains('%') {
        percent_encoding::percent_decode_str(s)
            .decode_utf8_lossy()
            .into_owned()
    } else {
        s.to_string()
    }
}

/// Parse a query string into [`QueryParams`].
///
/// - `a=1&b=2` → `{a: "1", b: "2"}`
/// - repeated plain keys keep the last value
/// - `k[]=x&k[]=y` → `{k: ["x", "y"]}`
/// - a key without `=` maps to the empty string
///
/// Returns `None` when any component does not decode to UTF-8; callers
/// treat that as an empty mapping.
pub fn parse_query_string(query: &str) -> Option<QueryParams> {
    let mut params = QueryParams::with_capacity((query.matches('&').count() + 1).min(16));

    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }

        let (raw_key, raw_value) = match pair.find('=') {
            Some(pos) => (&pair[..pos], &pair[pos + 1..]),
            None => (pair, ""),
        };

        let key = decode_component(raw_key)?;
        let value = decode_component(raw_value)?.into_owned();

        if let Some(list_key) = key.strip_suffix("[]") {
            if list_key.is_empty() {
                continue;
            }
            match params.get_mut(list_key) {
                Some(QueryValue::List(items)) => items.push(value),
                _ => {
                    params.insert(list_key.to_string(), QueryValue::List(vec![value]));
                }
            }
        } else if !key.is_empty() {
            params.insert(key.into_owned(), QueryValue::Single(value));
        }
    }

    Some(params)
}

/// Parse a `Cookie` header into name/value pairs.
///
/// The first occurrence of a name wins; pairs without `=` are skipped.
pub fn parse_cookies(cookie_header: &str) -> HashMap<String, String> {
    let mut cookies = HashMap::with_capacity((cookie_header.matches(';').count() + 1).min(16));

    for cookie in cookie_header.split(';') {
        let cookie = cookie.trim();
        if cookie.is_empty() {
            continue;
        }

        let (name, value) = match cookie.find('=') {
            Some(pos) => (cookie[..pos].trim(), cookie[pos + 1..].trim()),
            None => continue,
        };

        if !name.is_empty() {
            cookies
                .entry(name.to_string())
                .or_insert_with(|| decode_lossy(value));
        }
    }

    cookies
}
