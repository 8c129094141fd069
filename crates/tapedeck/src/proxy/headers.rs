//! Header handling for forwarded and captured traffic.

use hyper::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::BTreeMap;

/// Headers that belong to the client's hop to the proxy and are never
/// forwarded. `host` is re-derived from the target URL, and the framing
/// headers are recomputed for the re-buffered body.
static NOT_FORWARDED: [HeaderName; 7] = [
    HeaderName::from_static("proxy-connection"),
    HeaderName::from_static("proxy-authenticate"),
    HeaderName::from_static("proxy-authorization"),
    hyper::header::CONNECTION,
    hyper::header::HOST,
    hyper::header::TRANSFER_ENCODING,
    hyper::header::CONTENT_LENGTH,
];

pub static ACCESS_CONTROL_ALLOW_ORIGIN: HeaderName =
    HeaderName::from_static("access-control-allow-origin");
pub static ACCESS_CONTROL_ALLOW_METHODS: HeaderName =
    HeaderName::from_static("access-control-allow-methods");
pub static ACCESS_CONTROL_ALLOW_HEADERS: HeaderName =
    HeaderName::from_static("access-control-allow-headers");

pub static VALUE_ANY: HeaderValue = HeaderValue::from_static("*");

/// Copy of `headers` without proxy-control and hop headers.
pub fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if !NOT_FORWARDED.contains(name) {
            forwarded.append(name.clone(), value.clone());
        }
    }
    forwarded
}

/// First value of every header, keyed by canonical name (`Content-Type`).
pub fn first_values(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();
    for name in headers.keys() {
        if let Some(value) = headers.get(name) {
            values.insert(
                canonical_name(name.as_str()),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            );
        }
    }
    values
}

/// `x-request-id` -> `X-Request-Id`.
pub fn canonical_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Extension trait for inserting permissive CORS headers.
pub trait CorsHeadersExt {
    fn allow_any_origin(&mut self);
    fn allow_any_cors(&mut self);
}

impl CorsHeadersExt for HeaderMap {
    fn allow_any_origin(&mut self) {
        self.insert(ACCESS_CONTROL_ALLOW_ORIGIN.clone(), VALUE_ANY.clone());
    }

    fn allow_any_cors(&mut self) {
        self.allow_any_origin();
        self.insert(ACCESS_CONTROL_ALLOW_METHODS.clone(), VALUE_ANY.clone());
        self.insert(ACCESS_CONTROL_ALLOW_HEADERS.clone(), VALUE_ANY.clone());
    }
}
