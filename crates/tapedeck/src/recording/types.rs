//! Types for captured exchanges and the capture file envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Bodies longer than this (in chars) are truncated when kept as text.
pub const MAX_TEXT_BODY_CHARS: usize = 10_000;

/// Appended to text bodies cut at [`MAX_TEXT_BODY_CHARS`].
pub const TRUNCATION_MARKER: &str = "... (truncated)";

/// Note stored as the response of a CONNECT tunnel capture.
pub const TUNNEL_NOTE: &str =
    "HTTPS tunnel established (content not captured - would require MITM)";

/// One recorded request/response pair. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedExchange {
    pub method: String,
    /// Templated path (`/accounts/{id}`).
    pub path: String,
    pub status: u16,
    pub response: Value,
    /// First value of every response header.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub description: String,
    pub captured_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_params: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

impl CapturedExchange {
    /// Record of an established CONNECT tunnel. No payload is ever inspected.
    pub fn tunnel(authority: &str) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Host".to_string(), authority.to_string());

        Self {
            method: "CONNECT".to_string(),
            path: authority.to_string(),
            status: 200,
            response: serde_json::json!({ "note": TUNNEL_NOTE }),
            headers,
            description: format!("HTTPS tunnel to {authority}"),
            captured_at: Utc::now(),
            request_body: None,
            original_path: None,
            full_url: None,
            response_headers: None,
            request_headers: None,
            query_params: None,
            response_time_ms: None,
            host: Some(authority.to_string()),
            service: None,
        }
    }

    pub fn is_tunnel(&self) -> bool {
        self.method == "CONNECT"
    }
}

/// `{"routes": [...]}` envelope written for each flushed bucket.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureFile {
    pub routes: Vec<CapturedExchange>,
}

/// Interpret a response body: JSON when it parses, otherwise (possibly
/// truncated) text. Empty bodies become `null`.
pub fn response_body_value(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    parse_or_text(bytes)
}

/// Interpret a request body. Empty bodies are absent.
pub fn request_body_value(bytes: &[u8]) -> Option<Value> {
    if bytes.is_empty() {
        return None;
    }
    Some(parse_or_text(bytes))
}

fn parse_or_text(bytes: &[u8]) -> Value {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(value) => value,
        Err(_) => Value::String(truncate_text(&String::from_utf8_lossy(bytes))),
    }
}

/// Cut text beyond [`MAX_TEXT_BODY_CHARS`] and append the marker.
pub fn truncate_text(text: &str) -> String {
    match text.char_indices().nth(MAX_TEXT_BODY_CHARS) {
        Some((cut, _)) => format!("{}{}", &text[..cut], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}
