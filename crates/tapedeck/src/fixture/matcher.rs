//! Template matching and mock response rendering.
//!
//! Matching is purely positional: a template matches a path when both have
//! the same number of `/`-separated segments, every literal segment is
//! equal, and every `{name}` segment captures the request segment at its
//! position. No regular expressions are involved.
//!
//! When several templates match one path, precedence is deterministic:
//! more literal segments win, then the template whose first differing
//! segment is a literal, then the lexicographically smaller template.

use super::registry::RouteRegistry;
use super::types::RouteConfig;
use crate::template::substitute;
use serde_json::Value;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Response headers that describe the original wire framing and must not
/// be replayed from a fixture.
const FRAMING_HEADERS: &[&str] = &[
    "content-length",
    "transfer-encoding",
    "connection",
    "keep-alive",
    "content-encoding",
];

/// Percent-decode one path segment. Invalid UTF-8 keeps the raw text.
fn decode_segment(raw: &str) -> Cow<'_, str> {
    urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

impl Segment {
    fn parse(raw: &str) -> Self {
        match raw.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(name) => Segment::Param(name.to_string()),
            None => Segment::Literal(raw.to_string()),
        }
    }

    fn is_literal(&self) -> bool {
        matches!(self, Segment::Literal(_))
    }
}

/// Parsed fixture path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    pub fn parse(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            segments: raw.split('/').map(Segment::parse).collect(),
        }
    }

    /// Capture parameters if `path` structurally matches this template.
    ///
    /// `path` is the raw request path. Each segment is percent-decoded
    /// after splitting, so an encoded `/` never adds a segment.
    pub fn captures(&self, path: &str) -> Option<HashMap<String, String>> {
        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            let part = decode_segment(part);
            match segment {
                Segment::Literal(literal) if literal.as_str() != part.as_ref() => return None,
                Segment::Literal(_) => {}
                Segment::Param(name) => {
                    params.insert(name.clone(), part.into_owned());
                }
            }
        }
        Some(params)
    }

    fn literal_count(&self) -> usize {
        self.segments.iter().filter(|s| s.is_literal()).count()
    }

    /// Ordering where the preferred template sorts first.
    pub fn precedence_cmp(&self, other: &Self) -> Ordering {
        other
            .literal_count()
            .cmp(&self.literal_count())
            .then_with(|| {
                self.segments
                    .iter()
                    .zip(&other.segments)
                    .map(|(a, b)| b.is_literal().cmp(&a.is_literal()))
                    .find(|ord| ord.is_ne())
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

/// A route selected for a request together with its captured parameters.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<RouteConfig>,
    pub params: HashMap<String, String>,
}

/// Everything needed to answer a matched request.
#[derive(Debug, Clone, PartialEq)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Value,
    pub delay: Option<Duration>,
}

impl RouteMatch {
    /// Apply placeholder substitution and collect status, headers and delay.
    pub fn render(&self) -> MockResponse {
        let body = match &self.route.response {
            Value::String(template) => {
                let rendered = substitute(template, &self.params);
                serde_json::from_str::<Value>(&rendered).unwrap_or(Value::String(rendered))
            }
            other => other.clone(),
        };

        let headers = self
            .route
            .headers
            .iter()
            .filter(|(name, _)| !FRAMING_HEADERS.contains(&name.to_ascii_lowercase().as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        let delay = match self.route.effective_delay_ms() {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };

        MockResponse {
            status: self.route.effective_status(),
            headers,
            body,
            delay,
        }
    }
}

/// Outcome of resolving a request against the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Matched(MockResponse),
    NotFound(Value),
}

/// Resolves inbound requests against the active route registry.
#[derive(Debug, Clone)]
pub struct ReplayMatcher {
    registry: Arc<RouteRegistry>,
}

impl ReplayMatcher {
    pub fn new(registry: Arc<RouteRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<RouteRegistry> {
        &self.registry
    }

    pub fn find(&self, method: &str, path: &str) -> Option<RouteMatch> {
        self.registry.current().find(method, path)
    }

    pub fn resolve(&self, method: &str, path: &str) -> Resolution {
        match self.find(method, path) {
            Some(found) => Resolution::Matched(found.render()),
            None => Resolution::NotFound(not_found_body(method, path)),
        }
    }
}

/// Structured body returned when no fixture matches.
pub fn not_found_body(method: &str, path: &str) -> Value {
    serde_json::json!({
        "error": "Route not found",
        "method": method,
        "path": path,
        "message": "This endpoint has not been configured in the mock server",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn route(method: &str, path: &str, response: Value) -> RouteConfig {
        RouteConfig {
            method: method.to_string(),
            path: path.to_string(),
            status: None,
            response,
            headers: BTreeMap::new(),
            delay: None,
            description: String::new(),
        }
    }

    fn matched(route: RouteConfig, path: &str) -> RouteMatch {
        let params = PathTemplate::parse(&route.path).captures(path).unwrap();
        RouteMatch {
            route: Arc::new(route),
            params,
        }
    }

    #[test]
    fn test_captures_params() {
        let template = PathTemplate::parse("/users/{id}/posts/{post}");
        let params = template.captures("/users/42/posts/7").unwrap();
        assert_eq!(params["id"], "42");
        assert_eq!(params["post"], "7");
    }

    #[test]
    fn test_segment_count_must_match() {
        let template = PathTemplate::parse("/users/{id}");
        assert!(template.captures("/users").is_none());
        assert!(template.captures("/users/1/extra").is_none());
        assert!(template.captures("/users/1/").is_none());
    }

    #[test]
    fn test_literals_must_match() {
        let template = PathTemplate::parse("/users/{id}");
        assert!(template.captures("/posts/1").is_none());
        assert!(PathTemplate::parse("/a/b").captures("/a/b").is_some());
    }

    #[test]
    fn test_segments_are_percent_decoded() {
        let template = PathTemplate::parse("/users/{id}");
        assert_eq!(template.captures("/users/john%20doe").unwrap()["id"], "john doe");
        assert_eq!(template.captures("/users/a%2Fb").unwrap()["id"], "a/b");

        let literal = PathTemplate::parse("/files/my file");
        assert!(literal.captures("/files/my%20file").is_some());
        assert!(literal.captures("/files/my%20files").is_none());
    }

    #[test]
    fn test_invalid_escape_kept_raw() {
        let template = PathTemplate::parse("/users/{id}");
        assert_eq!(template.captures("/users/%FF").unwrap()["id"], "%FF");
    }

    #[test]
    fn test_param_captures_empty_segment() {
        let template = PathTemplate::parse("/users/{id}");
        assert_eq!(template.captures("/users/").unwrap()["id"], "");
    }

    #[test]
    fn test_precedence_literal_beats_param() {
        let literal = PathTemplate::parse("/users/active");
        let param = PathTemplate::parse("/users/{id}");
        assert_eq!(literal.precedence_cmp(&param), Ordering::Less);
        assert_eq!(param.precedence_cmp(&literal), Ordering::Greater);
    }

    #[test]
    fn test_precedence_earlier_literal_wins_on_tie() {
        let left = PathTemplate::parse("/users/{id}/{tab}/x");
        let right = PathTemplate::parse("/{org}/users/{id}/x");
        // Both have three literal segments ("", "x" plus one more).
        assert_eq!(left.precedence_cmp(&right), Ordering::Less);
    }

    #[test]
    fn test_precedence_falls_back_to_template_text() {
        let a = PathTemplate::parse("/users/{a}");
        let b = PathTemplate::parse("/users/{b}");
        assert_eq!(a.precedence_cmp(&b), Ordering::Less);
        assert_eq!(a.precedence_cmp(&a), Ordering::Equal);
    }

    #[test]
    fn test_render_substitutes_and_parses_json() {
        let found = matched(
            route("GET", "/users/{id}", Value::String(r#"{"id":"{{id}}"}"#.into())),
            "/users/42",
        );
        let response = found.render();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, serde_json::json!({"id": "42"}));
        assert_eq!(response.delay, None);
    }

    #[test]
    fn test_render_non_json_string_stays_string() {
        let found = matched(
            route("GET", "/hello/{name}", Value::String("hello {{name}}".into())),
            "/hello/ada",
        );
        assert_eq!(found.render().body, Value::String("hello ada".into()));
    }

    #[test]
    fn test_render_structured_response_untouched() {
        let body = serde_json::json!({"id": "{{id}}"});
        let found = matched(route("GET", "/users/{id}", body.clone()), "/users/1");
        assert_eq!(found.render().body, body);
    }

    #[test]
    fn test_render_status_headers_delay() {
        let mut config = route("POST", "/orders", serde_json::json!({"ok": true}));
        config.status = Some(201);
        config.delay = Some(250);
        config.headers.insert("X-Mock".into(), "yes".into());
        config.headers.insert("Content-Length".into(), "999".into());
        config
            .headers
            .insert("Transfer-Encoding".into(), "chunked".into());

        let response = matched(config, "/orders").render();
        assert_eq!(response.status, 201);
        assert_eq!(response.delay, Some(Duration::from_millis(250)));
        assert_eq!(response.headers, vec![("X-Mock".into(), "yes".into())]);
    }

    #[test]
    fn test_not_found_body() {
        let body = not_found_body("DELETE", "/nothing");
        assert_eq!(body["error"], "Route not found");
        assert_eq!(body["method"], "DELETE");
        assert_eq!(body["path"], "/nothing");
    }
}
