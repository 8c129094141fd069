//! Fixture file types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// `{"routes": [...]}` envelope. Capture output files deserialize into this
/// type as well; capture-only fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureFile {
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

/// A single mock route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub method: String,
    /// Template with literal segments and `{name}` placeholders.
    pub path: String,
    /// Response status; unset (or 0) means 200.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// JSON payload, or a string that may embed `{{name}}` placeholders.
    #[serde(default)]
    pub response: Value,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Simulated latency in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl RouteConfig {
    /// Registry key: `UPPER(method):path`.
    pub fn key(&self) -> String {
        route_key(&self.method, &self.path)
    }

    pub fn effective_status(&self) -> u16 {
        match self.status {
            Some(status) if status != 0 => status,
            _ => 200,
        }
    }

    pub fn effective_delay_ms(&self) -> u64 {
        self.delay.unwrap_or(0)
    }
}

pub fn route_key(method: &str, path: &str) -> String {
    format!("{}:{}", method.to_uppercase(), path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_route_defaults() {
        let route: RouteConfig =
            serde_json::from_str(r#"{"method": "get", "path": "/users/{id}"}"#).unwrap();
        assert_eq!(route.key(), "GET:/users/{id}");
        assert_eq!(route.effective_status(), 200);
        assert_eq!(route.effective_delay_ms(), 0);
        assert_eq!(route.response, Value::Null);
        assert!(route.headers.is_empty());
    }

    #[test]
    fn test_zero_status_means_default() {
        let route: RouteConfig =
            serde_json::from_str(r#"{"method": "GET", "path": "/", "status": 0}"#).unwrap();
        assert_eq!(route.effective_status(), 200);
    }

    #[test]
    fn test_capture_file_fields_are_ignored() {
        let json = r#"{
            "routes": [{
                "method": "GET",
                "path": "/accounts/{id}",
                "status": 201,
                "response": {"id": 1},
                "headers": {"Content-Type": "application/json"},
                "description": "Captured from api.test",
                "captured_at": "2024-01-01T00:00:00Z",
                "response_time_ms": 12,
                "host": "api.test"
            }]
        }"#;
        let file: FixtureFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.routes.len(), 1);
        assert_eq!(file.routes[0].effective_status(), 201);
        assert_eq!(file.routes[0].headers["Content-Type"], "application/json");
    }

    #[test]
    fn test_missing_routes_is_empty() {
        let file: FixtureFile = serde_json::from_str("{}").unwrap();
        assert!(file.routes.is_empty());
    }
}
