//! Placeholder substitution for fixture response templates.
//!
//! Fixture responses authored as strings may embed `{{name}}` tokens. Each
//! token whose name was captured from the request path is replaced with the
//! captured value; tokens without a matching parameter are left untouched.
//!
//! # Example
//!
//! ```json
//! { "method": "GET", "path": "/users/{id}", "response": "{\"id\": \"{{id}}\"}" }
//! ```
//!
//! `GET /users/42` renders `{"id": "42"}`.

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Regex for `{{name}}` placeholders.
static PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();

fn placeholder_regex() -> &'static Regex {
    PLACEHOLDER_REGEX.get_or_init(|| {
        Regex::new(r"\{\{([^{}]+)\}\}").expect("placeholder regex is valid")
    })
}

/// Replace every `{{name}}` occurrence with the matching parameter value.
pub fn substitute(template: &str, params: &HashMap<String, String>) -> String {
    if params.is_empty() || !template.contains("{{") {
        return template.to_string();
    }

    placeholder_regex()
        .replace_all(template, |caps: &Captures| match params.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_substitute_single() {
        let result = substitute(r#"{"id":"{{id}}"}"#, &params(&[("id", "42")]));
        assert_eq!(result, r#"{"id":"42"}"#);
    }

    #[test]
    fn test_substitute_repeated_and_multiple() {
        let result = substitute(
            "{{user}}/{{post}}/{{user}}",
            &params(&[("user", "u1"), ("post", "p9")]),
        );
        assert_eq!(result, "u1/p9/u1");
    }

    #[test]
    fn test_unknown_placeholder_kept() {
        let result = substitute("{{id}}-{{missing}}", &params(&[("id", "7")]));
        assert_eq!(result, "7-{{missing}}");
    }

    #[test]
    fn test_no_params_is_identity() {
        assert_eq!(substitute("{{id}}", &HashMap::new()), "{{id}}");
    }

    #[test]
    fn test_single_braces_untouched() {
        let result = substitute("/users/{id}", &params(&[("id", "7")]));
        assert_eq!(result, "/users/{id}");
    }
}
