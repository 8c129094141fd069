//! Path templating: reduces concrete request paths to reusable fixture paths.
//!
//! Volatile segments (numeric ids, UUIDs, long opaque tokens and
//! prefixed business identifiers) are replaced with `{id}`. Segment
//! positions are preserved, including the leading empty segment of an
//! absolute path, so `/accounts/12345` becomes `/accounts/{id}`.

use serde::{Deserialize, Serialize};

/// Placeholder substituted for volatile path segments.
pub const ID_PLACEHOLDER: &str = "{id}";

/// Identifier prefixes treated as volatile when they start a segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdPrefixes(Vec<String>);

impl IdPrefixes {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            prefixes
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        )
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    fn matches(&self, segment: &str) -> bool {
        self.0.iter().any(|prefix| segment.starts_with(prefix.as_str()))
    }
}

impl Default for IdPrefixes {
    fn default() -> Self {
        Self::new(["CUST-", "ACC-"])
    }
}

/// Turns concrete paths into `{id}` templates.
#[derive(Debug, Clone, Default)]
pub struct PathTemplater {
    prefixes: IdPrefixes,
}

impl PathTemplater {
    pub fn new(prefixes: IdPrefixes) -> Self {
        Self { prefixes }
    }

    /// Normalize a path. Pure and idempotent.
    pub fn normalize(&self, path: &str) -> String {
        path.split('/')
            .map(|segment| {
                if self.is_volatile(segment) {
                    ID_PLACEHOLDER
                } else {
                    segment
                }
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    fn is_volatile(&self, segment: &str) -> bool {
        is_numeric(segment)
            || is_uuid_shaped(segment)
            || is_long_opaque(segment)
            || self.prefixes.matches(segment)
    }
}

/// Normalize with the default identifier prefixes.
pub fn normalize(path: &str) -> String {
    PathTemplater::default().normalize(path)
}

fn is_numeric(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

// 36 chars with exactly four hyphens; the hex content is not checked.
fn is_uuid_shaped(segment: &str) -> bool {
    segment.chars().count() == 36 && segment.matches('-').count() == 4
}

fn is_long_opaque(segment: &str) -> bool {
    segment.chars().count() > 10 && !segment.contains('-')
}
