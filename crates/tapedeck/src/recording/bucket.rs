//! Service bucket attribution for captured exchanges.
//!
//! Buckets group captures into per-service fixture files. The rule set is
//! ordered and the first rule whose substring occurs in the templated path
//! wins; anything unmatched lands in [`DEFAULT_BUCKET`].

/// Bucket for paths no rule claims.
pub const DEFAULT_BUCKET: &str = "misc";

/// Ordered (bucket, substrings) rules.
const BUCKET_RULES: &[(&str, &[&str])] = &[
    ("accounts", &["/accounts"]),
    ("customers", &["/customers"]),
    ("cards", &["/cards", "/wallet"]),
    ("ledger", &["/ledger"]),
    ("statements", &["/statements"]),
    ("authorizations", &["/authorizations"]),
    ("users", &["/users"]),
    ("posts", &["/posts"]),
];

/// Resolve the service bucket for a (templated) path.
pub fn bucket_for(path: &str) -> &'static str {
    BUCKET_RULES
        .iter()
        .find(|(_, needles)| needles.iter().any(|needle| path.contains(needle)))
        .map(|(bucket, _)| *bucket)
        .unwrap_or(DEFAULT_BUCKET)
}

/// Every bucket name the rules can produce, default included.
pub fn known_buckets() -> impl Iterator<Item = &'static str> {
    BUCKET_RULES
        .iter()
        .map(|(bucket, _)| *bucket)
        .chain(std::iter::once(DEFAULT_BUCKET))
}
