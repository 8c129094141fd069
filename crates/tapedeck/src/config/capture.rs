//! Capture proxy configuration.

use crate::recording::{known_buckets, IdPrefixes};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Target name used when no bucket-specific target is configured.
pub const DEFAULT_TARGET: &str = "default";

/// Environment variables that name per-bucket targets, with their bucket.
pub const LEGACY_TARGET_ENV: &[(&str, &str)] = &[
    ("ACCOUNTS_API_URL", "accounts"),
    ("CUSTOMERS_API_URL", "customers"),
    ("WALLET_API_URL", "cards"),
    ("LEDGER_API_API_URL", "ledger"),
    ("STATEMENTS_API_V2_URL", "statements"),
    ("AUTHORISATIONS_API_URL", "authorizations"),
    ("DEFAULT_TARGET", DEFAULT_TARGET),
];

/// How the proxy decides where a request goes. Resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardingMode {
    /// Forward to the absolute URL the client asked for.
    Transparent,
    /// Forward origin-form requests to a base URL chosen by service bucket.
    Configured { targets: BTreeMap<String, String> },
}

impl ForwardingMode {
    /// Base URL for a bucket, falling back to the `default` target.
    pub fn target_for(&self, bucket: &str) -> Option<&str> {
        match self {
            ForwardingMode::Transparent => None,
            ForwardingMode::Configured { targets } => targets
                .get(bucket)
                .or_else(|| targets.get(DEFAULT_TARGET))
                .map(|url| url.trim_end_matches('/')),
        }
    }

    pub fn is_transparent(&self) -> bool {
        matches!(self, ForwardingMode::Transparent)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaptureConfig {
    #[serde(default = "default_capture_port")]
    pub port: u16,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Transparent forwarding (true) or per-bucket targets (false)
    #[serde(default)]
    pub transparent: bool,
    /// Bucket name -> base URL, used when not transparent
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub targets: BTreeMap<String, String>,
    /// Segment prefixes that mark business identifiers (`CUST-`, `ACC-`)
    #[serde(default)]
    pub id_prefixes: IdPrefixes,
    /// Whole-exchange timeout toward the target
    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,
    /// Dial timeout for CONNECT targets
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_capture_port() -> u16 {
    8091
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./captured")
}

fn default_upstream_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            port: default_capture_port(),
            output_dir: default_output_dir(),
            transparent: false,
            targets: BTreeMap::new(),
            id_prefixes: IdPrefixes::default(),
            upstream_timeout_secs: default_upstream_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl CaptureConfig {
    pub fn forwarding_mode(&self) -> ForwardingMode {
        if self.transparent {
            ForwardingMode::Transparent
        } else {
            ForwardingMode::Configured {
                targets: self.targets.clone(),
            }
        }
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Merge targets from the legacy per-service environment variables.
    /// Targets already configured take precedence.
    pub fn merge_env_targets<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for (var, bucket) in LEGACY_TARGET_ENV {
            if let Some(url) = lookup(var).filter(|v| !v.is_empty()) {
                self.targets.entry(bucket.to_string()).or_insert(url);
            }
        }
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.upstream_timeout_secs == 0 {
            anyhow::bail!("upstream_timeout_secs must be greater than zero");
        }
        for (name, url) in &self.targets {
            let uri: hyper::Uri = url
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid target URL for '{name}': {e}"))?;
            if uri.scheme().is_none() || uri.authority().is_none() {
                anyhow::bail!("Target URL for '{name}' must be absolute: {url}");
            }
            if name != DEFAULT_TARGET && !known_buckets().any(|bucket| bucket == name) {
                tracing::warn!(
                    "Target '{}' does not match any service bucket and will never be used",
                    name
                );
            }
        }
        Ok(())
    }
}
