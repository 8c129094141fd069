//! Error types shared by the capture proxy and the mock server.

use hyper::StatusCode;
use std::path::PathBuf;

/// Failures while forwarding or tunneling a proxied request.
///
/// None of these are fatal: each one is turned into an error response for
/// the client that triggered it and nothing is captured.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("upstream {target} unavailable: {reason}")]
    UpstreamUnavailable { target: String, reason: String },
    #[error("upstream {target} did not answer within {timeout_secs}s")]
    Timeout { target: String, timeout_secs: u64 },
    #[error("tunnel to {authority} failed: {reason}")]
    TunnelSetupFailed { authority: String, reason: String },
    #[error("invalid proxy request: {0}")]
    InvalidProxyRequest(String),
}

impl ProxyError {
    /// Status code returned to the client for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::UpstreamUnavailable { .. } | ProxyError::Timeout { .. } => {
                StatusCode::BAD_GATEWAY
            }
            ProxyError::TunnelSetupFailed { .. } => StatusCode::BAD_GATEWAY,
            ProxyError::InvalidProxyRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Label used for the forward error metric.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::UpstreamUnavailable { .. } => "upstream",
            ProxyError::Timeout { .. } => "timeout",
            ProxyError::TunnelSetupFailed { .. } => "tunnel",
            ProxyError::InvalidProxyRequest(_) => "invalid",
        }
    }
}

/// Failures of the capture store flush.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("no captures to save")]
    NothingToFlush,
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize captures: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failures while loading fixture files.
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("malformed fixture file {path}: {source}")]
    MalformedFixtureFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
