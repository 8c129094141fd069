//! Shared state handed to every proxied request.

use super::client::HttpClient;
use crate::config::ForwardingMode;
use crate::recording::{CaptureStore, PathTemplater};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Everything a request handler needs. Built once at startup.
pub struct ProxyContext {
    pub http_client: HttpClient,
    pub mode: ForwardingMode,
    pub templater: PathTemplater,
    pub store: Arc<CaptureStore>,
    pub output_dir: PathBuf,
    pub upstream_timeout: Duration,
    pub connect_timeout: Duration,
}
