//! Mock server configuration.

use crate::fixture::DEFAULT_DEBOUNCE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MockConfig {
    #[serde(default = "default_mock_port")]
    pub port: u16,
    /// Directory holding `*.json` fixture files
    #[serde(default = "default_fixtures_dir")]
    pub fixtures_dir: PathBuf,
    /// Quiet period after a change before the registry reloads
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Reload automatically when fixture files change
    #[serde(default = "default_watch")]
    pub watch: bool,
}

fn default_mock_port() -> u16 {
    8090
}

fn default_fixtures_dir() -> PathBuf {
    PathBuf::from("./configs")
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE.as_millis() as u64
}

fn default_watch() -> bool {
    true
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            port: default_mock_port(),
            fixtures_dir: default_fixtures_dir(),
            debounce_ms: default_debounce_ms(),
            watch: default_watch(),
        }
    }
}

impl MockConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
