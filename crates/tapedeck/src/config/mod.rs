//! Configuration types for tapedeck.
//!
//! Both servers can be configured from command-line flags alone. An
//! optional YAML file provides the same settings under a `capture:` and a
//! `mock:` section; flags given explicitly on the command line override it.

mod capture;
mod mock;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use capture::{CaptureConfig, ForwardingMode, DEFAULT_TARGET, LEGACY_TARGET_ENV};
pub use mock::MockConfig;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub mock: MockConfig,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.capture.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
capture:
  port: 9100
  output_dir: /tmp/captures
  targets:
    accounts: http://accounts.internal:8080
    default: http://fallback.internal
  id_prefixes: ["CUST-", "ORD-"]
mock:
  port: 9200
  fixtures_dir: ./fixtures
  debounce_ms: 250
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();

        assert_eq!(config.capture.port, 9100);
        assert_eq!(config.capture.output_dir, PathBuf::from("/tmp/captures"));
        assert_eq!(
            config.capture.id_prefixes.as_slice(),
            &["CUST-".to_string(), "ORD-".to_string()]
        );
        assert_eq!(
            config.capture.forwarding_mode().target_for("ledger"),
            Some("http://fallback.internal")
        );
        assert_eq!(config.mock.port, 9200);
        assert_eq!(config.mock.debounce_ms, 250);
        assert!(config.mock.watch);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.capture.port, 8091);
        assert_eq!(config.mock.port, 8090);
        assert_eq!(config.mock.fixtures_dir, PathBuf::from("./configs"));
    }

    #[test]
    fn test_transparent_mode() {
        let yaml = r#"
capture:
  transparent: true
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.capture.forwarding_mode(), ForwardingMode::Transparent);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tapedeck.yaml");
        std::fs::write(&path, "mock:\n  port: 7000\n").unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.mock.port, 7000);
    }

    #[test]
    fn test_from_file_rejects_bad_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tapedeck.yaml");
        std::fs::write(&path, "capture:\n  targets:\n    users: not-a-url\n").unwrap();
        assert!(Config::from_file(&path).is_err());
    }
}
