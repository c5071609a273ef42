//! Runtime configuration
//!
//! Loaded once at startup from an optional TOML file, with CLI flags and
//! environment variables layered on top by the `run` command. Defaults
//! mirror the service's production deployment: ten-minute windows, one
//! minute between retries, five minutes of ingest lag headroom.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("reading config file: {0}")]
    Io(String),

    /// Config file could not be parsed
    #[error("parsing config file: {0}")]
    Parse(String),

    /// Configuration is incomplete or inconsistent
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Service configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Base URLs of all sync sources
    pub sync_urls: Vec<String>,
    /// First window start when no checkpoint exists, Unix seconds
    pub start_time: i64,
    /// Window length, seconds
    pub time_range: i64,
    /// Sleep between iterations after a deferred or failed cycle, seconds
    pub wait_time: u64,
    /// Lag guard margin, seconds
    pub skip_time: i64,
    /// Directory backing checkpoint and cursor documents
    pub meta_dir: PathBuf,
    /// Directory backing archive segment objects
    pub object_dir: PathBuf,
    /// Prometheus scrape endpoint; metrics are disabled when unset
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sync_urls: Vec::new(),
            start_time: 0,
            time_range: 600,
            wait_time: 60,
            skip_time: 300,
            meta_dir: PathBuf::from("./meta"),
            object_dir: PathBuf::from("./archive"),
            metrics_addr: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, or defaults when no path is
    /// given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
                toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Validate that the configuration can drive the loop.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync_urls.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one sync source URL is required".to_string(),
            ));
        }
        if self.time_range <= 0 {
            return Err(ConfigError::Invalid(
                "time-range must be positive".to_string(),
            ));
        }
        if self.skip_time < 0 {
            return Err(ConfigError::Invalid(
                "skip-time must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_deployment_values() {
        let config = Config::default();
        assert_eq!(config.time_range, 600);
        assert_eq!(config.wait_time, 60);
        assert_eq!(config.skip_time, 300);
        assert!(config.metrics_addr.is_none());
    }

    #[test]
    fn test_load_toml_with_partial_overrides() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("archiver.toml");
        std::fs::write(
            &path,
            r#"
sync-urls = ["http://sn0:8080", "http://sn1:8080"]
start-time = 1700000000
time-range = 300
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.sync_urls.len(), 2);
        assert_eq!(config.start_time, 1_700_000_000);
        assert_eq!(config.time_range, 300);
        // Unspecified fields keep their defaults
        assert_eq!(config.wait_time, 60);
    }

    #[test]
    fn test_validate_requires_sources() {
        let config = Config::default();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.sync_urls.push("http://sn0:8080".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_nonpositive_range() {
        let mut config = Config::default();
        config.sync_urls.push("http://sn0:8080".to_string());
        config.time_range = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "sync-urls = not-a-list").unwrap();
        assert!(matches!(
            Config::load(Some(&path)),
            Err(ConfigError::Parse(_))
        ));
    }
}
