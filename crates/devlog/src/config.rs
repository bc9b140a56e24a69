//! Logger configuration.
//!
//! Configuration for the debug logger, including:
//! - Caller scope written on every primary-store record
//! - Local cache location and key
//! - Primary-store timeout
//! - Monitoring sink switch and extra tracked dependency versions

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_CACHE_KEY;
use crate::error::{LogError, Result};

/// Entries older than this many days are removed by retention pruning.
pub const RETENTION_DAYS: i64 = 30;

/// Default primary-store timeout in milliseconds.
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 3_000;

fn default_user_id() -> String {
    "local".to_string()
}

fn default_cache_dir() -> PathBuf {
    dirs::data_local_dir().map_or_else(|| PathBuf::from(".devlog"), |dir| dir.join("devlog"))
}

fn default_cache_key() -> String {
    DEFAULT_CACHE_KEY.to_string()
}

const fn default_store_timeout_ms() -> u64 {
    DEFAULT_STORE_TIMEOUT_MS
}

const fn default_true() -> bool {
    true
}

/// Configuration for the debug logger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggerConfig {
    /// Scope identifier for primary-store records.
    #[serde(default = "default_user_id")]
    pub user_id: String,
    /// Directory of the local fallback cache.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// File stem of the local cache blob.
    #[serde(default = "default_cache_key")]
    pub cache_key: String,
    /// Timeout for each primary-store call, in milliseconds.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    /// Whether a configured monitoring sink is used.
    #[serde(default = "default_true")]
    pub sink_enabled: bool,
    /// Extra dependency versions recorded in environment snapshots.
    #[serde(default)]
    pub tracked_dependencies: BTreeMap<String, String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            cache_dir: default_cache_dir(),
            cache_key: default_cache_key(),
            store_timeout_ms: DEFAULT_STORE_TIMEOUT_MS,
            sink_enabled: true,
            tracked_dependencies: BTreeMap::new(),
        }
    }
}

impl LoggerConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            LogError::Config(format!(
                "failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| LogError::Config(format!("invalid TOML: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(LogError::Config("user_id cannot be empty".to_string()));
        }

        if self.cache_key.is_empty() {
            return Err(LogError::Config("cache_key cannot be empty".to_string()));
        }

        if self.cache_key.contains(['/', '\\']) || self.cache_key == ".." {
            return Err(LogError::Config(
                "cache_key must not contain path separators".to_string(),
            ));
        }

        if self.store_timeout_ms == 0 {
            return Err(LogError::Config(
                "store_timeout_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Sets the caller scope.
    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Sets the cache directory.
    #[must_use]
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Sets the primary-store timeout.
    #[must_use]
    pub const fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Returns the primary-store timeout.
    #[must_use]
    pub const fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn defaults_are_valid() {
        let config = LoggerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache_key, "debug_logs");
        assert_eq!(config.store_timeout(), Duration::from_secs(3));
        assert!(config.sink_enabled);
    }

    #[test]
    fn parses_partial_toml() {
        let config = LoggerConfig::from_toml(
            r#"
            user_id = "alice"
            cache_dir = "/tmp/devlog"
            store_timeout_ms = 500

            [tracked_dependencies]
            react = "18.2.0"
            "#,
        )
        .expect("parse");

        assert_eq!(config.user_id, "alice");
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/devlog"));
        assert_eq!(config.store_timeout_ms, 500);
        assert_eq!(config.cache_key, "debug_logs");
        assert_eq!(
            config.tracked_dependencies.get("react").map(String::as_str),
            Some("18.2.0")
        );
    }

    #[test]
    fn rejects_invalid_toml() {
        let result = LoggerConfig::from_toml("user_id = ");
        assert!(matches!(result, Err(LogError::Config(msg)) if msg.contains("invalid TOML")));
    }

    #[test_case(r#"user_id = """# ; "empty user")]
    #[test_case(r#"cache_key = "../etc""# ; "path in key")]
    #[test_case("store_timeout_ms = 0" ; "zero timeout")]
    fn rejects_invalid_values(toml: &str) {
        assert!(matches!(LoggerConfig::from_toml(toml), Err(LogError::Config(_))));
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("devlog.toml");
        std::fs::write(&path, "user_id = \"bob\"\nsink_enabled = false\n").expect("write");

        let config = LoggerConfig::from_file(&path).expect("load");
        assert_eq!(config.user_id, "bob");
        assert!(!config.sink_enabled);
    }

    #[test]
    fn from_file_missing() {
        let result = LoggerConfig::from_file("/nonexistent/devlog.toml");
        assert!(matches!(result, Err(LogError::Config(msg)) if msg.contains("failed to read")));
    }

    #[test]
    fn builder_setters() {
        let config = LoggerConfig::default()
            .with_user_id("carol")
            .with_cache_dir("/var/tmp/x")
            .with_store_timeout(Duration::from_millis(250));
        assert_eq!(config.user_id, "carol");
        assert_eq!(config.cache_dir, PathBuf::from("/var/tmp/x"));
        assert_eq!(config.store_timeout_ms, 250);
    }
}
