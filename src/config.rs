//! Configuration for copilot-session.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Directory holding the durable session cache.
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Session cache configuration.
    #[serde(default)]
    pub session: SessionConfig,

    /// Backend user-profile endpoint.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Transaction oracle endpoint.
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Verification poller tuning.
    #[serde(default)]
    pub verification: VerificationConfig,
}

/// Session cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Durable store key the cached user is written under.
    #[serde(default = "default_cache_key")]
    pub cache_key: String,

    /// Number of identities whose last fetched record is kept in memory.
    #[serde(default = "default_memo_capacity")]
    pub memo_capacity: usize,
}

/// Backend user-profile endpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the backend.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of the user profile endpoint.
    #[serde(default = "default_profile_path")]
    pub profile_path: String,

    /// Bearer token sent with profile requests.
    #[serde(default)]
    pub access_token: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Transaction oracle endpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Base URL of the oracle.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of the transaction check endpoint.
    #[serde(default = "default_check_path")]
    pub check_path: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Verification poller configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Delay between oracle checks, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Number of oracle checks before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl VerificationConfig {
    /// Delay between oracle checks.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            log_level: default_log_level(),
            session: SessionConfig::default(),
            backend: BackendConfig::default(),
            oracle: OracleConfig::default(),
            verification: VerificationConfig::default(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cache_key: default_cache_key(),
            memo_capacity: default_memo_capacity(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            profile_path: default_profile_path(),
            access_token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            check_path: default_check_path(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_root_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "copilot")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".copilot"))
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_cache_key() -> String {
    "app-user-data".to_string()
}

const fn default_memo_capacity() -> usize {
    16
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_profile_path() -> String {
    "/api/user".to_string()
}

fn default_check_path() -> String {
    "/api/eap/check".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_poll_interval_ms() -> u64 {
    3_000
}

const fn default_max_attempts() -> u32 {
    20
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or fails validation.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &std::path::Path) -> crate::Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the session core cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] naming the offending key.
    pub fn validate(&self) -> crate::Result<()> {
        if self.session.cache_key.trim().is_empty() {
            return Err(crate::Error::Config(
                "session.cache_key must not be empty".to_string(),
            ));
        }
        if self.session.memo_capacity == 0 {
            return Err(crate::Error::Config(
                "session.memo_capacity must be at least 1".to_string(),
            ));
        }
        if self.verification.max_attempts == 0 {
            return Err(crate::Error::Config(
                "verification.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
