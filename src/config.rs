//! Locker configuration, loadable from TOML.
//!
//! ```toml
//! poll_interval_ms = 5
//! default_timeout_ms = 30000
//! log_sessions = false
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const MIN_POLL_INTERVAL_MS: u64 = 1;
pub const MAX_POLL_INTERVAL_MS: u64 = 1000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value {value} for '{field}': {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        ConfigError::InvalidValue {
            field: field.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LockerConfig {
    /// How often a cancellable wait re-checks its token, in milliseconds.
    pub poll_interval_ms: u64,
    /// Session-wide timeout used when the caller passes none.
    pub default_timeout_ms: Option<u64>,
    /// Emit a debug event for every session state transition.
    pub log_sessions: bool,
}

impl Default for LockerConfig {
    fn default() -> Self {
        LockerConfig {
            poll_interval_ms: 5,
            default_timeout_ms: None,
            log_sessions: false,
        }
    }
}

impl LockerConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: LockerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&self.poll_interval_ms) {
            return Err(ConfigError::invalid_value(
                "poll_interval_ms",
                self.poll_interval_ms,
                format!("must be between {MIN_POLL_INTERVAL_MS} and {MAX_POLL_INTERVAL_MS}"),
            ));
        }
        if self.default_timeout_ms == Some(0) {
            return Err(ConfigError::invalid_value(
                "default_timeout_ms",
                0,
                "must be greater than 0; omit it to wait forever",
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_ms.map(Duration::from_millis)
    }

    /// Sets the default timeout, rounded up to whole milliseconds. Anything
    /// under a millisecond becomes 1 ms; values past `u64::MAX` ms saturate.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        let millis = timeout.as_nanos().div_ceil(1_000_000).max(1);
        self.default_timeout_ms = Some(u64::try_from(millis).unwrap_or(u64::MAX));
        self
    }
}
