//! Session tuning knobs.
//!
//! Every field has a default from [`constants`](crate::constants), so an
//! empty TOML document is a valid config:
//!
//! ```toml
//! typing_timeout_ms = 2000
//! remote_typing_ttl_ms = 5000
//!
//! [reconnect]
//! max_attempts = 8
//! backoff_ms = 500
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    CONNECT_TIMEOUT, HISTORY_TIMEOUT, MAX_FRAME_LENGTH, MAX_RECONNECT_ATTEMPTS, RECONNECT_BACKOFF,
    REMOTE_TYPING_TTL, TYPING_TIMEOUT,
};

/// Errors loading a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Per-session tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Local inactivity window before `typing:stop`.
    pub typing_timeout_ms: u64,
    /// Remote typing indicator lifetime without a refresh.
    pub remote_typing_ttl_ms: u64,
    /// One-shot history pull timeout.
    pub history_timeout_ms: u64,
    pub reconnect: ReconnectPolicy,
}

/// How the TCP transport retries a dropped relay connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Consecutive failed attempts before giving up (0 = never reconnect).
    pub max_attempts: u32,
    /// Base delay; attempt `n` waits `n * backoff_ms`.
    pub backoff_ms: u64,
    pub connect_timeout_ms: u64,
    pub max_frame_length: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            typing_timeout_ms: TYPING_TIMEOUT.as_millis() as u64,
            remote_typing_ttl_ms: REMOTE_TYPING_TTL.as_millis() as u64,
            history_timeout_ms: HISTORY_TIMEOUT.as_millis() as u64,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RECONNECT_ATTEMPTS,
            backoff_ms: RECONNECT_BACKOFF.as_millis() as u64,
            connect_timeout_ms: CONNECT_TIMEOUT.as_millis() as u64,
            max_frame_length: MAX_FRAME_LENGTH,
        }
    }
}

impl SessionConfig {
    /// Parse from a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn typing_timeout(&self) -> Duration {
        Duration::from_millis(self.typing_timeout_ms)
    }

    pub fn remote_typing_ttl(&self) -> Duration {
        Duration::from_millis(self.remote_typing_ttl_ms)
    }

    pub fn history_timeout(&self) -> Duration {
        Duration::from_millis(self.history_timeout_ms)
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_ms.saturating_mul(u64::from(attempt)))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

// ============================================================================
// Tests
// ============================================================================
