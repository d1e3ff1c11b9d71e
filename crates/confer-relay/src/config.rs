//! Relay configuration.
//!
//! Resolution order: an explicit `--config` path, then
//! `~/.config/confer/relay.toml` if it exists, then built-in defaults.
//! Command-line flags are applied on top by the binary.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::RelayError;
use crate::constants::{
    CONFIG_FILE_NAME, DEFAULT_BIND_ADDRESS, DEFAULT_LOG_FILTER, DEFAULT_PORT,
    HUB_CHANNEL_CAPACITY, MAX_LINE_LENGTH,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// `host:port` to listen on.
    pub bind: String,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Hub command queue capacity.
    pub channel_capacity: usize,
    /// Longest accepted client frame, in bytes.
    pub max_line_length: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: format!("{DEFAULT_BIND_ADDRESS}:{DEFAULT_PORT}"),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            channel_capacity: HUB_CHANNEL_CAPACITY,
            max_line_length: MAX_LINE_LENGTH,
        }
    }
}

impl RelayConfig {
    /// Loopback on an OS-assigned port, for tests.
    pub fn ephemeral() -> Self {
        Self {
            bind: format!("{DEFAULT_BIND_ADDRESS}:0"),
            ..Self::default()
        }
    }

    /// `~/.config/confer/relay.toml` (platform equivalent).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("confer").join(CONFIG_FILE_NAME))
    }

    pub fn from_toml_str(s: &str) -> Result<Self, RelayError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, RelayError> {
        let text = std::fs::read_to_string(path).map_err(|source| RelayError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Resolve the config. An explicit path must exist; the default path is
    /// optional.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, RelayError> {
        if let Some(path) = explicit {
            info!(path = %path.display(), "loading relay config");
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => {
                info!(path = %path.display(), "loading relay config");
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(RelayConfig::from_toml_str("").unwrap(), RelayConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = RelayConfig::from_toml_str("bind = \"0.0.0.0:9000\"\nmax_line_length = 512\n").unwrap();
        assert_eq!(config.bind, "0.0.0.0:9000");
        assert_eq!(config.max_line_length, 512);
        assert_eq!(config.channel_capacity, HUB_CHANNEL_CAPACITY);
    }

    #[test]
    fn test_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "log_filter = \"debug\"").unwrap();
        let config = RelayConfig::discover(Some(file.path())).unwrap();
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn test_missing_explicit_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            RelayConfig::discover(Some(&missing)),
            Err(RelayError::ConfigRead { .. })
        ));
    }

    #[test]
    fn test_bad_toml_is_error() {
        assert!(matches!(
            RelayConfig::from_toml_str("bind = ["),
            Err(RelayError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_ephemeral_port() {
        assert!(RelayConfig::ephemeral().bind.ends_with(":0"));
    }
}
