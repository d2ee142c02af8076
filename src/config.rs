//! Connector configuration
//!
//! Loaded from a TOML file; every field has a default so a partial (or
//! missing) file still yields a usable configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    DEFAULT_LIBRARY_PATH, DEFAULT_PARAMETER_SETTLE_MS, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_RESTART_DELAY_MS,
};
use crate::error::ConfigError;

/// Configuration for a [`Connector`](crate::connector::Connector)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    /// Path to `VoicemeeterRemote64.dll`; `None` uses the default install path
    pub library_path: Option<PathBuf>,

    /// Restart callbacks after a stream format change unless a registration
    /// overrides it
    pub restart_on_changed_stream: bool,

    /// Settle time before restarting after a stream change
    pub restart_delay_ms: u64,

    /// Dirty-flag poll period of the change watcher
    pub poll_interval_ms: u64,

    /// Wait applied after forwarding a parameter script
    pub parameter_settle_ms: u64,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            library_path: None,
            restart_on_changed_stream: true,
            restart_delay_ms: DEFAULT_RESTART_DELAY_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            parameter_settle_ms: DEFAULT_PARAMETER_SETTLE_MS,
        }
    }
}

impl ConnectorConfig {
    /// Load a configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parse a configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Write the configuration as TOML, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let text = toml::to_string_pretty(self)?;
        let io_err = |source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, text).map_err(io_err)
    }

    /// Per-user config file location
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        directories::ProjectDirs::from("", "", "voicemeeter-remote")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load from [`default_path`](Self::default_path), falling back to defaults
    /// when the file does not exist
    pub fn load_or_default() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Library path: the configured one, else the installer's record, else
    /// the default install location
    pub fn library_path(&self) -> PathBuf {
        self.library_path
            .clone()
            .or_else(crate::remote::installed_library_path)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LIBRARY_PATH))
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn parameter_settle(&self) -> Duration {
        Duration::from_millis(self.parameter_settle_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = ConnectorConfig::from_toml("restart_delay_ms = 120\n").unwrap();
        assert_eq!(config.restart_delay(), Duration::from_millis(120));
        assert!(config.restart_on_changed_stream);
        assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(config.library_path, None);
    }

    #[test]
    fn test_save_then_load() {
        let dir = std::env::temp_dir().join(format!("vmr-config-{}", std::process::id()));
        let path = dir.join("nested").join("config.toml");
        let config = ConnectorConfig {
            library_path: Some(PathBuf::from("/opt/vb/VoicemeeterRemote64.dll")),
            restart_on_changed_stream: false,
            ..Default::default()
        };

        config.save(&path).unwrap();
        let loaded = ConnectorConfig::load(&path).unwrap();
        assert_eq!(loaded, config);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let err = ConnectorConfig::from_toml("restart_delay_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
