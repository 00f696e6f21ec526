//! Configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the display settings file, stored next to `config.toml`
const SETTINGS_FILE_NAME: &str = "settings.toml";

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Path to configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root; unit caches live in `<project_root>/.Metrics`
    pub project_root: String,

    /// Well-known socket subscribers connect to for reload notifications
    pub reload_socket_path: String,

    /// Socket accepting control commands (reload, status, recompute, ...)
    pub control_socket_path: String,

    /// Broadcast a reload when the settings file is edited externally
    pub watch_settings: bool,

    /// Maximum log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            config_path: Self::default_config_path(),
            project_root: ".".to_string(),
            reload_socket_path: metrilens_paths::get_reload_socket_path()
                .unwrap_or_else(|_| PathBuf::from("/tmp/metrilens_reload.sock"))
                .to_string_lossy()
                .into_owned(),
            control_socket_path: metrilens_paths::get_control_socket_path()
                .unwrap_or_else(|_| PathBuf::from("/tmp/metrilens.sock"))
                .to_string_lossy()
                .into_owned(),
            watch_settings: true,
            log_level: "info".to_string(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from the default location, or create it
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_config_path())
    }

    /// Load configuration from `config_path`, writing defaults if it is absent
    pub fn load_from(config_path: impl AsRef<Path>) -> Result<Self> {
        let config_path = config_path.as_ref().to_path_buf();

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let mut config: DaemonConfig = toml::from_str(&contents)
                .context("Failed to parse config file")?;

            config.config_path = config_path;
            Ok(config)
        } else {
            let config = Self {
                config_path,
                ..Self::default()
            };
            config.save()
                .context("Failed to save default config")?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(&self.config_path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Display settings file, in the same directory as the config file
    pub fn settings_path(&self) -> PathBuf {
        self.config_path
            .parent()
            .map(|dir| dir.join(SETTINGS_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(SETTINGS_FILE_NAME))
    }

    /// Parsed `log_level`, falling back to INFO
    pub fn tracing_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }

    fn default_config_path() -> PathBuf {
        metrilens_paths::get_config_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_creates_default_file() {
        let tmp_dir = TempDir::new().unwrap();
        let path = tmp_dir.path().join("nested").join("config.toml");

        let config = DaemonConfig::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.config_path, path);
        assert_eq!(config.project_root, ".");
        assert!(config.watch_settings);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let tmp_dir = TempDir::new().unwrap();
        let path = tmp_dir.path().join("config.toml");
        std::fs::write(&path, "project_root = \"/src/shop\"\nlog_level = \"debug\"\n").unwrap();

        let config = DaemonConfig::load_from(&path).unwrap();
        assert_eq!(config.project_root, "/src/shop");
        assert_eq!(config.tracing_level(), tracing::Level::DEBUG);
        assert!(config.reload_socket_path.ends_with("metrilens_reload.sock"));
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let tmp_dir = TempDir::new().unwrap();
        let path = tmp_dir.path().join("config.toml");
        std::fs::write(&path, "project_root = [").unwrap();

        assert!(DaemonConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_settings_path_next_to_config() {
        let config = DaemonConfig {
            config_path: PathBuf::from("/etc/metrilens/config.toml"),
            ..DaemonConfig::default()
        };
        assert_eq!(config.settings_path(), PathBuf::from("/etc/metrilens/settings.toml"));
    }

    #[test]
    fn test_bad_log_level_falls_back() {
        let config = DaemonConfig {
            log_level: "chatty".to_string(),
            ..DaemonConfig::default()
        };
        assert_eq!(config.tracing_level(), tracing::Level::INFO);
    }
}
