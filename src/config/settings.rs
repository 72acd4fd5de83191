//! Application configuration

use anyhow::Result;
use pulseboard_types::WidgetInstance;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Current config format version
pub const CONFIG_VERSION: u32 = 1;

/// Application-wide configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Version of the config format
    #[serde(default = "default_version")]
    pub version: u32,
    /// Base URL of the dashboard backend API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Upper bound on a single fetch, in seconds
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// How often the dashboard file is re-read, in seconds
    #[serde(default = "default_reload_interval_secs")]
    pub reload_interval_secs: u64,
    /// Dashboard file holding the widget list (defaults to this config file)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashboard_path: Option<PathBuf>,
    /// Widgets on the dashboard
    #[serde(default)]
    pub widgets: Vec<WidgetInstance>,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn default_api_base_url() -> String {
    pulseboard_sources::DEFAULT_API_BASE.to_string()
}

fn default_fetch_timeout_secs() -> u64 {
    pulseboard_core::DEFAULT_FETCH_TIMEOUT.as_secs()
}

fn default_reload_interval_secs() -> u64 {
    30
}

impl AppConfig {
    /// Default configuration file path in the platform config directory
    pub fn config_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("dev", "pulseboard", "pulseboard")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(dirs.config_dir().join("config.json"))
    }

    /// Load configuration from a specific file path; a missing file yields defaults
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a specific file path
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    pub fn reload_interval(&self) -> Duration {
        Duration::from_secs(self.reload_interval_secs.max(1))
    }

    /// File the widget list is read from
    pub fn dashboard_file(&self, config_path: &Path) -> PathBuf {
        self.dashboard_path
            .clone()
            .unwrap_or_else(|| config_path.to_path_buf())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            api_base_url: default_api_base_url(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            reload_interval_secs: default_reload_interval_secs(),
            dashboard_path: None,
            widgets: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulseboard_types::{InstanceId, WidgetConfig};

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from_path(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.fetch_timeout(), Duration::from_secs(15));
        assert_eq!(config.api_base_url, "http://localhost:8080/api/v1");
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.reload_interval_secs = 5;
        config
            .widgets
            .push(WidgetInstance::new(3, "sonarr", WidgetConfig::new()));
        config.save_to_path(&path).unwrap();

        let loaded = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded.reload_interval_secs, 5);
        assert_eq!(loaded.widgets[0].id, InstanceId(3));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "fetch_timeout_secs": 4 }"#).unwrap();

        let config = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(config.fetch_timeout_secs, 4);
        assert_eq!(config.reload_interval_secs, 30);
        assert_eq!(config.dashboard_file(&path), path);
    }
}
