//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the content API URL, which storage backend holds credentials, the last
//! used username and the in-flight verification policy.
//!
//! Configuration is stored at `~/.config/folio/config.json`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_API_URL;
use crate::auth::InFlightPolicy;
use crate::storage::{FileStorage, KeyringStorage, MemoryStorage, Storage, StorageBackend};

/// Application name used for config/data directory paths
pub const APP_NAME: &str = "folio";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable that overrides the configured API URL
pub const API_URL_ENV: &str = "FOLIO_API_URL";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub api_url: Option<String>,
    pub storage: StorageBackend,
    pub last_username: Option<String>,
    pub in_flight_policy: InFlightPolicy,
    pub log_to_file: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Invalid config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory for the session file and logs.
    pub fn data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// API base URL: environment first, then config, then the default.
    pub fn resolved_api_url(&self) -> String {
        Self::pick_api_url(std::env::var(API_URL_ENV).ok(), self.api_url.as_deref())
    }

    fn pick_api_url(env: Option<String>, configured: Option<&str>) -> String {
        env.filter(|url| !url.trim().is_empty())
            .or_else(|| configured.filter(|url| !url.trim().is_empty()).map(str::to_string))
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    /// Open the configured credential backend.
    pub fn open_storage(&self) -> Result<Arc<dyn Storage>> {
        self.open_backend(self.storage)
    }

    pub fn open_backend(&self, backend: StorageBackend) -> Result<Arc<dyn Storage>> {
        Ok(match backend {
            StorageBackend::File => Arc::new(FileStorage::in_dir(&Self::data_dir()?)),
            StorageBackend::Keyring => Arc::new(KeyringStorage::new()?),
            StorageBackend::Memory => Arc::new(MemoryStorage::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.storage, StorageBackend::File);
        assert_eq!(config.in_flight_policy, InFlightPolicy::Optimistic);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            api_url: Some("https://example.test/api".to_string()),
            storage: StorageBackend::Keyring,
            last_username: Some("admin".to_string()),
            in_flight_policy: InFlightPolicy::Await,
            log_to_file: true,
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"storage": "memory"}"#).unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.storage, StorageBackend::Memory);
        assert!(config.api_url.is_none());
    }

    #[test]
    fn test_api_url_precedence() {
        assert_eq!(
            Config::pick_api_url(Some("http://env/api".into()), Some("http://cfg/api")),
            "http://env/api"
        );
        assert_eq!(
            Config::pick_api_url(None, Some("http://cfg/api")),
            "http://cfg/api"
        );
        assert_eq!(Config::pick_api_url(Some(" ".into()), None), DEFAULT_API_URL);
    }
}
