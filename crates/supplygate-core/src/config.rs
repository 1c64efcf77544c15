//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the API base URL, the last used login email, and the
//! session guard settings.
//!
//! Configuration is stored at `~/.config/supplygate/config.json`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::guard::GuardConfig;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "supplygate";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the configured API base URL
pub const API_URL_ENV: &str = "SUPPLYGATE_API_URL";

/// Used when neither the config file nor the environment names a backend
const DEFAULT_API_BASE_URL: &str = "http://localhost:3000";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub last_email: Option<String>,
    #[serde(default)]
    pub guard: GuardConfig,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Base URL from the environment, then the config file, then the default
    pub fn api_base_url(&self) -> String {
        self.resolve_api_base_url(std::env::var(API_URL_ENV).ok())
    }

    fn resolve_api_base_url(&self, from_env: Option<String>) -> String {
        from_env
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.api_base_url.clone())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
    }
}
