//! Persisted application settings (`~/.config/homoTui/config.json`).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:9090";
const CONFIG_DIR: &str = "homoTui";
const CONFIG_FILE: &str = "config.json";
const BACKUP_SUFFIX: &str = "backup";

/// Connection settings for the proxy-core control API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default)]
    pub secret: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { base_url: DEFAULT_BASE_URL.to_string(), secret: String::new() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
}

/// Default location, `~/.config/homoTui/config.json`
pub fn default_config_path() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".config").join(CONFIG_DIR).join(CONFIG_FILE)
}

/// Loads, validates and persists [`AppConfig`].
pub struct ConfigManager {
    config: AppConfig,
    path: PathBuf,
}

impl ConfigManager {
    pub fn new(path: PathBuf) -> Self {
        Self { config: AppConfig::default(), path }
    }

    /// Read the file, creating it with defaults when missing.
    pub fn load(&mut self) -> Result<(), String> {
        self.ensure_dir()?;
        if !self.path.exists() {
            log::info!("no config at {}, writing defaults", self.path.display());
            return self.save();
        }
        let content =
            fs::read_to_string(&self.path).map_err(|e| format!("Failed to read config file: {}", e))?;
        self.config = serde_json::from_str(&content).map_err(|e| format!("Failed to parse config file: {}", e))?;
        log::info!("loaded config from {}", self.path.display());
        Ok(())
    }

    pub fn save(&self) -> Result<(), String> {
        self.ensure_dir()?;
        let json =
            serde_json::to_string_pretty(&self.config).map_err(|e| format!("Failed to serialize config: {}", e))?;
        fs::write(&self.path, json).map_err(|e| format!("Failed to write config file: {}", e))
    }

    pub fn get(&self) -> &AppConfig {
        &self.config
    }

    /// Replace the API settings and persist them
    pub fn set_endpoint(&mut self, base_url: &str, secret: &str) -> Result<(), String> {
        self.config.api = ApiConfig { base_url: base_url.trim().to_string(), secret: secret.to_string() };
        self.save()
    }

    /// Restore defaults and persist them
    pub fn reset(&mut self) -> Result<(), String> {
        self.config = AppConfig::default();
        self.save()
    }

    pub fn validate(&self) -> Result<(), String> {
        let base_url = self.config.api.base_url.trim();
        if base_url.is_empty() {
            return Err("API base URL must not be empty".to_string());
        }
        ht_api::validate_base_url(base_url)
    }

    /// Copy the current file to `config.json.backup`. No-op when nothing was saved yet.
    pub fn backup(&self) -> Result<(), String> {
        if !self.path.exists() {
            return Ok(());
        }
        fs::copy(&self.path, self.backup_path()).map_err(|e| format!("Failed to back up config: {}", e))?;
        Ok(())
    }

    /// Replace the current file with the backup and reload it.
    pub fn restore(&mut self) -> Result<(), String> {
        let backup = self.backup_path();
        if !backup.exists() {
            return Err("No config backup to restore".to_string());
        }
        fs::copy(&backup, &self.path).map_err(|e| format!("Failed to restore config: {}", e))?;
        self.load()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the config file; logs and panic reports go here too
    pub fn data_dir(&self) -> PathBuf {
        self.path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."))
    }

    fn backup_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".");
        name.push(BACKUP_SUFFIX);
        self.path.with_file_name(name)
    }

    fn ensure_dir(&self) -> Result<(), String> {
        fs::create_dir_all(self.data_dir()).map_err(|e| format!("Failed to create config directory: {}", e))
    }
}
