use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PluginHubError, Result};

const CONFIG_FILE: &str = "config.toml";

pub const DEFAULT_REGISTRY_URL: &str = "https://plugins.artalk.js.org";
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

/// Default config template with rich comments
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# plugin-hub configuration file
# Location: ~/.plugin-hub/config.toml

[plugin]
# Master switch for serving enabled plugins to the comment widget
enabled = true

# Base URL of the remote registry; "/registry.json" is appended
registry_url = "https://plugins.artalk.js.org"

# Version of the host application, checked against min_artalk_version
# Default: the plugin-hub version
# app_version = "2.9.0"

# Timeout for registry and options-schema downloads, in seconds
fetch_timeout_secs = 10
"#;

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub plugin: PluginConfig,
}

/// Plugin-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_registry_url")]
    pub registry_url: String,

    /// Version of the host application
    #[serde(default = "default_app_version")]
    pub app_version: String,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_registry_url() -> String {
    DEFAULT_REGISTRY_URL.to_string()
}

fn default_app_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_fetch_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            registry_url: default_registry_url(),
            app_version: default_app_version(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl PluginConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }
}

/// Default base directory (~/.plugin-hub)
pub fn default_base_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or(PluginHubError::HomeNotFound)?;
    Ok(home.join(".plugin-hub"))
}

impl Config {
    /// Load config from base directory
    pub fn load(base_dir: &Path) -> Result<Self> {
        let path = base_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| PluginHubError::ConfigParse {
                path: path.clone(),
                message: e.to_string(),
            })?;

        Ok(config)
    }

    /// Save config to base directory
    pub fn save(&self, base_dir: &Path) -> Result<()> {
        let path = base_dir.join(CONFIG_FILE);
        fs::create_dir_all(base_dir)?;

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    /// Get config file path
    pub fn path(base_dir: &Path) -> PathBuf {
        base_dir.join(CONFIG_FILE)
    }

    /// Initialize config with default template (rich comments)
    pub fn init(base_dir: &Path) -> Result<PathBuf> {
        let path = base_dir.join(CONFIG_FILE);
        fs::create_dir_all(base_dir)?;

        if !path.exists() {
            fs::write(&path, DEFAULT_CONFIG_TEMPLATE)?;
        }

        Ok(path)
    }

    /// Get a config value by dot-notation key
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "plugin.enabled" => Some(self.plugin.enabled.to_string()),
            "plugin.registry_url" => Some(self.plugin.registry_url.clone()),
            "plugin.app_version" => Some(self.plugin.app_version.clone()),
            "plugin.fetch_timeout_secs" => Some(self.plugin.fetch_timeout_secs.to_string()),
            _ => None,
        }
    }

    /// Set a config value by dot-notation key
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "plugin.enabled" => {
                self.plugin.enabled = value.parse().map_err(|_| PluginHubError::ConfigValue {
                    key: key.to_string(),
                    message: format!("expected true or false, got '{}'", value),
                })?;
            }
            "plugin.registry_url" => {
                if !value.starts_with("http://") && !value.starts_with("https://") {
                    return Err(PluginHubError::ConfigValue {
                        key: key.to_string(),
                        message: "must be an http(s) URL".to_string(),
                    });
                }
                self.plugin.registry_url = value.to_string();
            }
            "plugin.app_version" => {
                crate::plugin::version::parse_version(value).map_err(|e| {
                    PluginHubError::ConfigValue {
                        key: key.to_string(),
                        message: e.to_string(),
                    }
                })?;
                self.plugin.app_version = value.to_string();
            }
            "plugin.fetch_timeout_secs" => {
                let secs: u64 = value.parse().map_err(|_| PluginHubError::ConfigValue {
                    key: key.to_string(),
                    message: format!("expected a number of seconds, got '{}'", value),
                })?;
                if secs == 0 {
                    return Err(PluginHubError::ConfigValue {
                        key: key.to_string(),
                        message: "timeout must be greater than zero".to_string(),
                    });
                }
                self.plugin.fetch_timeout_secs = secs;
            }
            _ => {
                return Err(PluginHubError::ConfigKeyNotFound {
                    key: key.to_string(),
                })
            }
        }
        Ok(())
    }

    /// List all config keys with their current values
    pub fn list(&self) -> Vec<(String, String)> {
        [
            "plugin.enabled",
            "plugin.registry_url",
            "plugin.app_version",
            "plugin.fetch_timeout_secs",
        ]
        .iter()
        .filter_map(|key| self.get(key).map(|value| (key.to_string(), value)))
        .collect()
    }
}
