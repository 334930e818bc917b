use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PluginHubError {
    #[error("Plugin not found: {id}")]
    NotFound { id: String },

    #[error("Plugin already installed: {id}")]
    AlreadyInstalled { id: String },

    #[error("Plugin not installed: {id}")]
    NotInstalled { id: String },

    #[error("No new version available for {id} (installed {installed}, registry {available})")]
    NoNewVersion {
        id: String,
        installed: String,
        available: String,
    },

    #[error("Param '{field}' is not a valid JSON string: {message}")]
    InvalidJson { field: String, message: String },

    #[error("Invalid semantic version '{version}': {message}")]
    VersionParse { version: String, message: String },

    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Failed to parse {url}: {message}")]
    Parse { url: String, message: String },

    #[error("Storage error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Failed to parse config file {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("Unknown config key: {key}")]
    ConfigKeyNotFound { key: String },

    #[error("Invalid value for {key}: {message}")]
    ConfigValue { key: String, message: String },

    #[error("Home directory not found")]
    HomeNotFound,
}

pub type Result<T> = std::result::Result<T, PluginHubError>;

/// Status + message pair handed back to the administrative caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub msg: String,
}

impl PluginHubError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound { .. } => 2,
            Self::AlreadyInstalled { .. } => 3,
            Self::NotInstalled { .. } => 4,
            Self::NoNewVersion { .. } => 5,
            Self::InvalidJson { .. } => 6,
            Self::Fetch { .. } | Self::Parse { .. } => 7,
            _ => 1,
        }
    }

    /// HTTP-style status for the error: caller mistakes are 400, everything else 500.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. }
            | Self::AlreadyInstalled { .. }
            | Self::NotInstalled { .. }
            | Self::NoNewVersion { .. }
            | Self::InvalidJson { .. }
            | Self::VersionParse { .. }
            | Self::ConfigKeyNotFound { .. }
            | Self::ConfigValue { .. } => 400,
            _ => 500,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            status: self.status_code(),
            msg: self.to_string(),
        }
    }

    pub(crate) fn persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}
