use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct PermissionConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,
    #[serde(default = "default_database_busy_timeout_ms")]
    pub database_busy_timeout_ms: u64,
    #[serde(default = "default_notification_channel_capacity")]
    pub notification_channel_capacity: usize,
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            database_max_connections: default_database_max_connections(),
            database_busy_timeout_ms: default_database_busy_timeout_ms(),
            notification_channel_capacity: default_notification_channel_capacity(),
        }
    }
}

impl PermissionConfig {
    const CONFIG_ENV: &'static str = "BARFFINE_PERMISSION_CONFIG_FILE";
    const DATABASE_PATH_ENV: &'static str = "BARFFINE_PERMISSION_DATABASE_PATH";
    const DATABASE_MAX_CONNECTIONS_ENV: &'static str =
        "BARFFINE_PERMISSION_DATABASE_MAX_CONNECTIONS";
    const DATABASE_BUSY_TIMEOUT_ENV: &'static str =
        "BARFFINE_PERMISSION_DATABASE_BUSY_TIMEOUT_MS";
    const DEFAULT_CONFIG_FILE: &'static str = "barffine-permission.toml";

    /// Load configuration from defaults layered with an optional config file
    /// and environment variables.
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    pub fn load_with(config_path: Option<PathBuf>) -> Result<Self> {
        let mut config = match Self::resolve_config_path(config_path)? {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        if let Ok(path) = env::var(Self::DATABASE_PATH_ENV) {
            config.database_path = path;
        }

        if let Ok(value) = env::var(Self::DATABASE_MAX_CONNECTIONS_ENV) {
            config.database_max_connections = value.parse().with_context(|| {
                format!("invalid {name}", name = Self::DATABASE_MAX_CONNECTIONS_ENV)
            })?;
        }

        if let Ok(value) = env::var(Self::DATABASE_BUSY_TIMEOUT_ENV) {
            config.database_busy_timeout_ms = value.parse().with_context(|| {
                format!("invalid {name}", name = Self::DATABASE_BUSY_TIMEOUT_ENV)
            })?;
        }

        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("invalid permission config")
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_toml(&contents).with_context(|| format!("in {}", path.display()))
    }

    fn resolve_config_path(explicit: Option<PathBuf>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            return Self::validate_path(path);
        }

        if let Ok(path) = env::var(Self::CONFIG_ENV) {
            return Self::validate_path(PathBuf::from(path));
        }

        let candidate = PathBuf::from(Self::DEFAULT_CONFIG_FILE);
        Ok(candidate.exists().then_some(candidate))
    }

    fn validate_path(path: PathBuf) -> Result<Option<PathBuf>> {
        if path.exists() {
            Ok(Some(path))
        } else {
            Err(anyhow!(
                "configuration file does not exist: {}",
                path.display()
            ))
        }
    }
}

fn default_database_path() -> String {
    "./data/barffine-permission.db".to_owned()
}

fn default_database_max_connections() -> u32 {
    4
}

fn default_database_busy_timeout_ms() -> u64 {
    5_000
}

fn default_notification_channel_capacity() -> usize {
    256
}
