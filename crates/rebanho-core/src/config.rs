//! Application configuration management.
//!
//! Holds the database location, the log directory, the default campus for
//! imported members, and the ELEVE scoring policy.
//!
//! Configuration is stored at `~/.config/rebanho/config.json`. The
//! `REBANHO_DATABASE` environment variable overrides the database path.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::eleve::ScoringPolicy;

/// Application name used for config/data directory paths
const APP_NAME: &str = "rebanho";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DATABASE_FILE: &str = "rebanho.db";

pub const DATABASE_ENV: &str = "REBANHO_DATABASE";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// Campus assigned to imported members that carry none.
    #[serde(default)]
    pub campus: Option<String>,
    #[serde(default)]
    pub scoring: ScoringPolicy,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        if let Ok(db) = std::env::var(DATABASE_ENV) {
            if !db.trim().is_empty() {
                debug!(path = %db, "Database path overridden from environment");
                config.database_path = Some(PathBuf::from(db));
            }
        }
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Location of the config file.
    pub fn path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    fn data_dir() -> Result<PathBuf> {
        let data_dir =
            dirs::data_dir().ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join(DATABASE_FILE)),
        }
    }

    pub fn log_dir(&self) -> Result<PathBuf> {
        match &self.log_dir {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join("logs")),
        }
    }
}
