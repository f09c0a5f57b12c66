//! Library configuration management.
//!
//! This module handles loading and saving the configuration, which
//! includes an optional pre-supplied auth token and the last used
//! account email.
//!
//! Configuration is stored at `~/.config/clientlogin/config.json`.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for the config directory path
const APP_NAME: &str = "clientlogin";

/// Config file name
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub authentication: AuthSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthSettings {
    /// Pre-supplied token. When set, the auth handler uses it verbatim
    /// and never contacts the login endpoint.
    pub auth_token: Option<String>,
    /// Last account email used to log in
    pub email: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&contents)?)
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

    /// Read a value by its dotted key, e.g. `authentication.auth_token`.
    /// Unknown keys read as absent.
    pub fn read(&self, key: &str) -> Option<String> {
        match key {
            "authentication.auth_token" => self.authentication.auth_token.clone(),
            "authentication.email" => self.authentication.email.clone(),
            _ => None,
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }
}
