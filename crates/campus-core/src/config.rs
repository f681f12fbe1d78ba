//! Application configuration management.
//!
//! This module handles loading and saving the client configuration,
//! which includes the API base URL, the credential backend, and the last
//! used username.
//!
//! Configuration is stored at `~/.config/campus-portal/config.json`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::api::endpoints::DEFAULT_API_BASE_URL;
use crate::api::Endpoints;
use crate::auth::{CredentialStore, FileCredentialStore, KeyringCredentialStore, MemoryCredentialStore};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "campus-portal";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Overrides `api_base_url` from the config file
pub const BASE_URL_ENV: &str = "CAMPUS_API_BASE_URL";

/// When set, the session file is sealed with this passphrase
pub const SESSION_PASSPHRASE_ENV: &str = "CAMPUS_SESSION_PASSPHRASE";

/// Where the session credentials are kept between runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    Keyring,
    #[default]
    File,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_base_url: Option<String>,
    /// Transport-level timeout; no timeout when unset
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub credential_backend: CredentialBackend,
    pub last_username: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
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

    /// Environment first, then the config file, then the built-in default.
    pub fn api_base_url(&self) -> String {
        std::env::var(BASE_URL_ENV)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.api_base_url.clone())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints::new(self.api_base_url())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Build the credential store selected by `credential_backend`.
    pub fn credential_store(&self) -> Result<Arc<dyn CredentialStore>> {
        Ok(match self.credential_backend {
            CredentialBackend::Keyring => Arc::new(KeyringCredentialStore::open_default()?),
            CredentialBackend::Memory => Arc::new(MemoryCredentialStore::new()),
            CredentialBackend::File => {
                let store = FileCredentialStore::new(self.cache_dir()?);
                match std::env::var(SESSION_PASSPHRASE_ENV) {
                    Ok(passphrase) if !passphrase.is_empty() => {
                        Arc::new(store.with_passphrase(passphrase))
                    }
                    _ => Arc::new(store),
                }
            }
        })
    }
}
