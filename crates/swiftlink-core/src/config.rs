//! Client configuration management.
//!
//! Configuration is stored at `~/.config/swiftlink/config.json`. Every field
//! has a default, so a missing or partial file is fine. A handful of
//! environment variables override the file so scripts and `.env` files can
//! point the client somewhere else without touching it.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Application name used for config directory paths
pub const APP_NAME: &str = "swiftlink";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default backend location, matching a locally running API server.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api/v1";

/// Default origin used to build shareable `/r/{code}` links.
pub const DEFAULT_PUBLIC_URL: &str = "http://localhost:8080";

/// Error code the backend uses to say the access token has expired.
pub const DEFAULT_EXPIRED_CODE: &str = "TOKEN_EXPIRED";

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for a CLI.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Upper bound on a single renewal exchange. Every queued caller waits on it.
const DEFAULT_RENEWAL_TIMEOUT_SECS: u64 = 30;

const ENV_API_URL: &str = "SWIFTLINK_API_URL";
const ENV_PUBLIC_URL: &str = "SWIFTLINK_PUBLIC_URL";
const ENV_CREDENTIAL_BACKEND: &str = "SWIFTLINK_CREDENTIAL_BACKEND";

/// Where the long-lived credential is persisted between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    /// OS keychain via the `keyring` crate
    #[default]
    Keyring,
    /// `session.json` next to the config file
    File,
    /// Process memory only; nothing survives a restart
    Memory,
}

impl std::str::FromStr for CredentialBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyring" => Ok(Self::Keyring),
            "file" => Ok(Self::File),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow::anyhow!("Unknown credential backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub public_url: String,
    pub request_timeout_secs: u64,
    /// `0` disables the renewal timeout.
    pub renewal_timeout_secs: u64,
    pub expired_code: String,
    pub credential_backend: CredentialBackend,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            public_url: DEFAULT_PUBLIC_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            renewal_timeout_secs: DEFAULT_RENEWAL_TIMEOUT_SECS,
            expired_code: DEFAULT_EXPIRED_CODE.to_string(),
            credential_backend: CredentialBackend::default(),
            last_email: None,
        }
    }
}

impl Config {
    /// Load the config file (or defaults) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
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

    fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.is_empty()) {
            self.api_base_url = url;
        }
        if let Some(url) = lookup(ENV_PUBLIC_URL).filter(|v| !v.is_empty()) {
            self.public_url = url;
        }
        if let Some(backend) = lookup(ENV_CREDENTIAL_BACKEND) {
            match backend.parse() {
                Ok(backend) => self.credential_backend = backend,
                Err(e) => warn!(error = %e, "Ignoring {}", ENV_CREDENTIAL_BACKEND),
            }
        }
    }

    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME))
    }

    /// Base URL with any trailing slash removed, ready for path joins.
    pub fn base_url(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn renewal_timeout(&self) -> Option<Duration> {
        (self.renewal_timeout_secs > 0).then(|| Duration::from_secs(self.renewal_timeout_secs))
    }
}
