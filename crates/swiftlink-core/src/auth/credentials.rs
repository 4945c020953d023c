//! Credential storage.
//!
//! The access token lives only in process memory. The refresh token is
//! written through to a `DurableStore` (OS keychain by default) under a
//! single well-known key, so a later run can resume the session.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use anyhow::{Context, Result};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::session::Session;
use crate::config::{CredentialBackend, APP_NAME};
use crate::models::TokenPair;

/// Keychain account name the refresh token is stored under.
const KEYRING_ACCOUNT: &str = "refresh_token";

/// Session file name in the config directory
const SESSION_FILE: &str = "session.json";

/// An opaque bearer token. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl From<&str> for Credential {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for Credential {
    fn from(token: String) -> Self {
        Self(token)
    }
}

/// Persistent slot for the refresh token. Holds at most one value.
pub trait DurableStore: Send + Sync {
    fn load(&self) -> Result<Option<String>>;
    fn save(&self, value: &str) -> Result<()>;
    /// Removing an absent value is not an error.
    fn remove(&self) -> Result<()>;
}

/// Refresh token in the OS keychain.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service, KEYRING_ACCOUNT).context("Failed to create keyring entry")
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new(APP_NAME)
    }
}

impl DurableStore for KeyringStore {
    fn load(&self) -> Result<Option<String>> {
        match self.entry()?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve refresh token from keychain"),
        }
    }

    fn save(&self, value: &str) -> Result<()> {
        self.entry()?
            .set_password(value)
            .context("Failed to store refresh token in keychain")
    }

    fn remove(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete refresh token from keychain"),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionFile {
    refresh_token: String,
}

/// Refresh token in a small JSON file, for systems without a keychain.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self::new(dir.into().join(SESSION_FILE))
    }
}

impl DurableStore for FileStore {
    fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents =
            std::fs::read_to_string(&self.path).context("Failed to read session file")?;
        let file: SessionFile =
            serde_json::from_str(&contents).context("Failed to parse session file")?;
        Ok(Some(file.refresh_token))
    }

    fn save(&self, value: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&SessionFile {
            refresh_token: value.to_string(),
        })?;
        std::fs::write(&self.path, contents).context("Failed to write session file")
    }

    fn remove(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).context("Failed to remove session file")?;
        }
        Ok(())
    }
}

/// In-memory slot. Clones share the same value.
#[derive(Clone, Default)]
pub struct MemoryStore {
    value: Arc<Mutex<Option<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current raw contents, as the durable layer sees them.
    pub fn peek(&self) -> Option<String> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl DurableStore for MemoryStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.peek())
    }

    fn save(&self, value: &str) -> Result<()> {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(value.to_string());
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// Access token in memory, refresh token written through to durable storage.
///
/// Reads never fail: a durable backend error is logged and reported as an
/// absent value. `clear` removes both under the same lock, so no reader can
/// observe one without the other.
///
/// Durable reads and writes are blocking calls made while that lock is held.
/// Call them from `spawn_blocking` when the store sits behind a busy runtime;
/// `RenewalCoordinator` does so for the refresh token lookup.
pub struct CredentialStore {
    short: RwLock<Option<Credential>>,
    durable: Box<dyn DurableStore>,
}

impl CredentialStore {
    pub fn new(durable: impl DurableStore + 'static) -> Self {
        Self {
            short: RwLock::new(None),
            durable: Box::new(durable),
        }
    }

    /// Store backed by process memory only.
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    /// Open the durable backend selected in configuration.
    pub fn open(backend: CredentialBackend) -> Result<Self> {
        let store = match backend {
            CredentialBackend::Keyring => Self::new(KeyringStore::default()),
            CredentialBackend::File => {
                Self::new(FileStore::in_dir(crate::config::Config::config_dir()?))
            }
            CredentialBackend::Memory => Self::in_memory(),
        };
        debug!(?backend, "Credential store opened");
        Ok(store)
    }

    pub fn short(&self) -> Option<Credential> {
        self.short
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_short(&self, credential: Credential) {
        *self.short.write().unwrap_or_else(PoisonError::into_inner) = Some(credential);
    }

    pub fn long(&self) -> Option<Credential> {
        let _guard = self.short.read().unwrap_or_else(PoisonError::into_inner);
        self.load_long()
    }

    pub fn set_long(&self, credential: Credential) {
        let _guard = self.short.write().unwrap_or_else(PoisonError::into_inner);
        self.save_long(&credential);
    }

    /// Replace both credentials in one step.
    pub fn set_pair(&self, pair: TokenPair) {
        let mut short = self.short.write().unwrap_or_else(PoisonError::into_inner);
        self.save_long(&pair.refresh_token);
        *short = Some(pair.access_token);
    }

    /// Forget both credentials. Idempotent.
    pub fn clear(&self) {
        let mut short = self.short.write().unwrap_or_else(PoisonError::into_inner);
        *short = None;
        if let Err(e) = self.durable.remove() {
            warn!(error = %e, "Failed to remove refresh token from durable storage");
        }
    }

    /// Identity decoded from the current access token, if there is one.
    pub fn session(&self) -> Option<Session> {
        self.short
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Session::decode)
    }

    fn load_long(&self) -> Option<Credential> {
        match self.durable.load() {
            Ok(token) => token.filter(|t| !t.is_empty()).map(Credential::from),
            Err(e) => {
                warn!(error = %e, "Failed to read refresh token, treating as absent");
                None
            }
        }
    }

    fn save_long(&self, credential: &Credential) {
        if let Err(e) = self.durable.save(credential.expose()) {
            warn!(error = %e, "Failed to persist refresh token");
        }
    }
}
