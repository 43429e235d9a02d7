//! Local key-value storage for bearer tokens.
//!
//! Each role keeps its token under its own key (see `Role::storage_key`).
//! Three backends are provided: a JSON file in the user's data directory,
//! the OS keychain, and an in-memory map.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Token file name in the data directory
const TOKEN_FILE: &str = "tokens.json";

/// Keychain service name
const KEYRING_SERVICE: &str = "helpalign";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Token store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Token store is corrupt: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Keychain access failed: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Persistent storage for opaque bearer tokens.
pub trait TokenStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, token: &str) -> Result<(), StoreError>;

    /// Removing a key that is not present succeeds.
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// When the token under `key` was written, if the backend records it.
    fn stored_at(&self, _key: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(None)
    }
}

// ============================================================================
// File store
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredToken {
    token: String,
    stored_at: DateTime<Utc>,
}

/// Tokens kept in a single JSON file, keyed by storage key.
pub struct FileTokenStore {
    path: PathBuf,
    // Both roles share the file; serialize read-modify-write cycles.
    lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(TOKEN_FILE),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn load(&self) -> Result<HashMap<String, StoredToken>, StoreError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(HashMap::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, tokens: &HashMap<String, StoredToken>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(tokens)?;
        std::fs::write(&self.path, contents)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.guard();
        Ok(self.load()?.remove(key).map(|t| t.token))
    }

    fn set(&self, key: &str, token: &str) -> Result<(), StoreError> {
        let _guard = self.guard();
        let mut tokens = self.load()?;
        tokens.insert(
            key.to_string(),
            StoredToken {
                token: token.to_string(),
                stored_at: Utc::now(),
            },
        );
        self.save(&tokens)?;
        debug!(key, path = ?self.path, "Token saved");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.guard();
        let mut tokens = self.load()?;
        if tokens.remove(key).is_some() {
            self.save(&tokens)?;
            debug!(key, "Token removed");
        }
        Ok(())
    }

    fn stored_at(&self, key: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        let _guard = self.guard();
        Ok(self.load()?.get(key).map(|t| t.stored_at))
    }
}

// ============================================================================
// Keychain store
// ============================================================================

/// Tokens kept in the OS keychain, one entry per storage key.
pub struct KeyringTokenStore {
    service: String,
}

impl KeyringTokenStore {
    pub fn new() -> Self {
        Self::with_service(KEYRING_SERVICE)
    }

    pub fn with_service(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StoreError> {
        Ok(Entry::new(&self.service, key)?)
    }
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore for KeyringTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.entry(key)?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, token: &str) -> Result<(), StoreError> {
        self.entry(key)?.set_password(token)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens<I, K, V>(tokens: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            tokens: Mutex::new(
                tokens
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.tokens.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.guard().get(key).cloned())
    }

    fn set(&self, key: &str, token: &str) -> Result<(), StoreError> {
        self.guard().insert(key.to_string(), token.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.guard().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_set_get_remove() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.get("HA-patienttoken").unwrap(), None);

        store.set("HA-patienttoken", "abc").unwrap();
        assert_eq!(store.get("HA-patienttoken").unwrap().as_deref(), Some("abc"));

        store.remove("HA-patienttoken").unwrap();
        assert_eq!(store.get("HA-patienttoken").unwrap(), None);

        // Removing again is fine
        store.remove("HA-patienttoken").unwrap();
    }

    #[test]
    fn test_memory_store_keys_are_independent() {
        let store = MemoryTokenStore::with_tokens([
            ("HA-patienttoken", "p"),
            ("HA-providertoken", "q"),
        ]);
        store.remove("HA-providertoken").unwrap();
        assert_eq!(store.get("HA-patienttoken").unwrap().as_deref(), Some("p"));
        assert_eq!(store.get("HA-providertoken").unwrap(), None);
        assert_eq!(store.stored_at("HA-patienttoken").unwrap(), None);
    }
}
