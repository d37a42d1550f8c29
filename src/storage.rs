//! Remembered-credential storage.
//!
//! Storage is best-effort, never authoritative: every caller treats a
//! [`StoreError`] as "not remembered" and carries on. The trait is
//! synchronous because both backends are tiny and local; it is `Send + Sync`
//! so the debounced writer can call it from a spawned task.

use crate::config::API_KEY_STORAGE_KEY;
use crate::error::StoreError;
use keystore::KeyStore;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Directory name used under the platform config dir.
pub const STORE_APP_NAME: &str = "cv-formatter";

/// Persistent home of the remembered credential.
pub trait CredentialStore: Send + Sync {
    /// `Ok(None)` when nothing is stored.
    fn load(&self) -> Result<Option<String>, StoreError>;
    fn save(&self, credential: &str) -> Result<(), StoreError>;
    /// Removing an absent credential succeeds.
    fn remove(&self) -> Result<(), StoreError>;
}

/// Apply the remember rule: store when remembering a non-empty value,
/// otherwise remove whatever is stored.
///
/// Returns whether a credential is stored afterwards. Failures are logged
/// and reported as "not stored".
pub fn persist(store: &dyn CredentialStore, remember: bool, credential: &str) -> bool {
    if remember && !credential.is_empty() {
        match store.save(credential) {
            Ok(()) => {
                debug!("Credential remembered");
                true
            }
            Err(e) => {
                warn!("Could not save API key: {e}");
                false
            }
        }
    } else {
        if let Err(e) = store.remove() {
            warn!("Could not remove saved API key: {e}");
        }
        false
    }
}

// ── KeyStore backend ────────────────────────────────────────────────────────

/// [`CredentialStore`] backed by the user's on-disk [`KeyStore`].
#[derive(Debug)]
pub struct KeyStoreCredentials {
    store: KeyStore,
}

impl KeyStoreCredentials {
    /// Open the default per-user store.
    pub fn open() -> Result<Self, StoreError> {
        Ok(Self {
            store: KeyStore::open(STORE_APP_NAME)?,
        })
    }

    pub fn new(store: KeyStore) -> Self {
        Self { store }
    }
}

impl CredentialStore for KeyStoreCredentials {
    fn load(&self) -> Result<Option<String>, StoreError> {
        Ok(self.store.get(API_KEY_STORAGE_KEY)?)
    }

    fn save(&self, credential: &str) -> Result<(), StoreError> {
        Ok(self.store.set(API_KEY_STORAGE_KEY, credential)?)
    }

    fn remove(&self) -> Result<(), StoreError> {
        self.store.remove(API_KEY_STORAGE_KEY)?;
        Ok(())
    }
}

// ── In-memory backend ───────────────────────────────────────────────────────

/// Process-local [`CredentialStore`].
///
/// Counts successful writes and can be switched into a failing mode, which
/// makes it the test double for "storage is unavailable".
#[derive(Debug, Default)]
pub struct MemoryCredentials {
    value: Mutex<Option<String>>,
    saves: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(credential: impl Into<String>) -> Self {
        Self {
            value: Mutex::new(Some(credential.into())),
            ..Self::default()
        }
    }

    /// Make every operation fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Successful `save` calls so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Current value, bypassing the failure switch.
    pub fn peek(&self) -> Option<String> {
        self.slot().clone()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.value.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("storage disabled".into()))
        } else {
            Ok(())
        }
    }
}

impl CredentialStore for MemoryCredentials {
    fn load(&self) -> Result<Option<String>, StoreError> {
        self.check()?;
        Ok(self.slot().clone())
    }

    fn save(&self, credential: &str) -> Result<(), StoreError> {
        self.check()?;
        *self.slot() = Some(credential.to_string());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self) -> Result<(), StoreError> {
        self.check()?;
        *self.slot() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persist_stores_only_when_remembering_non_empty() {
        let store = MemoryCredentials::new();
        assert!(persist(&store, true, "sk-1"));
        assert_eq!(store.peek().as_deref(), Some("sk-1"));

        assert!(!persist(&store, true, ""));
        assert_eq!(store.peek(), None);

        store.save("sk-2").unwrap();
        assert!(!persist(&store, false, "sk-2"));
        assert_eq!(store.peek(), None);
    }

    #[test]
    fn persist_swallows_failures() {
        let store = MemoryCredentials::with_value("old");
        store.set_failing(true);
        assert!(!persist(&store, true, "new"));
        assert!(!persist(&store, false, ""));
        assert_eq!(store.peek().as_deref(), Some("old"));
    }

    #[test]
    fn keystore_backend_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let creds = KeyStoreCredentials::new(KeyStore::at(dir.path().join("store.json")));

        assert_eq!(creds.load().unwrap(), None);
        creds.save("sk-abc").unwrap();
        assert_eq!(creds.load().unwrap().as_deref(), Some("sk-abc"));
        creds.remove().unwrap();
        creds.remove().unwrap();
        assert_eq!(creds.load().unwrap(), None);
    }

    #[test]
    fn keystore_backend_uses_documented_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        KeyStoreCredentials::new(KeyStore::at(&path)).save("sk-abc").unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json[API_KEY_STORAGE_KEY], "sk-abc");
    }
}
