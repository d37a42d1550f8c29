//! # keystore
//!
//! A tiny persistent key/value store scoped to the current user, for the
//! handful of small strings a desktop or CLI tool wants to remember between
//! runs (a saved API key, a last-used server URL, …).
//!
//! ## How it works
//!
//! Every store is one JSON object on disk:
//!
//! ```text
//! {
//!   "cv_formatter_api_key": "sk-…"
//! }
//! ```
//!
//! 1. Reads parse the whole file; a missing file is an empty store.
//! 2. Writes rewrite the whole file through `store.json.tmp` + rename, so a
//!    crash mid-write never leaves a truncated store behind.
//! 3. On unix the file is created with mode `0600`; values are often secrets.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use keystore::KeyStore;
//!
//! let store = KeyStore::open("cv-formatter").expect("store dir unavailable");
//! store.set("greeting", "hello").unwrap();
//! assert_eq!(store.get("greeting").unwrap().as_deref(), Some("hello"));
//! store.remove("greeting").unwrap();
//! ```
//!
//! ## Location
//!
//! | OS      | Default file                                          |
//! |---------|-------------------------------------------------------|
//! | Linux   | `~/.config/{app}/store.json`                          |
//! | macOS   | `~/Library/Application Support/{app}/store.json`      |
//! | Windows | `%APPDATA%\{app}\store.json`                          |
//!
//! ## Environment variable overrides
//!
//! - `KEYSTORE_DIR` — directory that holds `{app}/store.json` instead of the
//!   platform config directory.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// File name of the backing store inside the app directory.
pub const STORE_FILE_NAME: &str = "store.json";

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by keystore operations.
#[derive(Error, Debug)]
pub enum KeyStoreError {
    /// Could not create the directory that holds the store.
    #[error("Store directory error for '{path}': {source}")]
    Dir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading or writing the store file failed.
    #[error("Store I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The store file exists but is not a JSON object of strings.
    #[error("Store file '{path}' is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, KeyStoreError>;

// ── Location ─────────────────────────────────────────────────────────────────

/// Returns the directory holding the store for `app`.
///
/// - **Linux**: `~/.config/{app}/`
/// - **macOS**: `~/Library/Application Support/{app}/`
/// - **Windows**: `%APPDATA%\{app}\`
///
/// Override the parent directory by setting `KEYSTORE_DIR`.
pub fn store_dir(app: &str) -> PathBuf {
    if let Ok(override_dir) = std::env::var("KEYSTORE_DIR") {
        return PathBuf::from(override_dir).join(app);
    }

    let base = dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .unwrap_or_else(std::env::temp_dir);

    base.join(app)
}

// ── Store ────────────────────────────────────────────────────────────────────

/// A JSON-file-backed string map.
///
/// Operations are serialised within the process by an internal lock, so a
/// `KeyStore` can be shared behind an `Arc` between tasks.
#[derive(Debug)]
pub struct KeyStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl KeyStore {
    /// Open the default store for `app`, creating its directory if needed.
    ///
    /// The file itself is created lazily on the first write.
    pub fn open(app: &str) -> Result<Self> {
        let dir = store_dir(app);
        fs::create_dir_all(&dir).map_err(|source| KeyStoreError::Dir {
            path: dir.clone(),
            source,
        })?;
        Ok(Self::at(dir.join(STORE_FILE_NAME)))
    }

    /// Use an explicit file path. The parent directory must exist by the
    /// time of the first write.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a value. A missing key or a missing file yields `Ok(None)`.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.read_map()?.remove(key))
    }

    /// Insert or replace a value.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    /// Remove a value. Returns whether the key was present.
    ///
    /// Removing an absent key does not touch the file.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut map = self.read_map()?;
        if map.remove(key).is_none() {
            return Ok(false);
        }
        self.write_map(&map)?;
        Ok(true)
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(KeyStoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(BTreeMap::new());
        }
        serde_json::from_slice(&raw).map_err(|source| KeyStoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<()> {
        let io_err = |source: std::io::Error| KeyStoreError::Io {
            path: self.path.clone(),
            source,
        };

        let body = serde_json::to_vec_pretty(map).map_err(|source| KeyStoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = open_private(&tmp_path).map_err(io_err)?;
            file.write_all(&body).map_err(io_err)?;
            file.sync_all().map_err(io_err)?;
        }
        fs::rename(&tmp_path, &self.path).map_err(io_err)
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, KeyStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyStore::at(dir.path().join(STORE_FILE_NAME));
        (dir, store)
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let (_dir, store) = temp_store();
        assert_eq!(store.get("anything").unwrap(), None);
        assert!(!store.path().exists());
    }

    #[test]
    fn set_then_get() {
        let (_dir, store) = temp_store();
        store.set("k", "v1").unwrap();
        store.set("k", "v2").unwrap();
        store.set("other", "x").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v2"));
        assert_eq!(store.get("other").unwrap().as_deref(), Some("x"));
    }

    #[test]
    fn remove_is_idempotent() {
        let (_dir, store) = temp_store();
        store.set("k", "v").unwrap();
        assert!(store.remove("k").unwrap());
        assert!(!store.remove("k").unwrap());
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn corrupt_file_is_reported() {
        let (_dir, store) = temp_store();
        std::fs::write(store.path(), b"not json").unwrap();
        let err = store.get("k").unwrap_err();
        assert!(matches!(err, KeyStoreError::Corrupt { .. }), "got: {err}");
    }

    #[test]
    fn blank_file_reads_as_empty() {
        let (_dir, store) = temp_store();
        std::fs::write(store.path(), b"  \n").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn no_tmp_file_left_behind() {
        let (dir, store) = temp_store();
        store.set("k", "v").unwrap();
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from(STORE_FILE_NAME)]);
    }

    #[cfg(unix)]
    #[test]
    fn file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let (_dir, store) = temp_store();
        store.set("k", "secret").unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn store_dir_override_via_env() {
        std::env::set_var("KEYSTORE_DIR", "/tmp/test_keystore_override");
        let d = store_dir("cv-formatter");
        std::env::remove_var("KEYSTORE_DIR");
        assert_eq!(d, PathBuf::from("/tmp/test_keystore_override/cv-formatter"));
    }
}
