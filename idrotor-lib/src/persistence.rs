//! Preference persistence abstraction.
//!
//! The rotation core does not own any storage. Hosts hand it a
//! [`PreferenceStore`] backed by whatever the platform offers:
//!
//! - **iOS**: `UserDefaults` or Keychain (implemented in Swift)
//! - **Android**: `SharedPreferences` (implemented in Kotlin)
//! - **Tests**: [`InMemoryPreferenceStore`]

use crate::{IdRotorError, Result};
use std::collections::HashMap;
use std::sync::RwLock;

/// Key-value preference storage provided by the host.
///
/// # Thread Safety
///
/// Implementations must be thread-safe (Send + Sync).
pub trait PreferenceStore: Send + Sync {
    /// Store a value under `key`, replacing any previous value.
    fn store(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Retrieve the value stored under `key`, or None if absent.
    fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Delete the value under `key`.
    ///
    /// Returns an error only on platform errors (not if key doesn't exist).
    fn delete(&self, key: &str) -> Result<()>;

    /// Check if a key exists.
    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.retrieve(key)?.is_some())
    }
}

/// Convenience functions for storing strings.
pub trait PreferenceStoreExt: PreferenceStore {
    /// Store a string.
    fn store_string(&self, key: &str, value: &str) -> Result<()> {
        self.store(key, value.as_bytes())
    }

    /// Retrieve a string.
    fn retrieve_string(&self, key: &str) -> Result<Option<String>> {
        match self.retrieve(key)? {
            Some(bytes) => {
                let string =
                    String::from_utf8(bytes).map_err(|e| IdRotorError::Storage(e.to_string()))?;
                Ok(Some(string))
            }
            None => Ok(None),
        }
    }
}

impl<T: PreferenceStore + ?Sized> PreferenceStoreExt for T {}

/// In-memory preference store.
///
/// Nothing survives the process. Meant for tests and for hosts that opt out
/// of persistence.
#[derive(Default)]
pub struct InMemoryPreferenceStore {
    data: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryPreferenceStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for InMemoryPreferenceStore {
    fn store(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut data = self
            .data
            .write()
            .map_err(|_| IdRotorError::Storage("lock poisoned".into()))?;
        data.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let data = self
            .data
            .read()
            .map_err(|_| IdRotorError::Storage("lock poisoned".into()))?;
        Ok(data.get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut data = self
            .data
            .write()
            .map_err(|_| IdRotorError::Storage("lock poisoned".into()))?;
        data.remove(key);
        Ok(())
    }
}
