//! Host-provided preference storage.
//!
//! Swift implements [`PreferenceStoreFFI`] on top of `UserDefaults` (Kotlin on
//! `SharedPreferences`) and [`PreferenceStoreBridge`] adapts it to the core
//! [`PreferenceStore`] trait, so the rotator can persist the current
//! identifier across launches.
//!
//! ```text
//!   IdentifierStore ──► PreferenceStore ──► PreferenceStoreBridge
//!                                                  │
//!                                                  ▼
//!                                  PreferenceStoreFFI (Swift / Kotlin)
//! ```

use crate::IdRotorMobileError;
use idrotor_lib::persistence::PreferenceStore;
use idrotor_lib::IdRotorError;
use std::sync::Arc;

/// Key-value preferences implemented by the host application.
#[uniffi::export(callback_interface)]
pub trait PreferenceStoreFFI: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    fn store(&self, key: String, value: String) -> Result<(), IdRotorMobileError>;

    /// Read the value under `key`, or None if nothing is stored.
    fn retrieve(&self, key: String) -> Result<Option<String>, IdRotorMobileError>;

    /// Remove the value under `key`. Removing a missing key is not an error.
    fn delete(&self, key: String) -> Result<(), IdRotorMobileError>;
}

/// Adapts a [`PreferenceStoreFFI`] to the core [`PreferenceStore`] trait.
pub struct PreferenceStoreBridge {
    ffi: Arc<dyn PreferenceStoreFFI>,
}

impl PreferenceStoreBridge {
    /// Create a new bridge wrapping an FFI store.
    pub fn new(ffi: Arc<dyn PreferenceStoreFFI>) -> Self {
        Self { ffi }
    }
}

impl std::fmt::Debug for PreferenceStoreBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreferenceStoreBridge")
            .field("ffi", &"<PreferenceStoreFFI>")
            .finish()
    }
}

fn storage_error(err: IdRotorMobileError) -> IdRotorError {
    IdRotorError::Storage(err.to_string())
}

impl PreferenceStore for PreferenceStoreBridge {
    fn store(&self, key: &str, value: &[u8]) -> idrotor_lib::Result<()> {
        let value = std::str::from_utf8(value)
            .map_err(|e| IdRotorError::Storage(format!("non-UTF-8 preference value: {e}")))?;
        self.ffi
            .store(key.to_string(), value.to_string())
            .map_err(storage_error)
    }

    fn retrieve(&self, key: &str) -> idrotor_lib::Result<Option<Vec<u8>>> {
        let value = self.ffi.retrieve(key.to_string()).map_err(storage_error)?;
        Ok(value.map(String::into_bytes))
    }

    fn delete(&self, key: &str) -> idrotor_lib::Result<()> {
        self.ffi.delete(key.to_string()).map_err(storage_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idrotor_lib::persistence::PreferenceStoreExt;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct DictionaryStore {
        values: Mutex<HashMap<String, String>>,
    }

    impl PreferenceStoreFFI for DictionaryStore {
        fn store(&self, key: String, value: String) -> Result<(), IdRotorMobileError> {
            self.values.lock().unwrap().insert(key, value);
            Ok(())
        }

        fn retrieve(&self, key: String) -> Result<Option<String>, IdRotorMobileError> {
            Ok(self.values.lock().unwrap().get(&key).cloned())
        }

        fn delete(&self, key: String) -> Result<(), IdRotorMobileError> {
            self.values.lock().unwrap().remove(&key);
            Ok(())
        }
    }

    struct LockedStore;

    impl PreferenceStoreFFI for LockedStore {
        fn store(&self, _key: String, _value: String) -> Result<(), IdRotorMobileError> {
            Err(IdRotorMobileError::Storage {
                msg: "device locked".to_string(),
            })
        }

        fn retrieve(&self, _key: String) -> Result<Option<String>, IdRotorMobileError> {
            Ok(None)
        }

        fn delete(&self, _key: String) -> Result<(), IdRotorMobileError> {
            Ok(())
        }
    }

    #[test]
    fn test_bridge_round_trips_strings() {
        let bridge = PreferenceStoreBridge::new(Arc::new(DictionaryStore::default()));
        bridge.store_string("k", "v").unwrap();
        assert_eq!(bridge.retrieve_string("k").unwrap().as_deref(), Some("v"));
        assert!(bridge.contains("k").unwrap());
        bridge.delete("k").unwrap();
        assert!(!bridge.contains("k").unwrap());
    }

    #[test]
    fn test_bridge_rejects_non_utf8() {
        let bridge = PreferenceStoreBridge::new(Arc::new(DictionaryStore::default()));
        let err = bridge.store("k", &[0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, IdRotorError::Storage(_)));
    }

    #[test]
    fn test_host_errors_become_storage_errors() {
        let bridge = PreferenceStoreBridge::new(Arc::new(LockedStore));
        let err = bridge.store("k", b"v").unwrap_err();
        assert!(matches!(&err, IdRotorError::Storage(msg) if msg.contains("device locked")));
        assert!(err.is_retryable());
    }
}
