//! Identifier Store
//!
//! The single source of truth for "the current identifier" in a process.
//! Both the interception layer and the public facade read from here, so all
//! coordination between rotation and reads happens in this file.

use crate::config::RotorConfig;
use crate::generator::IdentifierGenerator;
use crate::identifier::Identifier;
use crate::persistence::{PreferenceStore, PreferenceStoreExt};
use crate::{IdRotorError, Result};
use std::sync::{Arc, Mutex, RwLock};

/// Callback type for rotation events.
///
/// Receives the new identifier and the rotation count it was assigned.
pub type RotationCallback = Arc<dyn Fn(&Identifier, u64) + Send + Sync>;

/// A consistent view of the rotation state at one instant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RotationSnapshot {
    /// The current identifier.
    pub identifier: Arc<Identifier>,
    /// Number of rotations performed since initialization.
    pub rotation_count: u64,
}

/// Where the initial identifier came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitSource {
    /// Freshly generated.
    Generated,
    /// Loaded from the preference store.
    Restored,
    /// Store was already initialized; nothing changed.
    AlreadyInitialized,
}

struct RotationState {
    current: Arc<Identifier>,
    rotation_count: u64,
}

/// Thread-safe holder of the current identifier.
///
/// The store:
/// - Produces the initial identifier once (or restores a persisted one)
/// - Swaps in a fresh identifier on every rotation
/// - Persists each new identifier if a preference store is attached
/// - Notifies registered callbacks after each rotation
pub struct IdentifierStore {
    /// Configuration.
    config: RotorConfig,
    /// Generator for initial and rotated values.
    generator: IdentifierGenerator,
    /// Optional persistence collaborator.
    preferences: Option<Arc<dyn PreferenceStore>>,
    /// None until `initialize` runs.
    state: RwLock<Option<RotationState>>,
    /// Callbacks for rotation events.
    callbacks: RwLock<Vec<RotationCallback>>,
    /// Rotation count of the last value written to `preferences`.
    persisted: Mutex<Option<u64>>,
}

impl IdentifierStore {
    /// Create a store with the given configuration and generator.
    pub fn new(config: RotorConfig, generator: IdentifierGenerator) -> Self {
        let generator = generator.with_max_attempts(config.max_generation_attempts);
        Self {
            config,
            generator,
            preferences: None,
            state: RwLock::new(None),
            callbacks: RwLock::new(Vec::new()),
            persisted: Mutex::new(None),
        }
    }

    /// Create with default configuration and the OS entropy source.
    pub fn with_defaults() -> Self {
        Self::new(RotorConfig::default(), IdentifierGenerator::os())
    }

    /// Attach a preference store for persistence.
    pub fn with_preferences(mut self, preferences: Arc<dyn PreferenceStore>) -> Self {
        self.preferences = Some(preferences);
        self
    }

    /// Get the configuration.
    pub fn config(&self) -> &RotorConfig {
        &self.config
    }

    /// Register a callback for rotation events.
    pub fn on_rotation(&self, callback: RotationCallback) {
        let mut callbacks = self.callbacks.write().unwrap_or_else(|e| e.into_inner());
        callbacks.push(callback);
    }

    /// Whether `initialize` has completed.
    pub fn is_initialized(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Set up the current identifier if that has not happened yet.
    ///
    /// Calling this again never regenerates.
    #[tracing::instrument(skip(self))]
    pub fn initialize(&self) -> Result<InitSource> {
        if self.is_initialized() {
            return Ok(InitSource::AlreadyInitialized);
        }

        let (identifier, source) = match self.load_persisted() {
            Some(identifier) => (identifier, InitSource::Restored),
            None => (self.generator.generate()?, InitSource::Generated),
        };

        {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            if state.is_some() {
                // Lost the race to another initializer; theirs stands.
                return Ok(InitSource::AlreadyInitialized);
            }
            *state = Some(RotationState {
                current: Arc::new(identifier.clone()),
                rotation_count: 0,
            });
        }

        if source == InitSource::Generated {
            self.persist(&identifier, 0);
        }
        tracing::info!(id = identifier.redacted(), ?source, "identifier store initialized");
        Ok(source)
    }

    /// Get the current identifier.
    ///
    /// The returned snapshot stays valid after later rotations.
    pub fn current(&self) -> Result<Arc<Identifier>> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state
            .as_ref()
            .map(|s| Arc::clone(&s.current))
            .ok_or(IdRotorError::NotInitialized)
    }

    /// Get the current identifier together with the rotation count.
    pub fn snapshot(&self) -> Result<RotationSnapshot> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state
            .as_ref()
            .map(|s| RotationSnapshot {
                identifier: Arc::clone(&s.current),
                rotation_count: s.rotation_count,
            })
            .ok_or(IdRotorError::NotInitialized)
    }

    /// Number of rotations performed since initialization.
    pub fn rotation_count(&self) -> Result<u64> {
        Ok(self.snapshot()?.rotation_count)
    }

    /// Replace the current identifier with a freshly generated one.
    ///
    /// Rotations are serialized on the state lock, so the counter reflects
    /// their order. Readers see either the old or the new value.
    #[tracing::instrument(skip(self))]
    pub fn rotate(&self) -> Result<Arc<Identifier>> {
        let (identifier, rotation_count) = {
            let mut guard = self.state.write().unwrap_or_else(|e| e.into_inner());
            let state = guard.as_mut().ok_or(IdRotorError::NotInitialized)?;
            let next = Arc::new(self.generator.generate_excluding(Some(&state.current))?);
            state.current = Arc::clone(&next);
            state.rotation_count += 1;
            (next, state.rotation_count)
        };

        tracing::info!(
            id = identifier.redacted(),
            rotation_count,
            "identifier rotated"
        );
        self.persist(&identifier, rotation_count);

        // Callbacks run outside the lock; under concurrent rotation they may
        // observe events out of order, the count disambiguates.
        let callbacks = self
            .callbacks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for callback in callbacks.iter() {
            callback(&identifier, rotation_count);
        }

        Ok(identifier)
    }

    /// Remove the persisted identifier so the next process start generates
    /// a fresh one. The in-memory current value is unchanged.
    pub fn clear_persisted(&self) -> Result<()> {
        match &self.preferences {
            Some(preferences) if self.config.persist => {
                preferences.delete(&self.config.storage_key)
            }
            _ => Ok(()),
        }
    }

    fn load_persisted(&self) -> Option<Identifier> {
        if !self.config.persist {
            return None;
        }
        let preferences = self.preferences.as_ref()?;
        match preferences.retrieve_string(&self.config.storage_key) {
            Ok(Some(raw)) => match Identifier::parse_persisted(&raw) {
                Ok(identifier) => Some(identifier),
                Err(err) => {
                    tracing::warn!("discarding persisted identifier: {err}");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                tracing::warn!("failed to read persisted identifier: {err}");
                None
            }
        }
    }

    /// Write `identifier` unless a later rotation has already been written.
    ///
    /// Writes are serialized on `persisted` and happen outside the state lock,
    /// so concurrent rotations can arrive here out of order.
    fn persist(&self, identifier: &Identifier, rotation_count: u64) {
        if !self.config.persist {
            return;
        }
        let Some(preferences) = &self.preferences else {
            return;
        };
        let mut persisted = self.persisted.lock().unwrap_or_else(|e| e.into_inner());
        if persisted.is_some_and(|last| last >= rotation_count) {
            tracing::debug!(rotation_count, "skipping write superseded by a later rotation");
            return;
        }
        match preferences.store_string(&self.config.storage_key, identifier.as_str()) {
            Ok(()) => *persisted = Some(rotation_count),
            Err(err) => tracing::warn!("failed to persist identifier: {err}"),
        }
    }
}

impl Default for IdentifierStore {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::is_canonical;
    use crate::persistence::InMemoryPreferenceStore;
    use crate::persistence::PreferenceStore;
    use crate::test_utils::{seeded_store, ExhaustibleEntropy, FailingEntropy};
    use crate::IdRotorErrorCode;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_current_before_initialize() {
        let store = seeded_store(1);
        assert_eq!(store.current().unwrap_err(), IdRotorError::NotInitialized);
        assert_eq!(store.rotate().unwrap_err(), IdRotorError::NotInitialized);
        assert!(!store.is_initialized());
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let store = seeded_store(2);
        assert_eq!(store.initialize().unwrap(), InitSource::Generated);
        let first = store.current().unwrap();
        assert_eq!(store.initialize().unwrap(), InitSource::AlreadyInitialized);
        assert_eq!(store.current().unwrap(), first);
        assert_eq!(store.rotation_count().unwrap(), 0);
    }

    #[test]
    fn test_rotate_changes_value_and_counter() {
        let store = seeded_store(3);
        store.initialize().unwrap();
        let before = store.current().unwrap();
        let rotated = store.rotate().unwrap();
        assert_ne!(before, rotated);
        assert_eq!(store.current().unwrap(), rotated);
        assert_eq!(store.rotation_count().unwrap(), 1);
        // The old snapshot is untouched.
        assert!(is_canonical(before.as_str()));
    }

    #[test]
    fn test_rotations_never_repeat() {
        let store = seeded_store(4);
        store.initialize().unwrap();
        let mut seen = HashSet::new();
        seen.insert(store.current().unwrap().as_str().to_string());
        for _ in 0..500 {
            let id = store.rotate().unwrap();
            assert!(seen.insert(id.as_str().to_string()));
        }
        assert_eq!(store.rotation_count().unwrap(), 500);
    }

    #[test]
    fn test_entropy_failure_surfaces() {
        let store = IdentifierStore::new(
            RotorConfig::default(),
            IdentifierGenerator::new(Arc::new(FailingEntropy)),
        );
        let err = store.initialize().unwrap_err();
        assert_eq!(err.code(), IdRotorErrorCode::EntropyUnavailable);
        assert!(!store.is_initialized());
    }

    #[test]
    fn test_entropy_failure_after_initialize_keeps_state() {
        let store = IdentifierStore::new(
            RotorConfig::default(),
            IdentifierGenerator::new(Arc::new(ExhaustibleEntropy::new(6, 2))),
        );
        store.initialize().unwrap();
        let first = store.rotate().unwrap();

        let err = store.rotate().unwrap_err();
        assert_eq!(err.code(), IdRotorErrorCode::EntropyUnavailable);
        assert_eq!(store.current().unwrap(), first);
        assert_eq!(store.rotation_count().unwrap(), 1);
    }

    #[test]
    fn test_concurrent_rotations_are_distinct() {
        let store = Arc::new(IdentifierStore::with_defaults());
        store.initialize().unwrap();
        let start = store.rotation_count().unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    (0..25)
                        .map(|_| store.rotate().unwrap().as_str().to_string())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut values = HashSet::new();
        for handle in handles {
            for value in handle.join().unwrap() {
                assert!(values.insert(value));
            }
        }
        assert_eq!(values.len(), 400);
        assert_eq!(store.rotation_count().unwrap(), start + 400);
    }

    #[test]
    fn test_readers_never_see_malformed_values() {
        let store = Arc::new(IdentifierStore::with_defaults());
        store.initialize().unwrap();

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..2_000 {
                        let id = store.current().unwrap();
                        assert!(is_canonical(id.as_str()));
                    }
                })
            })
            .collect();
        for _ in 0..200 {
            store.rotate().unwrap();
        }
        for reader in readers {
            reader.join().unwrap();
        }
    }

    #[test]
    fn test_persisted_identifier_is_restored() {
        let prefs = Arc::new(InMemoryPreferenceStore::new());
        prefs
            .store_string("idrotor.customDeviceID", "a1b2c3d4-e5f6-47a8-b9c0-d1e2f3a4b5c6")
            .unwrap();

        let store = IdentifierStore::with_defaults().with_preferences(prefs.clone());
        assert_eq!(store.initialize().unwrap(), InitSource::Restored);
        assert_eq!(
            store.current().unwrap().as_str(),
            "A1B2C3D4-E5F6-47A8-B9C0-D1E2F3A4B5C6"
        );

        let rotated = store.rotate().unwrap();
        assert_eq!(
            prefs.retrieve_string("idrotor.customDeviceID").unwrap().as_deref(),
            Some(rotated.as_str())
        );
    }

    #[test]
    fn test_malformed_persisted_value_is_replaced() {
        let prefs = Arc::new(InMemoryPreferenceStore::new());
        prefs
            .store_string("idrotor.customDeviceID", "00000000-0000-0000-0000-000000000000")
            .unwrap();

        let store = IdentifierStore::with_defaults().with_preferences(prefs.clone());
        assert_eq!(store.initialize().unwrap(), InitSource::Generated);
        let current = store.current().unwrap();
        assert_eq!(
            prefs.retrieve_string("idrotor.customDeviceID").unwrap().as_deref(),
            Some(current.as_str())
        );
    }

    #[test]
    fn test_persistence_disabled() {
        let prefs = Arc::new(InMemoryPreferenceStore::new());
        let store = IdentifierStore::new(
            RotorConfig::default().with_persist(false),
            IdentifierGenerator::os(),
        )
        .with_preferences(prefs.clone());
        store.initialize().unwrap();
        store.rotate().unwrap();
        assert!(!prefs.contains("idrotor.customDeviceID").unwrap());
    }

    #[test]
    fn test_clear_persisted_keeps_current() {
        let prefs = Arc::new(InMemoryPreferenceStore::new());
        let store = IdentifierStore::with_defaults().with_preferences(prefs.clone());
        store.initialize().unwrap();
        let current = store.current().unwrap();

        store.clear_persisted().unwrap();
        assert!(!prefs.contains("idrotor.customDeviceID").unwrap());
        assert_eq!(store.current().unwrap(), current);
    }

    #[test]
    fn test_rotation_callbacks() {
        let store = seeded_store(5);
        store.initialize().unwrap();

        let last_count = Arc::new(AtomicU64::new(0));
        let observed = Arc::clone(&last_count);
        store.on_rotation(Arc::new(move |id: &Identifier, count: u64| {
            assert!(is_canonical(id.as_str()));
            observed.store(count, Ordering::SeqCst);
        }));

        store.rotate().unwrap();
        store.rotate().unwrap();
        assert_eq!(last_count.load(Ordering::SeqCst), 2);
    }

    /// Preference store whose second write is slow.
    #[derive(Default)]
    struct SlowSecondWrite {
        inner: InMemoryPreferenceStore,
        writes: AtomicUsize,
    }

    impl PreferenceStore for SlowSecondWrite {
        fn store(&self, key: &str, value: &[u8]) -> Result<()> {
            if self.writes.fetch_add(1, Ordering::SeqCst) == 1 {
                thread::sleep(Duration::from_millis(300));
            }
            self.inner.store(key, value)
        }

        fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>> {
            self.inner.retrieve(key)
        }

        fn delete(&self, key: &str) -> Result<()> {
            self.inner.delete(key)
        }
    }

    #[test]
    fn test_slow_write_does_not_overwrite_newer_rotation() {
        let prefs = Arc::new(SlowSecondWrite::default());
        let store = Arc::new(seeded_store(7).with_preferences(prefs.clone()));
        store.initialize().unwrap();

        let first = {
            let store = Arc::clone(&store);
            thread::spawn(move || store.rotate().unwrap())
        };
        thread::sleep(Duration::from_millis(100));
        store.rotate().unwrap();
        first.join().unwrap();

        assert_eq!(store.rotation_count().unwrap(), 2);
        assert_eq!(
            prefs.retrieve_string("idrotor.customDeviceID").unwrap().as_deref(),
            Some(store.current().unwrap().as_str())
        );
    }
}
