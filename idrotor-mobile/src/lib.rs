//! Device Identifier Rotator Mobile Bindings
//!
//! This crate exposes the rotation core to host applications in two ways:
//! - A UniFFI object, [`DeviceIdRotator`], for Swift (iOS) and Kotlin
//! - A flat C ABI ([`c_api`]) with `rotateDeviceID` / `getCurrentDeviceID`
//!   for injected dylibs and plain C/Objective-C callers
//!
//! Both surfaces share one process-wide rotator (see [`shared_rotator`]), so
//! a rotation triggered through either is observed by every intercepted
//! native read.
//!
//! # Thread Safety
//!
//! All exposed types are thread-safe and can be used from any thread.

pub mod c_api;
pub mod storage;

pub use storage::{PreferenceStoreBridge, PreferenceStoreFFI};

use idrotor_lib::interception::{
    default_backend, EntryPointKind, EntryPointState, HookBackend, InstallReport,
    InterceptionLayer,
};
use idrotor_lib::rotation::IdentifierStore;
use idrotor_lib::{IdRotorError, IdRotorErrorCode, Identifier, IdentifierGenerator, RotorConfig};
use std::sync::{Arc, OnceLock};

// UniFFI scaffolding
uniffi::setup_scaffolding!();

// ============================================================================
// Error Types
// ============================================================================

/// Mobile-friendly error type.
#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum IdRotorMobileError {
    /// No randomness available; the identifier was left unchanged.
    #[error("Entropy unavailable: {msg}")]
    EntropyUnavailable { msg: String },

    /// `setup` has not run yet.
    #[error("Not initialized: {msg}")]
    NotInitialized { msg: String },

    /// A native entry point could not be redirected.
    #[error("Redirection unavailable: {msg}")]
    RedirectionUnavailable { msg: String },

    /// A value did not have the canonical identifier shape.
    #[error("Invalid identifier: {msg}")]
    FormatInvariantViolation { msg: String },

    /// Preference storage failed.
    #[error("Storage error: {msg}")]
    Storage { msg: String },

    /// Configuration could not be parsed.
    #[error("Config error: {msg}")]
    Config { msg: String },

    /// Internal error (unexpected state).
    #[error("Internal error: {msg}")]
    Internal { msg: String },
}

impl IdRotorMobileError {
    /// Numeric code shared with the C ABI.
    pub fn code(&self) -> i32 {
        let code = match self {
            Self::EntropyUnavailable { .. } => IdRotorErrorCode::EntropyUnavailable,
            Self::NotInitialized { .. } => IdRotorErrorCode::NotInitialized,
            Self::RedirectionUnavailable { .. } => IdRotorErrorCode::RedirectionUnavailable,
            Self::FormatInvariantViolation { .. } => IdRotorErrorCode::FormatInvariantViolation,
            Self::Storage { .. } => IdRotorErrorCode::Storage,
            Self::Config { .. } => IdRotorErrorCode::Config,
            Self::Internal { .. } => IdRotorErrorCode::Internal,
        };
        code as i32
    }
}

impl From<IdRotorError> for IdRotorMobileError {
    fn from(e: IdRotorError) -> Self {
        let msg = e.message();
        match e {
            IdRotorError::EntropyUnavailable { .. } => Self::EntropyUnavailable { msg },
            IdRotorError::NotInitialized => Self::NotInitialized { msg },
            IdRotorError::RedirectionUnavailable { .. } => Self::RedirectionUnavailable { msg },
            IdRotorError::FormatInvariantViolation { .. } => {
                Self::FormatInvariantViolation { msg }
            }
            IdRotorError::Storage(_) => Self::Storage { msg },
            IdRotorError::Config(_) => Self::Config { msg },
            IdRotorError::Internal(_) => Self::Internal { msg },
        }
    }
}

impl From<uniffi::UnexpectedUniFFICallbackError> for IdRotorMobileError {
    fn from(e: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::Internal { msg: e.reason }
    }
}

pub type Result<T> = std::result::Result<T, IdRotorMobileError>;

// ============================================================================
// Records
// ============================================================================

/// Identifier accessors that can be intercepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, uniffi::Enum)]
pub enum EntryPointKindFFI {
    /// `UIDevice.identifierForVendor`
    VendorIdentifier,
    /// `ASIdentifierManager.advertisingIdentifier`
    AdvertisingIdentifier,
}

impl From<EntryPointKind> for EntryPointKindFFI {
    fn from(kind: EntryPointKind) -> Self {
        match kind {
            EntryPointKind::VendorIdentifier => Self::VendorIdentifier,
            EntryPointKind::AdvertisingIdentifier => Self::AdvertisingIdentifier,
        }
    }
}

/// An entry point that could not be redirected.
#[derive(Clone, Debug, PartialEq, Eq, uniffi::Record)]
pub struct EntryPointFailure {
    pub entry_point: EntryPointKindFFI,
    pub reason: String,
}

/// Result of [`DeviceIdRotator::setup`].
#[derive(Clone, Debug, PartialEq, Eq, uniffi::Record)]
pub struct SetupReport {
    /// Identifier in effect once setup finished.
    pub current_identifier: String,
    /// Entry points redirected by this call.
    pub installed: Vec<EntryPointKindFFI>,
    /// Entry points that were redirected before this call.
    pub already_redirected: Vec<EntryPointKindFFI>,
    /// Entry points that could not be redirected.
    pub failed: Vec<EntryPointFailure>,
    /// True when every configured entry point is redirected.
    pub complete: bool,
}

impl SetupReport {
    fn new(current_identifier: String, report: &InstallReport) -> Self {
        Self {
            current_identifier,
            installed: report.installed().into_iter().map(Into::into).collect(),
            already_redirected: report
                .already_redirected()
                .into_iter()
                .map(Into::into)
                .collect(),
            failed: report
                .failures()
                .into_iter()
                .map(|(kind, err)| EntryPointFailure {
                    entry_point: kind.into(),
                    reason: err.message(),
                })
                .collect(),
            complete: report.is_complete(),
        }
    }
}

/// Whether an entry point currently reads from the rotator.
#[derive(Clone, Debug, PartialEq, Eq, uniffi::Record)]
pub struct EntryPointStatus {
    pub entry_point: EntryPointKindFFI,
    pub redirected: bool,
}

/// What a presenter is shown.
#[derive(Clone, Debug, PartialEq, Eq, uniffi::Record)]
pub struct RotatorState {
    pub current_identifier: String,
    pub rotation_count: u64,
}

// ============================================================================
// Callback Interfaces
// ============================================================================

/// Receives a notification after every rotation.
#[uniffi::export(callback_interface)]
pub trait RotationObserver: Send + Sync {
    /// Called with the new identifier and its rotation count.
    ///
    /// Runs on the thread that performed the rotation.
    fn on_rotated(&self, identifier: String, rotation_count: u64);
}

/// Host UI that lets the user trigger rotations.
#[uniffi::export(callback_interface)]
pub trait RotatorPresenter: Send + Sync {
    /// Show the rotation UI for `state`.
    fn present(&self, state: RotatorState);
}

// ============================================================================
// Rotator
// ============================================================================

/// Device identifier rotator for mobile applications.
#[derive(uniffi::Object)]
pub struct DeviceIdRotator {
    store: Arc<IdentifierStore>,
    layer: InterceptionLayer,
}

impl std::fmt::Debug for DeviceIdRotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceIdRotator").finish_non_exhaustive()
    }
}

static SHARED_ROTATOR: OnceLock<Arc<DeviceIdRotator>> = OnceLock::new();

#[uniffi::export]
impl DeviceIdRotator {
    /// Create a rotator with default configuration and no persistence.
    #[uniffi::constructor]
    pub fn new() -> Arc<Self> {
        Self::from_store(IdentifierStore::with_defaults(), default_backend())
    }

    /// Create a rotator from a JSON [`RotorConfig`].
    #[uniffi::constructor]
    pub fn new_with_config_json(config_json: String) -> Result<Arc<Self>> {
        let config = RotorConfig::from_json(&config_json)?;
        Ok(Self::from_store(
            IdentifierStore::new(config, IdentifierGenerator::os()),
            default_backend(),
        ))
    }

    /// Create a rotator that persists the identifier in host preferences.
    #[uniffi::constructor]
    pub fn with_preferences(
        config_json: String,
        preferences: Box<dyn PreferenceStoreFFI>,
    ) -> Result<Arc<Self>> {
        let config = RotorConfig::from_json(&config_json)?;
        let bridge = PreferenceStoreBridge::new(Arc::from(preferences));
        let store = IdentifierStore::new(config, IdentifierGenerator::os())
            .with_preferences(Arc::new(bridge));
        Ok(Self::from_store(store, default_backend()))
    }

    /// Initialize the identifier and redirect the native entry points.
    ///
    /// Redirection failures do not fail setup; they are listed in the report.
    /// Calling this again keeps the current identifier.
    pub fn setup(&self) -> Result<SetupReport> {
        self.store.initialize()?;
        let report = self.layer.install();
        let current = self.store.current()?;
        if !report.is_complete() {
            tracing::warn!(
                failed = report.failures().len(),
                "setup finished with entry points left native"
            );
        }
        Ok(SetupReport::new(current.as_str().to_string(), &report))
    }

    /// The identifier intercepted reads currently return.
    pub fn get_current_identifier(&self) -> Result<String> {
        Ok(self.store.current()?.as_str().to_string())
    }

    /// Replace the identifier and return the new value.
    pub fn rotate_identifier(&self) -> Result<String> {
        Ok(self.store.rotate()?.as_str().to_string())
    }

    /// Hand the current state to the host's rotation UI.
    pub fn present_rotator(&self, presenter: Box<dyn RotatorPresenter>) -> Result<()> {
        let snapshot = self.store.snapshot()?;
        presenter.present(RotatorState {
            current_identifier: snapshot.identifier.as_str().to_string(),
            rotation_count: snapshot.rotation_count,
        });
        Ok(())
    }

    /// Register an observer for rotation events.
    pub fn add_rotation_observer(&self, observer: Box<dyn RotationObserver>) {
        let observer: Arc<dyn RotationObserver> = Arc::from(observer);
        self.store
            .on_rotation(Arc::new(move |identifier: &Identifier, rotation_count: u64| {
                observer.on_rotated(identifier.as_str().to_string(), rotation_count)
            }));
    }

    /// Rotations performed since setup.
    pub fn rotation_count(&self) -> Result<u64> {
        Ok(self.store.rotation_count()?)
    }

    /// Whether setup has initialized the identifier.
    pub fn is_initialized(&self) -> bool {
        self.store.is_initialized()
    }

    /// Forget the persisted identifier; the next launch generates a new one.
    pub fn clear_persisted(&self) -> Result<()> {
        Ok(self.store.clear_persisted()?)
    }

    /// Redirection state of each configured entry point.
    pub fn entry_point_statuses(&self) -> Vec<EntryPointStatus> {
        self.layer
            .binding_states()
            .into_iter()
            .map(|(kind, state)| EntryPointStatus {
                entry_point: kind.into(),
                redirected: state == EntryPointState::Redirected,
            })
            .collect()
    }
}

impl DeviceIdRotator {
    /// Create a rotator over an explicit store and backend.
    ///
    /// Not exported over FFI; used by Rust hosts and tests.
    pub fn from_store(store: IdentifierStore, backend: Arc<dyn HookBackend>) -> Arc<Self> {
        let store = Arc::new(store);
        let layer = InterceptionLayer::new(Arc::clone(&store), backend);
        Arc::new(Self { store, layer })
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<IdentifierStore> {
        &self.store
    }
}

// ============================================================================
// Process-wide rotator
// ============================================================================

/// The rotator shared by the C ABI and every host surface in this process.
///
/// Created with defaults on first use unless [`init_shared_rotator`] ran first.
#[uniffi::export]
pub fn shared_rotator() -> Arc<DeviceIdRotator> {
    Arc::clone(SHARED_ROTATOR.get_or_init(DeviceIdRotator::new))
}

/// Configure the shared rotator with persistence. Must run before anything
/// else touches the shared rotator.
#[uniffi::export]
pub fn init_shared_rotator(
    config_json: String,
    preferences: Box<dyn PreferenceStoreFFI>,
) -> Result<Arc<DeviceIdRotator>> {
    let rotator = DeviceIdRotator::with_preferences(config_json, preferences)?;
    SHARED_ROTATOR
        .set(Arc::clone(&rotator))
        .map_err(|_| IdRotorMobileError::Config {
            msg: "shared rotator already created".to_string(),
        })?;
    Ok(rotator)
}

// ============================================================================
// Utility Functions
// ============================================================================

/// Get the library version.
#[uniffi::export]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Install a `tracing` subscriber writing to stderr.
///
/// `filter` uses `EnvFilter` syntax (e.g. `"idrotor_lib=debug"`); `RUST_LOG`
/// takes precedence when set. Returns false if a subscriber was already
/// installed, in which case nothing changes.
#[uniffi::export]
pub fn init_logging(filter: String) -> bool {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&filter))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
