//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use idrotor_lib::prelude::*;
//! ```

// Core types
pub use crate::identifier::Identifier;
pub use crate::RotorConfig;

// Error handling
pub use crate::errors::{IdRotorError, IdRotorErrorCode};
pub use crate::Result;

// Generation and state
pub use crate::generator::{EntropySource, IdentifierGenerator, OsEntropy};
pub use crate::rotation::{IdentifierStore, RotationCallback, RotationSnapshot};

// Interception
pub use crate::interception::{
    default_backend, EntryPointKind, EntryPointState, HookBackend, InstallOutcome, InstallReport,
    InterceptionLayer, NativeValue,
};

// Persistence
pub use crate::persistence::{InMemoryPreferenceStore, PreferenceStore, PreferenceStoreExt};
