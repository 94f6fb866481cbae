//! Device identifier rotation library.
//!
//! This crate keeps one spoofed device identifier per process, lets callers
//! rotate it on demand, and redirects the platform's native identifier
//! accessors so that unmodified code reads the spoofed value.
//!
//! # Features
//!
//! - **Generation**: random v4-layout identifiers in the canonical
//!   `8-4-4-4-12` uppercase form, never a reserved "unset" value
//! - **Rotation**: an injectable, thread-safe store with atomic swaps
//! - **Interception**: per-entry-point redirection through a pluggable
//!   [`HookBackend`](interception::HookBackend)
//!
//! # Example
//!
//! ```
//! use idrotor_lib::interception::{DispatchTableBackend, InterceptionLayer, NativeDispatchTable};
//! use idrotor_lib::rotation::IdentifierStore;
//! use std::sync::Arc;
//!
//! let store = Arc::new(IdentifierStore::with_defaults());
//! store.initialize()?;
//!
//! let table = Arc::new(NativeDispatchTable::new());
//! let layer = InterceptionLayer::new(store.clone(), Arc::new(DispatchTableBackend::new(table)));
//! let report = layer.install();
//!
//! // Nothing registered in a fresh table, so every entry point is reported.
//! assert!(!report.is_complete());
//! # Ok::<(), idrotor_lib::IdRotorError>(())
//! ```

pub mod config;
pub mod errors;
pub mod generator;
pub mod identifier;
pub mod interception;
pub mod persistence;
pub mod prelude;
pub mod rotation;

/// Test utilities for rotation and interception testing.
///
/// This module is only available with the `test-utils` feature or in test builds.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::RotorConfig;
pub use errors::{IdRotorError, IdRotorErrorCode};
pub use generator::{EntropySource, IdentifierGenerator, OsEntropy};
pub use identifier::Identifier;

/// Common result alias for rotation operations.
pub type Result<T> = std::result::Result<T, IdRotorError>;
