//! Identifier Rotation
//!
//! This module holds the process-wide "current identifier" state and the
//! rotate operation that replaces it.
//!
//! # Example
//!
//! ```
//! use idrotor_lib::rotation::IdentifierStore;
//!
//! let store = IdentifierStore::with_defaults();
//! store.initialize()?;
//!
//! let before = store.current()?;
//! let after = store.rotate()?;
//! assert_ne!(before, after);
//! assert_eq!(store.rotation_count()?, 1);
//! # Ok::<(), idrotor_lib::IdRotorError>(())
//! ```
//!
//! # Consistency
//!
//! - `current()` hands out an `Arc` snapshot; a later rotation never mutates it
//! - Rotations are serialized, and the counter records their order
//! - A rotation never reproduces the value it replaces

mod store;

pub use store::{IdentifierStore, InitSource, RotationCallback, RotationSnapshot};
