//! Test utilities for identifier rotation.
//!
//! This module provides testing infrastructure including:
//! - Deterministic, stuck, exhaustible and failing entropy sources
//! - A mock "hardware" dispatch table with the platform entry points registered
//! - Assertion helpers for identifier format and intercepted reads
//!
//! ## Usage
//!
//! ```rust,ignore
//! use idrotor_lib::test_utils::{hardware_table, seeded_store, assert_intercepted};
//!
//! let table = hardware_table();
//! let store = std::sync::Arc::new(seeded_store(42));
//! store.initialize()?;
//! ```

mod assertions;
mod fixtures;
mod mock_platform;

pub use fixtures::{
    seeded_store, ExhaustibleEntropy, FailingEntropy, FixedEntropy, SeededEntropy,
};

pub use mock_platform::{hardware_table, HARDWARE_ID};

pub use assertions::{assert_canonical, assert_intercepted};
