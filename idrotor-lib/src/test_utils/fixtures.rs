//! Entropy fixtures and store constructors.

use crate::generator::{EntropySource, IdentifierGenerator};
use crate::rotation::IdentifierStore;
use crate::{IdRotorError, Result, RotorConfig};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::sync::{Arc, Mutex};

/// Reproducible entropy from a seeded PRNG.
pub struct SeededEntropy {
    rng: Mutex<StdRng>,
}

impl SeededEntropy {
    /// Create a source seeded with `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl EntropySource for SeededEntropy {
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<()> {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.fill_bytes(dest);
        Ok(())
    }
}

/// Entropy source stuck on one byte pattern.
pub struct FixedEntropy {
    bytes: [u8; 16],
}

impl FixedEntropy {
    /// Create a source that always yields `bytes`.
    pub fn new(bytes: [u8; 16]) -> Self {
        Self { bytes }
    }
}

impl EntropySource for FixedEntropy {
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<()> {
        for (i, byte) in dest.iter_mut().enumerate() {
            *byte = self.bytes[i % self.bytes.len()];
        }
        Ok(())
    }
}

/// Seeded entropy that stops working after a fixed number of draws.
///
/// Models an RNG that becomes unavailable mid-process, after setup succeeded.
pub struct ExhaustibleEntropy {
    inner: SeededEntropy,
    remaining: Mutex<usize>,
}

impl ExhaustibleEntropy {
    /// Allow `draws` successful fills, then fail every later one.
    pub fn new(seed: u64, draws: usize) -> Self {
        Self {
            inner: SeededEntropy::new(seed),
            remaining: Mutex::new(draws),
        }
    }
}

impl EntropySource for ExhaustibleEntropy {
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<()> {
        let mut remaining = self.remaining.lock().unwrap_or_else(|e| e.into_inner());
        if *remaining == 0 {
            return Err(IdRotorError::entropy("entropy pool exhausted"));
        }
        *remaining -= 1;
        self.inner.fill_bytes(dest)
    }
}

/// Entropy source that is always unavailable.
pub struct FailingEntropy;

impl EntropySource for FailingEntropy {
    fn fill_bytes(&self, _dest: &mut [u8]) -> Result<()> {
        Err(IdRotorError::entropy("entropy pool unavailable"))
    }
}

/// An uninitialized store with default config over [`SeededEntropy`].
pub fn seeded_store(seed: u64) -> IdentifierStore {
    IdentifierStore::new(
        RotorConfig::default(),
        IdentifierGenerator::new(Arc::new(SeededEntropy::new(seed))),
    )
}
