//! Identifier generation.
//!
//! Identifiers are random (version 4) UUIDs drawn from an [`EntropySource`].
//! The OS random source is used in production; tests plug in seeded or
//! failing sources.

use crate::identifier::{is_reserved, Identifier};
use crate::{IdRotorError, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::Arc;
use uuid::Builder;

/// Default bound on draws per `generate` call.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 8;

/// Source of random bytes for identifier generation.
///
/// Implementations must be thread-safe; the store calls them from whichever
/// thread triggers a rotation.
pub trait EntropySource: Send + Sync {
    /// Fill `dest` entirely with random bytes, or fail.
    ///
    /// A failing source must return `EntropyUnavailable` rather than
    /// writing low-quality or fixed bytes.
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<()>;
}

/// Operating system random source (`getrandom` / `SecRandomCopyBytes`).
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<()> {
        OsRng.try_fill_bytes(dest).map_err(IdRotorError::entropy)
    }
}

/// Produces well-formed identifiers.
#[derive(Clone)]
pub struct IdentifierGenerator {
    source: Arc<dyn EntropySource>,
    max_attempts: u32,
}

impl IdentifierGenerator {
    /// Create a generator over the given entropy source.
    pub fn new(source: Arc<dyn EntropySource>) -> Self {
        Self {
            source,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Create a generator backed by the OS random source.
    pub fn os() -> Self {
        Self::new(Arc::new(OsEntropy))
    }

    /// Set the number of draws allowed per call before giving up.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Generate a new identifier.
    pub fn generate(&self) -> Result<Identifier> {
        self.generate_excluding(None)
    }

    /// Generate a new identifier different from `previous`.
    ///
    /// Denylisted values and repeats of `previous` are redrawn. A source that
    /// keeps producing them is treated as exhausted.
    pub fn generate_excluding(&self, previous: Option<&Identifier>) -> Result<Identifier> {
        for _ in 0..self.max_attempts {
            let mut bytes = [0u8; 16];
            self.source.fill_bytes(&mut bytes)?;
            let uuid = Builder::from_random_bytes(bytes).into_uuid();
            if is_reserved(&uuid) {
                continue;
            }
            let identifier = Identifier::from_uuid(uuid)?;
            if previous == Some(&identifier) {
                tracing::debug!("redrawing identifier equal to the current one");
                continue;
            }
            return Ok(identifier);
        }
        Err(IdRotorError::EntropyUnavailable {
            reason: format!(
                "no usable identifier after {} draws, entropy source looks stuck",
                self.max_attempts
            ),
        })
    }
}

impl Default for IdentifierGenerator {
    fn default() -> Self {
        Self::os()
    }
}

impl std::fmt::Debug for IdentifierGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentifierGenerator")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::is_canonical;
    use crate::test_utils::{FailingEntropy, FixedEntropy, SeededEntropy};
    use crate::IdRotorErrorCode;
    use std::collections::HashSet;

    #[test]
    fn test_os_generator_produces_canonical_v4() {
        let generator = IdentifierGenerator::os();
        for _ in 0..100 {
            let id = generator.generate().unwrap();
            assert!(is_canonical(id.as_str()));
            assert_eq!(id.as_uuid().get_version_num(), 4);
            assert_eq!(&id.as_str()[14..15], "4");
        }
    }

    #[test]
    fn test_values_are_distinct() {
        let generator = IdentifierGenerator::new(Arc::new(SeededEntropy::new(7)));
        let values: HashSet<_> = (0..1000)
            .map(|_| generator.generate().unwrap().as_str().to_string())
            .collect();
        assert_eq!(values.len(), 1000);
    }

    #[test]
    fn test_failing_source_is_entropy_unavailable() {
        let generator = IdentifierGenerator::new(Arc::new(FailingEntropy));
        let err = generator.generate().unwrap_err();
        assert_eq!(err.code(), IdRotorErrorCode::EntropyUnavailable);
    }

    #[test]
    fn test_stuck_source_cannot_repeat_previous() {
        let generator =
            IdentifierGenerator::new(Arc::new(FixedEntropy::new([0x11; 16]))).with_max_attempts(3);
        let first = generator.generate().unwrap();
        let err = generator.generate_excluding(Some(&first)).unwrap_err();
        assert_eq!(err.code(), IdRotorErrorCode::EntropyUnavailable);
    }

    #[test]
    fn test_zero_bytes_do_not_yield_nil() {
        // Version and variant bits are forced, so all-zero input is still usable.
        let generator = IdentifierGenerator::new(Arc::new(FixedEntropy::new([0; 16])));
        let id = generator.generate().unwrap();
        assert_eq!(id.as_str(), "00000000-0000-4000-8000-000000000000");
    }

    #[test]
    fn test_max_attempts_floor() {
        let generator = IdentifierGenerator::os().with_max_attempts(0);
        assert!(generator.generate().is_ok());
    }
}
