//! Secure random byte sources.

use rand::{rngs::OsRng, RngCore};

use passkeep_common::{Error, Result};

/// Source of cryptographically secure random bytes.
///
/// Implementations must be usable from any number of threads at once.
pub trait EntropySource: Send + Sync {
    /// Fill `dest` entirely with random bytes.
    ///
    /// # Errors
    /// - `RandomnessUnavailable` if the source cannot produce bytes
    fn fill(&self, dest: &mut [u8]) -> Result<()>;
}

/// Operating system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&self, dest: &mut [u8]) -> Result<()> {
        OsRng
            .try_fill_bytes(dest)
            .map_err(|e| Error::RandomnessUnavailable(e.to_string()))
    }
}
