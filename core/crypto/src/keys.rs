//! Salt and derived key types.
//!
//! Derived key material zeroizes its memory on drop and only compares in
//! constant time.

use base64::{engine::general_purpose::STANDARD, Engine};
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::entropy::EntropySource;
use passkeep_common::{Error, Result};

/// Smallest accepted salt, in bytes.
pub const MIN_SALT_LENGTH: usize = 16;

/// Largest accepted salt, in bytes. Bounded by the PHC string format.
pub const MAX_SALT_LENGTH: usize = 48;

/// Salt length used for new credentials unless configured otherwise.
pub const DEFAULT_SALT_LENGTH: usize = 16;

/// Random per-credential salt.
#[derive(Clone, PartialEq, Eq)]
pub struct Salt(Vec<u8>);

impl Salt {
    /// Draw a fresh salt of `length` bytes from `source`.
    ///
    /// # Errors
    /// - `InvalidInput` if `length` is outside the accepted range
    /// - `RandomnessUnavailable` if the source cannot produce bytes
    pub fn generate(source: &dyn EntropySource, length: usize) -> Result<Self> {
        check_salt_length(length).map_err(Error::InvalidInput)?;
        let mut bytes = vec![0u8; length];
        source.fill(&mut bytes)?;
        Ok(Self(bytes))
    }

    /// Create from raw bytes read back from storage.
    ///
    /// # Errors
    /// - `MalformedCredential` if the length is outside the accepted range
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        check_salt_length(bytes.len()).map_err(Error::MalformedCredential)?;
        Ok(Self(bytes))
    }

    /// Decode a salt stored as standard base64.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| Error::MalformedCredential(format!("Salt is not valid base64: {}", e)))?;
        Self::from_bytes(bytes)
    }

    /// Encode as standard base64 for storage.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    /// Get the salt bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Salt length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a constructed salt.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Salt([{} bytes])", self.0.len())
    }
}

/// Validate a salt length, returning a message on failure.
pub(crate) fn check_salt_length(length: usize) -> std::result::Result<(), String> {
    if !(MIN_SALT_LENGTH..=MAX_SALT_LENGTH).contains(&length) {
        return Err(format!(
            "Salt length must be between {} and {} bytes, got {}",
            MIN_SALT_LENGTH, MAX_SALT_LENGTH, length
        ));
    }
    Ok(())
}

/// Key material produced by a key derivation function.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    key: Vec<u8>,
}

impl DerivedKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(key: Vec<u8>) -> Self {
        Self { key }
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    pub(crate) fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.key
    }

    /// Key length in bytes.
    pub fn len(&self) -> usize {
        self.key.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }

    /// Compare against expected key material.
    ///
    /// Runs in time independent of the position of the first differing
    /// byte. Inputs of different length are unequal.
    pub fn ct_eq(&self, expected: &[u8]) -> bool {
        self.key.as_slice().ct_eq(expected).into()
    }

    /// Encode as standard base64 for storage.
    pub(crate) fn to_base64(&self) -> String {
        STANDARD.encode(&self.key)
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DerivedKey([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::OsEntropy;

    #[test]
    fn test_salt_generate() {
        let salt1 = Salt::generate(&OsEntropy, DEFAULT_SALT_LENGTH).unwrap();
        let salt2 = Salt::generate(&OsEntropy, DEFAULT_SALT_LENGTH).unwrap();

        assert_eq!(salt1.len(), DEFAULT_SALT_LENGTH);
        // Random salts should be different
        assert_ne!(salt1.as_bytes(), salt2.as_bytes());
    }

    #[test]
    fn test_salt_length_bounds() {
        assert!(Salt::generate(&OsEntropy, MIN_SALT_LENGTH - 1).is_err());
        assert!(Salt::generate(&OsEntropy, MAX_SALT_LENGTH + 1).is_err());
        assert!(Salt::generate(&OsEntropy, MAX_SALT_LENGTH).is_ok());
    }

    #[test]
    fn test_salt_from_short_bytes_is_malformed() {
        let err = Salt::from_bytes(vec![1u8; 4]).unwrap_err();
        assert!(matches!(err, Error::MalformedCredential(_)));
    }

    #[test]
    fn test_salt_base64() {
        let salt = Salt::from_bytes(vec![7u8; 16]).unwrap();
        let decoded = Salt::from_base64(&salt.to_base64()).unwrap();
        assert_eq!(salt, decoded);

        assert!(matches!(
            Salt::from_base64("not base64!"),
            Err(Error::MalformedCredential(_))
        ));
    }

    #[test]
    fn test_salt_debug_hides_bytes() {
        let salt = Salt::from_bytes(vec![0xAB; 16]).unwrap();
        assert_eq!(format!("{:?}", salt), "Salt([16 bytes])");
    }

    #[test]
    fn test_derived_key_ct_eq() {
        let key = DerivedKey::from_bytes(vec![1, 2, 3, 4]);
        assert!(key.ct_eq(&[1, 2, 3, 4]));
        assert!(!key.ct_eq(&[1, 2, 3, 5]));
        assert!(!key.ct_eq(&[9, 2, 3, 4]));
        assert!(!key.ct_eq(&[1, 2, 3]));
    }

    #[test]
    fn test_derived_key_debug_redacted() {
        let key = DerivedKey::from_bytes(vec![42u8; 32]);
        assert_eq!(format!("{:?}", key), "DerivedKey([REDACTED])");
    }

    /// Statistical check that comparison time does not track the position
    /// of the first differing byte.
    #[test]
    fn test_ct_eq_timing_independent_of_mismatch_position() {
        use std::hint::black_box;
        use std::time::Instant;

        const SAMPLES: usize = 20_000;
        let stored = DerivedKey::from_bytes(vec![0x11; 64]);
        let mut early = vec![0x11; 64];
        early[0] = 0x22;
        let mut late = vec![0x11; 64];
        late[63] = 0x22;

        let time = |candidate: &[u8]| {
            let start = Instant::now();
            for _ in 0..SAMPLES {
                black_box(stored.ct_eq(black_box(candidate)));
            }
            (start.elapsed().as_nanos() as f64).max(1.0)
        };

        // Warm up, then interleave to spread noise evenly.
        time(&early);
        let (mut t_early, mut t_late) = (0.0, 0.0);
        for _ in 0..8 {
            t_early += time(&early);
            t_late += time(&late);
        }

        let ratio = t_early.max(t_late) / t_early.min(t_late);
        // Loose bound for noisy hosts.
        assert!(ratio < 3.0, "timing ratio {:.3} suggests early exit", ratio);
    }
}
