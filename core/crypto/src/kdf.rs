//! Password key derivation.
//!
//! New credentials use Argon2id, a memory-hard password hashing function
//! that resists both GPU and time-memory trade-off attacks. PBKDF2 with
//! HMAC-SHA-256/512 stays available so that iteration-hard credentials
//! issued by older deployments can still be verified, and PBKDF2 with
//! HMAC-SHA-1 covers the oldest records of all.
//!
//! Stored parameters are untrusted input, so every cost is capped before
//! any derivation runs.

use argon2::{Argon2, Params, Version};
use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use std::fmt;
use tracing::debug;

use crate::keys::{DerivedKey, Salt};
use passkeep_common::{Error, Result};

/// Smallest accepted derived key, in bytes.
pub const MIN_KEY_LENGTH: usize = 16;

/// Largest accepted derived key, in bytes. Bounded by the PHC string format.
pub const MAX_KEY_LENGTH: usize = 64;

/// Largest accepted PBKDF2 round count.
pub const MAX_PBKDF2_ITERATIONS: u32 = 10_000_000;

/// Largest accepted Argon2 time cost.
pub const MAX_TIME_COST: u32 = 64;

/// Largest accepted Argon2 memory cost, in KiB (4 GiB).
pub const MAX_MEMORY_COST: u32 = 4 * 1024 * 1024;

/// Largest accepted Argon2 degree of parallelism.
pub const MAX_PARALLELISM: u32 = 64;

/// Key derivation algorithm recorded with every credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    #[serde(rename = "argon2id")]
    Argon2id,
    #[serde(rename = "pbkdf2-sha256")]
    Pbkdf2Sha256,
    #[serde(rename = "pbkdf2-sha512")]
    Pbkdf2Sha512,
    #[serde(rename = "pbkdf2-sha1")]
    Pbkdf2Sha1,
}

impl Algorithm {
    /// Identifier used in stored credentials and PHC strings.
    pub fn id(&self) -> &'static str {
        match self {
            Algorithm::Argon2id => "argon2id",
            Algorithm::Pbkdf2Sha256 => "pbkdf2-sha256",
            Algorithm::Pbkdf2Sha512 => "pbkdf2-sha512",
            Algorithm::Pbkdf2Sha1 => "pbkdf2-sha1",
        }
    }

    /// Look up an algorithm by identifier.
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "argon2id" => Some(Algorithm::Argon2id),
            "pbkdf2-sha256" => Some(Algorithm::Pbkdf2Sha256),
            "pbkdf2-sha512" => Some(Algorithm::Pbkdf2Sha512),
            "pbkdf2-sha1" => Some(Algorithm::Pbkdf2Sha1),
            _ => None,
        }
    }

    /// Whether the memory and parallelism costs apply.
    pub fn is_memory_hard(&self) -> bool {
        matches!(self, Algorithm::Argon2id)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Parameters for key derivation, stored alongside each credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Derivation algorithm.
    pub algorithm: Algorithm,
    /// Number of iterations (Argon2 time cost, or PBKDF2 rounds).
    pub iterations: u32,
    /// Memory cost in KiB (e.g., 65536 = 64 MiB). Zero for PBKDF2.
    pub memory_cost: u32,
    /// Degree of parallelism. One for PBKDF2.
    pub parallelism: u32,
    /// Derived key length in bytes.
    pub key_length: usize,
}

impl KdfParams {
    /// Create parameters suitable for interactive use.
    ///
    /// These parameters provide a balance between security and usability,
    /// targeting approximately 0.5-1 second of derivation time.
    pub fn interactive() -> Self {
        Self::argon2id(65536, 3, 4) // 64 MiB
    }

    /// Create parameters suitable for sensitive data.
    ///
    /// Higher security parameters that may take several seconds.
    pub fn sensitive() -> Self {
        Self::argon2id(262144, 4, 4) // 256 MiB
    }

    /// Create moderate parameters for constrained hosts.
    pub fn moderate() -> Self {
        Self::argon2id(32768, 3, 2) // 32 MiB
    }

    /// PBKDF2-HMAC-SHA1 with 10 000 rounds and a 64-byte key.
    ///
    /// Matches credentials issued by older deployments; not recommended for
    /// new credentials.
    pub fn legacy() -> Self {
        Self::pbkdf2_sha1(10_000)
    }

    /// Argon2id parameters with a 32-byte key.
    pub fn argon2id(memory_cost: u32, time_cost: u32, parallelism: u32) -> Self {
        Self {
            algorithm: Algorithm::Argon2id,
            iterations: time_cost,
            memory_cost,
            parallelism,
            key_length: 32,
        }
    }

    /// PBKDF2-HMAC-SHA256 parameters with a 32-byte key.
    pub fn pbkdf2_sha256(iterations: u32) -> Self {
        Self {
            algorithm: Algorithm::Pbkdf2Sha256,
            iterations,
            memory_cost: 0,
            parallelism: 1,
            key_length: 32,
        }
    }

    /// PBKDF2-HMAC-SHA512 parameters with a 64-byte key.
    pub fn pbkdf2_sha512(iterations: u32) -> Self {
        Self {
            algorithm: Algorithm::Pbkdf2Sha512,
            iterations,
            memory_cost: 0,
            parallelism: 1,
            key_length: 64,
        }
    }

    /// PBKDF2-HMAC-SHA1 parameters with a 64-byte key.
    pub fn pbkdf2_sha1(iterations: u32) -> Self {
        Self {
            algorithm: Algorithm::Pbkdf2Sha1,
            iterations,
            memory_cost: 0,
            parallelism: 1,
            key_length: 64,
        }
    }

    /// Override the derived key length.
    pub fn with_key_length(mut self, key_length: usize) -> Self {
        self.key_length = key_length;
        self
    }

    /// Check that these parameters can drive a derivation.
    ///
    /// # Errors
    /// - `InvalidInput` if the iteration count is zero, any cost exceeds
    ///   its cap, the key length is out of range, or the Argon2 costs are
    ///   rejected by the backend
    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(Error::InvalidInput(
                "Iteration count must be at least 1".to_string(),
            ));
        }
        let max_iterations = if self.algorithm.is_memory_hard() {
            MAX_TIME_COST
        } else {
            MAX_PBKDF2_ITERATIONS
        };
        if self.iterations > max_iterations {
            return Err(Error::InvalidInput(format!(
                "Iteration count must be at most {}, got {}",
                max_iterations, self.iterations
            )));
        }
        if !(MIN_KEY_LENGTH..=MAX_KEY_LENGTH).contains(&self.key_length) {
            return Err(Error::InvalidInput(format!(
                "Key length must be between {} and {} bytes, got {}",
                MIN_KEY_LENGTH, MAX_KEY_LENGTH, self.key_length
            )));
        }
        if self.algorithm.is_memory_hard() {
            if self.memory_cost > MAX_MEMORY_COST {
                return Err(Error::InvalidInput(format!(
                    "Memory cost must be at most {} KiB, got {}",
                    MAX_MEMORY_COST, self.memory_cost
                )));
            }
            if self.parallelism > MAX_PARALLELISM {
                return Err(Error::InvalidInput(format!(
                    "Parallelism must be at most {}, got {}",
                    MAX_PARALLELISM, self.parallelism
                )));
            }
            self.argon2_params()?;
        }
        Ok(())
    }

    fn argon2_params(&self) -> Result<Params> {
        Params::new(
            self.memory_cost,
            self.iterations,
            self.parallelism,
            Some(self.key_length),
        )
        .map_err(|e| Error::InvalidInput(format!("Invalid KDF parameters: {}", e)))
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::interactive()
    }
}

/// Derive key material from a password and salt.
///
/// # Preconditions
/// - `password` must not be empty
/// - `params` must pass [`KdfParams::validate`]
///
/// # Postconditions
/// - Returns exactly `params.key_length` bytes
/// - The derived key is deterministic given the same inputs
///
/// # Errors
/// - `InvalidInput` if password is empty or the parameters are invalid
/// - `Crypto` if the backend fails
///
/// # Security
/// - Password is not stored or logged
/// - Derived key memory is zeroized on drop
pub fn derive_key(password: &[u8], salt: &Salt, params: &KdfParams) -> Result<DerivedKey> {
    if password.is_empty() {
        return Err(Error::InvalidInput("Password cannot be empty".to_string()));
    }
    params.validate()?;

    debug!(
        algorithm = %params.algorithm,
        iterations = params.iterations,
        memory_cost = params.memory_cost,
        "Deriving key"
    );

    let mut key = DerivedKey::from_bytes(vec![0u8; params.key_length]);
    let out = key.as_mut_bytes();

    match params.algorithm {
        Algorithm::Argon2id => {
            let argon2 = Argon2::new(
                argon2::Algorithm::Argon2id,
                Version::V0x13,
                params.argon2_params()?,
            );
            argon2
                .hash_password_into(password, salt.as_bytes(), out)
                .map_err(|e| Error::Crypto(format!("Key derivation failed: {}", e)))?;
        }
        Algorithm::Pbkdf2Sha256 => {
            pbkdf2_hmac::<Sha256>(password, salt.as_bytes(), params.iterations, out);
        }
        Algorithm::Pbkdf2Sha512 => {
            pbkdf2_hmac::<Sha512>(password, salt.as_bytes(), params.iterations, out);
        }
        Algorithm::Pbkdf2Sha1 => {
            pbkdf2_hmac::<Sha1>(password, salt.as_bytes(), params.iterations, out);
        }
    }

    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_argon2() -> KdfParams {
        KdfParams::argon2id(1024, 1, 1)
    }

    fn salt(byte: u8) -> Salt {
        Salt::from_bytes(vec![byte; 16]).unwrap()
    }

    #[test]
    fn test_derive_key_deterministic() {
        let password = b"test-password-123";
        let params = fast_argon2();

        let key1 = derive_key(password, &salt(42), &params).unwrap();
        let key2 = derive_key(password, &salt(42), &params).unwrap();

        assert_eq!(key1.as_bytes(), key2.as_bytes());
        assert_eq!(key1.len(), 32);
    }

    #[test]
    fn test_derive_key_different_salt() {
        let password = b"test-password-123";
        let params = fast_argon2();

        let key1 = derive_key(password, &salt(1), &params).unwrap();
        let key2 = derive_key(password, &salt(2), &params).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_different_password() {
        let params = fast_argon2();

        let key1 = derive_key(b"password1", &salt(42), &params).unwrap();
        let key2 = derive_key(b"password2", &salt(42), &params).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_empty_password_fails() {
        let err = derive_key(b"", &salt(42), &fast_argon2()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_pbkdf2_iterations_matter() {
        let s = salt(5);
        let key1 = derive_key(b"password123", &s, &KdfParams::pbkdf2_sha256(10)).unwrap();
        let key2 = derive_key(b"password123", &s, &KdfParams::pbkdf2_sha256(10)).unwrap();
        let key3 = derive_key(b"password123", &s, &KdfParams::pbkdf2_sha256(11)).unwrap();

        assert_eq!(key1.as_bytes(), key2.as_bytes());
        assert_ne!(key1.as_bytes(), key3.as_bytes());
    }

    #[test]
    fn test_legacy_params() {
        let legacy = KdfParams::legacy();
        assert_eq!(legacy.algorithm, Algorithm::Pbkdf2Sha1);
        assert_eq!(legacy.key_length, 64);
        assert_eq!(legacy.iterations, 10_000);

        let key = derive_key(b"password123", &salt(3), &KdfParams::pbkdf2_sha1(10)).unwrap();
        assert_eq!(key.len(), 64);
    }

    #[test]
    fn test_legacy_known_answer() {
        // Record issued by the previous deployment for "password123" with
        // salt bytes 0..16.
        let s = Salt::from_bytes((0u8..16).collect()).unwrap();
        let key = derive_key(b"password123", &s, &KdfParams::legacy()).unwrap();
        assert_eq!(
            key.to_base64(),
            "IDF0mL9MOv3zfVuD9anTN3gGsvDmOFB5f2Qf8tqb4hRnOmI8lVUj7e4tjt3CAPDmljaR9L6nQ6YyHUxZI/QqjQ=="
        );
    }

    #[test]
    fn test_pbkdf2_sha1_rfc6070() {
        let s = Salt::from_bytes(b"saltSALTsaltSALTsaltSALTsaltSALTsalt".to_vec()).unwrap();
        let params = KdfParams::pbkdf2_sha1(4096).with_key_length(25);
        let key = derive_key(b"passwordPASSWORDpassword", &s, &params).unwrap();
        let hex: String = key.as_bytes().iter().map(|b| format!("{:02x}", b)).collect();
        assert_eq!(hex, "3d2eec4fe41c849b80c8d83662c0e44a8b291a964cf2f07038");
    }

    #[test]
    fn test_algorithms_disagree() {
        let s = salt(9);
        let a = derive_key(b"password123", &s, &KdfParams::pbkdf2_sha256(10)).unwrap();
        let b = derive_key(
            b"password123",
            &s,
            &KdfParams::pbkdf2_sha512(10).with_key_length(32),
        )
        .unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_validate_rejects_bad_params() {
        assert!(KdfParams::pbkdf2_sha256(0).validate().is_err());
        assert!(KdfParams::pbkdf2_sha256(1).with_key_length(8).validate().is_err());
        assert!(KdfParams::pbkdf2_sha256(1).with_key_length(65).validate().is_err());
        // Argon2 requires at least 8 KiB per lane.
        assert!(KdfParams::argon2id(4, 1, 1).validate().is_err());
        assert!(KdfParams::interactive().validate().is_ok());
        assert!(KdfParams::legacy().validate().is_ok());
        assert!(KdfParams::sensitive().validate().is_ok());
    }

    #[test]
    fn test_validate_caps_costs() {
        assert!(KdfParams::pbkdf2_sha256(MAX_PBKDF2_ITERATIONS).validate().is_ok());
        assert!(KdfParams::pbkdf2_sha1(MAX_PBKDF2_ITERATIONS + 1).validate().is_err());
        assert!(KdfParams::pbkdf2_sha512(u32::MAX).validate().is_err());
        assert!(KdfParams::argon2id(8192, u32::MAX, 1).validate().is_err());
        assert!(KdfParams::argon2id(u32::MAX, 1, 1).validate().is_err());
        assert!(KdfParams::argon2id(MAX_MEMORY_COST + 1, 1, 1).validate().is_err());
        assert!(KdfParams::argon2id(65536, 1, u32::MAX).validate().is_err());
    }

    #[test]
    fn test_algorithm_ids() {
        for alg in [
            Algorithm::Argon2id,
            Algorithm::Pbkdf2Sha256,
            Algorithm::Pbkdf2Sha512,
            Algorithm::Pbkdf2Sha1,
        ] {
            assert_eq!(Algorithm::from_id(alg.id()), Some(alg));
        }
        assert_eq!(Algorithm::from_id("md5"), None);
    }

    #[test]
    fn test_params_serde_names() {
        let json = serde_json::to_value(KdfParams::legacy()).unwrap();
        assert_eq!(json["algorithm"], "pbkdf2-sha1");
        assert_eq!(json["iterations"], 10_000);
    }
}
