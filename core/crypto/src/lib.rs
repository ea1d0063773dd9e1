//! Password credential primitives for PassKeep.
//!
//! This module provides:
//! - Salt generation from a pluggable secure entropy source
//! - Key derivation using Argon2id, with PBKDF2 kept for older credentials
//! - Stored credentials carrying their own derivation parameters
//! - Constant-time verification through [`CredentialManager`]
//! - PHC string encoding for portable credentials
//!
//! # Security Guarantees
//! - Derived key material is zeroized on drop
//! - No plaintext, salt or hash is ever logged
//! - Hash comparison runs in constant time

pub mod credential;
pub mod entropy;
pub mod kdf;
pub mod keys;
pub mod manager;
mod offload;

pub use credential::{Credential, DecodedCredential};
pub use entropy::{EntropySource, OsEntropy};
pub use kdf::{derive_key, Algorithm, KdfParams};
pub use keys::{DerivedKey, Salt, DEFAULT_SALT_LENGTH, MAX_SALT_LENGTH, MIN_SALT_LENGTH};
pub use manager::CredentialManager;
