//! Common error types for PassKeep.

use thiserror::Error;

/// Top-level error type for PassKeep operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller-correctable input problem, e.g. an empty password.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The secure random source could not produce bytes.
    #[error("Randomness unavailable: {0}")]
    RandomnessUnavailable(String),

    /// A stored credential is incomplete or has an unexpected shape.
    #[error("Malformed credential: {0}")]
    MalformedCredential(String),

    /// Key derivation backend failed.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether a failed login caused by this error should be shown to the
    /// end user as a plain authentication failure.
    ///
    /// Malformed credentials point at corruption or an upstream bug and
    /// must be surfaced as such.
    pub fn is_authentication_failure(&self) -> bool {
        !matches!(self, Error::MalformedCredential(_))
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
