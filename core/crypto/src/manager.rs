//! Credential manager: create, verify and rotate password credentials.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::credential::Credential;
use crate::entropy::{EntropySource, OsEntropy};
use crate::kdf::{derive_key, KdfParams};
use crate::keys::{check_salt_length, Salt, DEFAULT_SALT_LENGTH};
use passkeep_common::{Error, Result};

/// Fresh salts drawn by `rotate` before giving up on a source that keeps
/// repeating the previous salt.
const ROTATE_ATTEMPTS: usize = 4;

/// Stateless password credential manager.
///
/// Cloning is cheap and every operation takes `&self`, so a single manager
/// can be shared across threads. Operations block for the duration of the
/// key derivation; event-driven hosts should use the `*_offloaded`
/// variants.
#[derive(Clone)]
pub struct CredentialManager {
    params: KdfParams,
    salt_length: usize,
    entropy: Arc<dyn EntropySource>,
}

impl CredentialManager {
    /// Create a manager that issues credentials with `params`, drawing
    /// salts from the operating system CSPRNG.
    ///
    /// # Errors
    /// - `InvalidInput` if `params` are invalid
    pub fn new(params: KdfParams) -> Result<Self> {
        Self::with_entropy(params, Arc::new(OsEntropy))
    }

    /// Create a manager with a custom entropy source.
    pub fn with_entropy(params: KdfParams, entropy: Arc<dyn EntropySource>) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            salt_length: DEFAULT_SALT_LENGTH,
            entropy,
        })
    }

    /// Use salts of `salt_length` bytes for new credentials.
    pub fn with_salt_length(mut self, salt_length: usize) -> Result<Self> {
        check_salt_length(salt_length).map_err(Error::InvalidInput)?;
        self.salt_length = salt_length;
        Ok(self)
    }

    /// Parameters applied to new credentials.
    pub fn params(&self) -> &KdfParams {
        &self.params
    }

    /// Salt length applied to new credentials.
    pub fn salt_length(&self) -> usize {
        self.salt_length
    }

    /// Create a credential for a new plaintext secret.
    ///
    /// # Preconditions
    /// - Password policy (e.g. minimum length) is enforced by the caller
    ///
    /// # Postconditions
    /// - The credential carries a fresh salt and the current parameters
    ///
    /// # Errors
    /// - `InvalidInput` if `plaintext` is empty
    /// - `RandomnessUnavailable` if no salt can be drawn
    pub fn create(&self, plaintext: &str) -> Result<Credential> {
        if plaintext.is_empty() {
            return Err(Error::InvalidInput("Password cannot be empty".to_string()));
        }
        let salt = Salt::generate(self.entropy.as_ref(), self.salt_length)?;
        let credential = self.issue(plaintext, &salt)?;
        info!(algorithm = %self.params.algorithm, "Credential created");
        Ok(credential)
    }

    /// Check a candidate plaintext against a stored credential.
    ///
    /// Re-derives with the salt and parameters stored in the credential,
    /// not the manager's current parameters, and compares in constant time.
    ///
    /// # Errors
    /// - `MalformedCredential` if the credential is incomplete or corrupted;
    ///   never reported as a plain mismatch
    pub fn verify(&self, plaintext: &str, credential: &Credential) -> Result<bool> {
        let stored = credential.decode().map_err(|e| {
            warn!(algorithm = %credential.algorithm(), "Rejecting malformed credential");
            e
        })?;

        if plaintext.is_empty() {
            return Ok(false);
        }

        let derived = derive_key(plaintext.as_bytes(), &stored.salt, &stored.params)?;
        let matches = derived.ct_eq(stored.hash.as_bytes());
        debug!(matches, "Credential verified");
        Ok(matches)
    }

    /// Replace a credential after the plaintext secret changed.
    ///
    /// Equivalent to [`CredentialManager::create`] under the current
    /// parameters; the new salt never equals the previous one.
    pub fn rotate(&self, plaintext: &str, previous: &Credential) -> Result<Credential> {
        if plaintext.is_empty() {
            return Err(Error::InvalidInput("Password cannot be empty".to_string()));
        }
        let previous_salt = previous
            .salt
            .as_deref()
            .and_then(|s| Salt::from_base64(s).ok());

        for _ in 0..ROTATE_ATTEMPTS {
            let salt = Salt::generate(self.entropy.as_ref(), self.salt_length)?;
            if previous_salt.as_ref() == Some(&salt) {
                continue;
            }
            let credential = self.issue(plaintext, &salt)?;
            info!(algorithm = %self.params.algorithm, "Credential rotated");
            return Ok(credential);
        }

        Err(Error::RandomnessUnavailable(
            "Entropy source keeps repeating the previous salt".to_string(),
        ))
    }

    /// Whether a credential was issued under parameters other than the
    /// current ones and should be re-issued at the next successful login.
    pub fn needs_upgrade(&self, credential: &Credential) -> bool {
        credential.params != self.params
    }

    fn issue(&self, plaintext: &str, salt: &Salt) -> Result<Credential> {
        let hash = derive_key(plaintext.as_bytes(), salt, &self.params)?;
        Ok(Credential::new(self.params.clone(), salt, &hash))
    }
}

impl fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialManager")
            .field("params", &self.params)
            .field("salt_length", &self.salt_length)
            .finish_non_exhaustive()
    }
}
