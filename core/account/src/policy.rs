//! Password policy applied before a secret reaches the credential manager.

use serde::{Deserialize, Serialize};

use passkeep_common::{Error, Result};

/// Default minimum password length, in characters.
pub const DEFAULT_MIN_LENGTH: usize = 8;

/// Rules a new password must satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordPolicy {
    /// Minimum length in characters.
    pub min_length: usize,
}

impl PasswordPolicy {
    /// Check a candidate password.
    ///
    /// # Errors
    /// - `InvalidInput` with a user-presentable message if the password is
    ///   too short
    pub fn check(&self, plaintext: &str) -> Result<()> {
        if plaintext.chars().count() < self.min_length {
            return Err(Error::InvalidInput(format!(
                "Password must be at least {} characters long!",
                self.min_length
            )));
        }
        Ok(())
    }
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_LENGTH,
        }
    }
}
