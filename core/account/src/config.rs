//! Authentication configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::policy::PasswordPolicy;
use passkeep_common::{Error, Result};
use passkeep_crypto::{CredentialManager, KdfParams, DEFAULT_SALT_LENGTH};

/// Deployment-wide settings for issuing and checking credentials.
///
/// Parameters here only apply to credentials issued from now on; existing
/// credentials keep the parameters recorded with them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Key derivation parameters for new credentials.
    pub kdf: KdfParams,
    /// Salt length in bytes for new credentials.
    pub salt_length: usize,
    /// Rules for new passwords.
    pub password_policy: PasswordPolicy,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            kdf: KdfParams::interactive(),
            salt_length: DEFAULT_SALT_LENGTH,
            password_policy: PasswordPolicy::default(),
        }
    }
}

impl AuthConfig {
    /// Check that a credential manager can be built from this config.
    pub fn validate(&self) -> Result<()> {
        self.credential_manager().map(|_| ())
    }

    /// Build the credential manager described by this config.
    ///
    /// # Errors
    /// - `InvalidInput` if the KDF parameters or salt length are invalid
    pub fn credential_manager(&self) -> Result<CredentialManager> {
        CredentialManager::new(self.kdf.clone())?.with_salt_length(self.salt_length)
    }

    /// Serialize configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize configuration from JSON and validate it.
    ///
    /// Omitted fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Write configuration to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
