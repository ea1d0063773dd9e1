//! Stored password credentials.
//!
//! A [`Credential`] is what the persistence layer keeps in place of a
//! plaintext password: the salt, the derived hash, and the parameters that
//! produced them. Salt and hash are optional because records read back
//! from storage may be incomplete; consumers must go through
//! [`Credential::decode`] which turns any such gap into
//! `MalformedCredential`.

use argon2::password_hash::PasswordHash;
use base64::{
    engine::general_purpose::{STANDARD, STANDARD_NO_PAD},
    Engine,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::kdf::{Algorithm, KdfParams};
use crate::keys::{DerivedKey, Salt};
use passkeep_common::{Error, Result};

/// Argon2 version recorded in PHC strings (0x13).
const ARGON2_VERSION: u32 = 19;

/// Salt, derived hash and derivation parameters for one principal.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credential {
    /// Parameters in effect when the credential was created.
    pub params: KdfParams,
    /// Standard base64 salt.
    #[serde(default)]
    pub salt: Option<String>,
    /// Standard base64 derived key.
    #[serde(default)]
    pub secret_hash: Option<String>,
}

/// A credential whose fields have been decoded and checked.
pub struct DecodedCredential {
    pub params: KdfParams,
    pub salt: Salt,
    pub hash: DerivedKey,
}

impl Credential {
    pub(crate) fn new(params: KdfParams, salt: &Salt, hash: &DerivedKey) -> Self {
        Self {
            params,
            salt: Some(salt.to_base64()),
            secret_hash: Some(hash.to_base64()),
        }
    }

    /// Algorithm that produced this credential.
    pub fn algorithm(&self) -> Algorithm {
        self.params.algorithm
    }

    /// Decode and check every field.
    ///
    /// # Errors
    /// - `MalformedCredential` if the salt or hash is absent, not valid
    ///   base64, of the wrong length, or the parameters are unusable
    pub fn decode(&self) -> Result<DecodedCredential> {
        self.params
            .validate()
            .map_err(|e| Error::MalformedCredential(format!("Stored parameters rejected: {}", e)))?;

        let salt = self
            .salt
            .as_deref()
            .ok_or_else(|| Error::MalformedCredential("Salt is missing".to_string()))?;
        let salt = Salt::from_base64(salt)?;

        let hash = self
            .secret_hash
            .as_deref()
            .ok_or_else(|| Error::MalformedCredential("Secret hash is missing".to_string()))?;
        let hash = STANDARD.decode(hash).map_err(|e| {
            Error::MalformedCredential(format!("Secret hash is not valid base64: {}", e))
        })?;
        let hash = DerivedKey::from_bytes(hash);

        if hash.len() != self.params.key_length {
            return Err(Error::MalformedCredential(format!(
                "Secret hash is {} bytes, expected {}",
                hash.len(),
                self.params.key_length
            )));
        }

        Ok(DecodedCredential {
            params: self.params.clone(),
            salt,
            hash,
        })
    }

    /// Encode as a PHC string.
    ///
    /// Argon2id: `$argon2id$v=19$m=<KiB>,t=<iterations>,p=<lanes>$<salt>$<hash>`.
    /// PBKDF2: `$pbkdf2-sha256$i=<iterations>,l=<key length>$<salt>$<hash>`.
    ///
    /// # Errors
    /// - `MalformedCredential` if the credential does not decode
    pub fn to_phc(&self) -> Result<String> {
        let decoded = self.decode()?;
        let p = &decoded.params;
        let params = match p.algorithm {
            Algorithm::Argon2id => format!(
                "v={}$m={},t={},p={}",
                ARGON2_VERSION, p.memory_cost, p.iterations, p.parallelism
            ),
            Algorithm::Pbkdf2Sha256 | Algorithm::Pbkdf2Sha512 | Algorithm::Pbkdf2Sha1 => {
                format!("i={},l={}", p.iterations, p.key_length)
            }
        };
        Ok(format!(
            "${}${}${}${}",
            p.algorithm.id(),
            params,
            STANDARD_NO_PAD.encode(decoded.salt.as_bytes()),
            STANDARD_NO_PAD.encode(decoded.hash.as_bytes()),
        ))
    }

    /// Parse a PHC string produced by [`Credential::to_phc`] or another
    /// implementation using the same algorithm identifiers.
    ///
    /// # Errors
    /// - `MalformedCredential` if the string cannot be parsed, names an
    ///   unknown algorithm, lacks a required parameter, salt or hash, or
    ///   carries costs beyond the accepted caps
    pub fn from_phc(phc: &str) -> Result<Self> {
        let parsed = PasswordHash::new(phc)
            .map_err(|e| Error::MalformedCredential(format!("Invalid PHC string: {}", e)))?;

        let algorithm = Algorithm::from_id(parsed.algorithm.as_str()).ok_or_else(|| {
            Error::MalformedCredential(format!(
                "Unsupported algorithm: {}",
                parsed.algorithm.as_str()
            ))
        })?;

        let param = |name: &str| -> Result<u32> {
            parsed.params.get_decimal(name).ok_or_else(|| {
                Error::MalformedCredential(format!("Missing parameter '{}'", name))
            })
        };

        let salt = parsed
            .salt
            .ok_or_else(|| Error::MalformedCredential("Salt is missing".to_string()))?;
        let salt = STANDARD_NO_PAD
            .decode(salt.as_str())
            .map_err(|e| Error::MalformedCredential(format!("Salt is not valid base64: {}", e)))?;
        let salt = Salt::from_bytes(salt)?;

        let hash = parsed
            .hash
            .ok_or_else(|| Error::MalformedCredential("Secret hash is missing".to_string()))?;
        let hash = DerivedKey::from_bytes(hash.as_bytes().to_vec());

        let params = match algorithm {
            Algorithm::Argon2id => {
                if let Some(version) = parsed.version {
                    if version != ARGON2_VERSION {
                        return Err(Error::MalformedCredential(format!(
                            "Unsupported Argon2 version: {}",
                            version
                        )));
                    }
                }
                KdfParams::argon2id(param("m")?, param("t")?, param("p")?)
                    .with_key_length(hash.len())
            }
            Algorithm::Pbkdf2Sha256 | Algorithm::Pbkdf2Sha512 | Algorithm::Pbkdf2Sha1 => {
                let key_length = param("l")? as usize;
                if key_length != hash.len() {
                    return Err(Error::MalformedCredential(format!(
                        "Secret hash is {} bytes, expected {}",
                        hash.len(),
                        key_length
                    )));
                }
                let iterations = param("i")?;
                let base = match algorithm {
                    Algorithm::Pbkdf2Sha256 => KdfParams::pbkdf2_sha256(iterations),
                    Algorithm::Pbkdf2Sha512 => KdfParams::pbkdf2_sha512(iterations),
                    _ => KdfParams::pbkdf2_sha1(iterations),
                };
                base.with_key_length(key_length)
            }
        };

        let credential = Self::new(params, &salt, &hash);
        credential.decode()?;
        Ok(credential)
    }

    /// Serialize to JSON for storage.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from stored JSON.
    ///
    /// Missing salt or hash fields are accepted here and reported by
    /// [`Credential::decode`].
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("params", &self.params)
            .field("salt", &self.salt.as_ref().map(|_| "[REDACTED]"))
            .field("secret_hash", &self.secret_hash.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
