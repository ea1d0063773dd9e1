//! The user principal record.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::{debug, info};

use crate::policy::PasswordPolicy;
use crate::role::Role;
use passkeep_common::{Error, Result};
use passkeep_crypto::{Credential, CredentialManager};

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r".+@.+\..+").expect("email pattern is valid"));

/// A user account.
///
/// Fields are private so that every mutation passes through the
/// validators. The storage representation (`to_storage_json`) carries the
/// credential; the public representation ([`PublicUser`]) never does.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    email: Option<String>,
    username: String,
    #[serde(default)]
    credential: Option<Credential>,
    provider: String,
    #[serde(default)]
    provider_id: Option<String>,
    #[serde(default = "Utc::now")]
    created: DateTime<Utc>,
    #[serde(default)]
    role: Option<Role>,
}

/// External representation of a user, safe to hand to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<&'a str>,
    pub username: &'a str,
    pub provider: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<&'a str>,
    pub created: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub has_password: bool,
}

impl User {
    /// Create a user without a password.
    ///
    /// # Errors
    /// - `InvalidInput` if the trimmed username or the provider is empty
    pub fn new(username: &str, provider: &str) -> Result<Self> {
        let user = Self {
            first_name: String::new(),
            last_name: String::new(),
            email: None,
            username: username.trim().to_string(),
            credential: None,
            provider: provider.to_string(),
            provider_id: None,
            created: Utc::now(),
            role: None,
        };
        user.validate()?;
        Ok(user)
    }

    pub fn with_name(mut self, first_name: &str, last_name: &str) -> Self {
        self.first_name = first_name.to_string();
        self.last_name = last_name.to_string();
        self
    }

    /// Set the email address. An empty address clears it.
    ///
    /// # Errors
    /// - `InvalidInput` if the address does not look like `a@b.c`
    pub fn with_email(mut self, email: &str) -> Result<Self> {
        if email.is_empty() {
            self.email = None;
            return Ok(self);
        }
        check_email(email)?;
        self.email = Some(email.to_string());
        Ok(self)
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_provider_id(mut self, provider_id: &str) -> Self {
        self.provider_id = Some(provider_id.to_string());
        self
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn provider_id(&self) -> Option<&str> {
        self.provider_id.as_deref()
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    /// Stored credential, for the persistence layer.
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// Whether the user can log in with a password.
    pub fn has_password(&self) -> bool {
        self.credential.is_some()
    }

    /// Set or change the password.
    ///
    /// The first password creates a credential; later ones rotate it, so
    /// each change gets a brand-new salt.
    ///
    /// # Errors
    /// - `InvalidInput` if the password violates `policy`
    /// - Any error from the credential manager
    pub fn set_password(
        &mut self,
        manager: &CredentialManager,
        policy: &PasswordPolicy,
        plaintext: &str,
    ) -> Result<()> {
        policy.check(plaintext)?;
        let credential = match &self.credential {
            Some(previous) => manager.rotate(plaintext, previous)?,
            None => manager.create(plaintext)?,
        };
        self.credential = Some(credential);
        info!(username = %self.username, "Password set");
        Ok(())
    }

    /// Check a login attempt.
    ///
    /// Users without a password (e.g. registered through an external
    /// provider) never authenticate by password.
    ///
    /// # Errors
    /// - `MalformedCredential` if the stored credential is corrupted
    pub fn authenticate(&self, manager: &CredentialManager, plaintext: &str) -> Result<bool> {
        let Some(credential) = &self.credential else {
            debug!(username = %self.username, "No password credential");
            return Ok(false);
        };
        let matches = manager.verify(plaintext, credential)?;
        debug!(username = %self.username, matches, "Password checked");
        Ok(matches)
    }

    /// Check a login attempt and, when it succeeds with a credential issued
    /// under outdated parameters, re-issue it under the current ones.
    ///
    /// Returns whether the password matched. The caller persists the user
    /// when [`User::credential`] changed.
    pub fn authenticate_and_upgrade(
        &mut self,
        manager: &CredentialManager,
        plaintext: &str,
    ) -> Result<bool> {
        if !self.authenticate(manager, plaintext)? {
            return Ok(false);
        }
        if let Some(previous) = &self.credential {
            if manager.needs_upgrade(previous) {
                let upgraded = manager.rotate(plaintext, previous)?;
                self.credential = Some(upgraded);
                info!(username = %self.username, "Credential upgraded to current parameters");
            }
        }
        Ok(true)
    }

    /// Re-check every field validator.
    pub fn validate(&self) -> Result<()> {
        if self.username.is_empty() {
            return Err(Error::InvalidInput("Username is required".to_string()));
        }
        if self.username != self.username.trim() {
            return Err(Error::InvalidInput(
                "Username must not have surrounding whitespace".to_string(),
            ));
        }
        if self.provider.is_empty() {
            return Err(Error::InvalidInput("Provider is required.".to_string()));
        }
        // Stored records may carry an empty address in place of none.
        if let Some(email) = self.email.as_deref().filter(|e| !e.is_empty()) {
            check_email(email)?;
        }
        Ok(())
    }

    /// External representation without any credential material.
    pub fn to_public(&self) -> PublicUser<'_> {
        PublicUser {
            first_name: &self.first_name,
            last_name: &self.last_name,
            email: self.email.as_deref(),
            username: &self.username,
            provider: &self.provider,
            provider_id: self.provider_id.as_deref(),
            created: self.created,
            role: self.role,
            has_password: self.has_password(),
        }
    }

    /// Serialize the external representation to JSON.
    pub fn to_public_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.to_public())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Serialize for storage, credential included.
    pub fn to_storage_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a stored user and re-check its fields.
    pub fn from_storage_json(json: &str) -> Result<Self> {
        let user: Self =
            serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))?;
        user.validate()?;
        Ok(user)
    }
}

fn check_email(email: &str) -> Result<()> {
    if !EMAIL_PATTERN.is_match(email) {
        return Err(Error::InvalidInput(format!(
            "Invalid email address: {}",
            email
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use passkeep_crypto::KdfParams;

    fn manager() -> CredentialManager {
        CredentialManager::new(KdfParams::argon2id(1024, 1, 1)).unwrap()
    }

    fn user_with_password(password: &str) -> User {
        let mut user = User::new("ada", "local").unwrap();
        user.set_password(&manager(), &PasswordPolicy::default(), password)
            .unwrap();
        user
    }

    #[test]
    fn test_username_is_trimmed_and_required() {
        let user = User::new("  ada  ", "local").unwrap();
        assert_eq!(user.username(), "ada");

        let err = User::new("   ", "local").unwrap_err();
        assert_eq!(err.to_string(), "Invalid input: Username is required");
    }

    #[test]
    fn test_provider_required() {
        let err = User::new("ada", "").unwrap_err();
        assert_eq!(err.to_string(), "Invalid input: Provider is required.");
    }

    #[test]
    fn test_email_pattern() {
        let user = User::new("ada", "local").unwrap();
        assert!(user.clone().with_email("ada@example.com").is_ok());
        assert!(user.clone().with_email("ada@example").is_err());
        assert!(user.clone().with_email("ada.example.com").is_err());
        assert!(user.clone().with_email(" ").is_err());

        let cleared = user.with_email("ada@example.com").unwrap().with_email("").unwrap();
        assert_eq!(cleared.email(), None);
        assert!(cleared.validate().is_ok());
    }

    #[test]
    fn test_stored_empty_email_accepted() {
        let json = r#"{"username":"ada","provider":"local","email":""}"#;
        let user = User::from_storage_json(json).unwrap();
        assert!(user.validate().is_ok());

        let json = r#"{"username":"ada","provider":"local","email":"ada"}"#;
        assert!(matches!(
            User::from_storage_json(json),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_set_password_and_authenticate() {
        let manager = manager();
        let user = user_with_password("password123");

        assert!(user.has_password());
        assert!(user.authenticate(&manager, "password123").unwrap());
        assert!(!user.authenticate(&manager, "password124").unwrap());
    }

    #[test]
    fn test_short_password_rejected() {
        let mut user = User::new("ada", "local").unwrap();
        let err = user
            .set_password(&manager(), &PasswordPolicy::default(), "short")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid input: Password must be at least 8 characters long!"
        );
        assert!(!user.has_password());
    }

    #[test]
    fn test_password_change_rotates_salt() {
        let manager = manager();
        let mut user = user_with_password("password123");
        let first_salt = user.credential().unwrap().salt.clone();

        user.set_password(&manager, &PasswordPolicy::default(), "password456")
            .unwrap();

        assert_ne!(user.credential().unwrap().salt, first_salt);
        assert!(!user.authenticate(&manager, "password123").unwrap());
        assert!(user.authenticate(&manager, "password456").unwrap());
    }

    #[test]
    fn test_oauth_user_cannot_password_login() {
        let user = User::new("ada", "github")
            .unwrap()
            .with_provider_id("12345");
        assert!(!user.authenticate(&manager(), "password123").unwrap());
    }

    #[test]
    fn test_corrupted_credential_is_an_error() {
        let mut user = user_with_password("password123");
        if let Some(credential) = user.credential.as_mut() {
            credential.salt = None;
        }
        let err = user.authenticate(&manager(), "password123").unwrap_err();
        assert!(matches!(err, Error::MalformedCredential(_)));
        assert!(!err.is_authentication_failure());
    }

    #[test]
    fn test_authenticate_and_upgrade() {
        let legacy = CredentialManager::new(KdfParams::pbkdf2_sha512(100)).unwrap();
        let current = manager();

        let mut user = User::new("ada", "local").unwrap();
        user.set_password(&legacy, &PasswordPolicy::default(), "password123")
            .unwrap();

        assert!(!user.authenticate_and_upgrade(&current, "wrong-password").unwrap());
        assert!(current.needs_upgrade(user.credential().unwrap()));

        assert!(user.authenticate_and_upgrade(&current, "password123").unwrap());
        assert!(!current.needs_upgrade(user.credential().unwrap()));
        assert!(user.authenticate(&current, "password123").unwrap());
    }

    #[test]
    fn test_public_json_has_no_credential_material() {
        let user = user_with_password("password123")
            .with_name("Ada", "Lovelace")
            .with_email("ada@example.com")
            .unwrap()
            .with_role(Role::Owner);

        let json = user.to_public_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let object = value.as_object().unwrap();

        for key in ["salt", "secret_hash", "secretHash", "credential", "password"] {
            assert!(!object.contains_key(key), "public JSON exposes {}", key);
        }
        assert!(!json.contains(user.credential().unwrap().salt.as_deref().unwrap()));
        assert_eq!(object["firstName"], "Ada");
        assert_eq!(object["role"], "Owner");
        assert_eq!(object["hasPassword"], true);
    }

    #[test]
    fn test_storage_roundtrip_keeps_credential() {
        let manager = manager();
        let user = user_with_password("password123").with_role(Role::Admin);

        let json = user.to_storage_json().unwrap();
        assert!(json.contains("secret_hash"));

        let restored = User::from_storage_json(&json).unwrap();
        assert_eq!(restored.username(), "ada");
        assert_eq!(restored.role(), Some(Role::Admin));
        assert_eq!(restored.created(), user.created());
        assert!(restored.authenticate(&manager, "password123").unwrap());
    }

    #[test]
    fn test_storage_rejects_invalid_records() {
        let json = r#"{"username": "ada", "provider": "local", "email": "nope"}"#;
        assert!(matches!(
            User::from_storage_json(json),
            Err(Error::InvalidInput(_))
        ));

        let json = r#"{"username": "ada"}"#;
        assert!(matches!(
            User::from_storage_json(json),
            Err(Error::Serialization(_))
        ));
    }
}
