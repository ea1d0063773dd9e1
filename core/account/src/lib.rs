//! User accounts backed by PassKeep credentials.
//!
//! A [`User`] is the principal record: profile fields, the validators that
//! guard them, and the hooks that hand password changes and login checks
//! to a [`passkeep_crypto::CredentialManager`]. Storage keeps the
//! credential verbatim; the public representation never exposes it.

pub mod config;
pub mod policy;
pub mod role;
pub mod user;

pub use config::AuthConfig;
pub use policy::PasswordPolicy;
pub use role::Role;
pub use user::{PublicUser, User};
