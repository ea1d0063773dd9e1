//! Common utilities and types shared across PassKeep modules.
//!
//! This module provides the error taxonomy used by every crate in the
//! workspace and the plaintext secret wrapper that keeps passwords out of
//! logs and zeroizes them on drop.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::SecretString;
