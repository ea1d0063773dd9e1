//! Run credential operations on the blocking thread pool.
//!
//! Key derivation deliberately takes milliseconds to seconds of CPU time;
//! running it directly on an async executor thread stalls every other
//! task scheduled there.

use tokio::task;

use crate::credential::Credential;
use crate::manager::CredentialManager;
use passkeep_common::{Error, Result, SecretString};

impl CredentialManager {
    /// [`CredentialManager::create`] on tokio's blocking pool.
    pub async fn create_offloaded(&self, plaintext: SecretString) -> Result<Credential> {
        let manager = self.clone();
        run_blocking(move || manager.create(plaintext.expose())).await
    }

    /// [`CredentialManager::verify`] on tokio's blocking pool.
    pub async fn verify_offloaded(
        &self,
        plaintext: SecretString,
        credential: Credential,
    ) -> Result<bool> {
        let manager = self.clone();
        run_blocking(move || manager.verify(plaintext.expose(), &credential)).await
    }

    /// [`CredentialManager::rotate`] on tokio's blocking pool.
    pub async fn rotate_offloaded(
        &self,
        plaintext: SecretString,
        previous: Credential,
    ) -> Result<Credential> {
        let manager = self.clone();
        run_blocking(move || manager.rotate(plaintext.expose(), &previous)).await
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Crypto(format!("Blocking task failed: {}", e)))?
}
