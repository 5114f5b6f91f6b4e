//! OS keyring medium. Feature-gated behind `system-keyring`.

use async_trait::async_trait;
use tracing::instrument;

use crate::error::{AuthError, Result};

use super::KeyValueStore;

/// Stores each key as a keyring entry under one service name.
#[derive(Debug, Clone)]
pub struct KeyringKeyValueStore {
    service: String,
}

impl Default for KeyringKeyValueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyringKeyValueStore {
    const SERVICE_NAME: &str = "auth-session";

    pub fn new() -> Self {
        Self {
            service: Self::SERVICE_NAME.to_string(),
        }
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Check if the system keyring is usable.
    pub fn is_available() -> bool {
        match keyring::Entry::new(Self::SERVICE_NAME, "availability-check") {
            Ok(entry) => match entry.get_password() {
                Ok(_) | Err(keyring::Error::NoEntry) => true,
                Err(keyring::Error::NoStorageAccess(_)) | Err(keyring::Error::PlatformFailure(_)) => {
                    false
                }
                Err(_) => true,
            },
            Err(_) => false,
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, key)
            .map_err(|e| AuthError::storage(format!("Failed to create keyring entry: {e}")))
    }
}

#[async_trait]
impl KeyValueStore for KeyringKeyValueStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(AuthError::storage(format!("Keyring error: {e}"))),
        }
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .map_err(|e| AuthError::storage(format!("Keyring error: {e}")))
    }

    #[instrument(skip(self))]
    async fn remove(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(AuthError::storage(format!("Keyring error: {e}"))),
        }
    }

    fn name(&self) -> &str {
        "keyring"
    }
}
