//! OS keyring-backed credential storage implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keyring::Entry;

use super::{CredentialStore, Secret, StoreError};
use crate::model::CredentialRecord;

/// Keyring user name under which the record is kept.
const ENTRY_USER: &str = "oauth-credentials";

/// OS keyring-backed credential store.
///
/// This store uses the platform's native keyring service:
/// - macOS: Keychain
/// - Linux: Secret Service API (via libsecret)
/// - Windows: Credential Manager
///
/// The whole [`CredentialRecord`] is serialized as one JSON document in a
/// single entry, so each `save` replaces all fields at once.
pub struct KeyringStore {
    service_name: String,
}

impl KeyringStore {
    /// Try to create a new keyring store.
    ///
    /// Returns an error if the keyring backend is not available on this platform.
    pub fn try_new(service_name: &str) -> Result<Self, StoreError> {
        match Entry::new(service_name, ENTRY_USER) {
            Ok(_) => Ok(Self {
                service_name: service_name.to_string(),
            }),
            Err(e) => Err(StoreError::KeyringUnavailable {
                message: format!("keyring backend not available: {}", e),
            }),
        }
    }

    fn entry(&self) -> Result<Entry, StoreError> {
        Entry::new(&self.service_name, ENTRY_USER).map_err(|e| StoreError::BackendError {
            message: format!("failed to create keyring entry: {}", e),
        })
    }
}

impl std::fmt::Debug for KeyringStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyringStore")
            .field("service_name", &self.service_name)
            .finish()
    }
}

#[async_trait]
impl CredentialStore for KeyringStore {
    async fn load(&self) -> Result<Option<CredentialRecord>, StoreError> {
        let entry = self.entry()?;

        match entry.get_password() {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(keyring::Error::PlatformFailure(e)) => Err(StoreError::BackendError {
                message: format!("platform keyring failure: {}", e),
            }),
            Err(e) => Err(StoreError::BackendError {
                message: format!("keyring error: {}", e),
            }),
        }
    }

    async fn save(
        &self,
        access_token: &Secret,
        refresh_token: &Secret,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut record =
            CredentialRecord::new(access_token.clone(), refresh_token.clone(), expires_at);
        if let Some(existing) = self.load().await? {
            record.created_at = existing.created_at;
        }

        let json = Secret::new(serde_json::to_string(&record)?);
        self.entry()?
            .set_password(json.expose())
            .map_err(|e| StoreError::BackendError {
                message: format!("failed to set keyring password: {}", e),
            })
    }
}
