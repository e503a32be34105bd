//! In-memory credential storage implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::RwLock;

use super::{CredentialStore, Secret, StoreError};
use crate::model::CredentialRecord;

/// In-memory credential store for testing and development.
///
/// This store is not persistent; data is lost when the process exits.
///
/// # Thread Safety
///
/// This implementation uses interior mutability via `RwLock` and is
/// safe to share across threads.
pub struct MemoryStore {
    record: RwLock<Option<CredentialRecord>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self {
            record: RwLock::new(None),
        }
    }

    /// Create a memory store holding an existing record.
    pub fn with_record(record: CredentialRecord) -> Self {
        Self {
            record: RwLock::new(Some(record)),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let present = self.record.read().map(|r| r.is_some()).unwrap_or(false);
        f.debug_struct("MemoryStore")
            .field("has_record", &present)
            .finish()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn load(&self) -> Result<Option<CredentialRecord>, StoreError> {
        let record = self.record.read().map_err(|e| StoreError::BackendError {
            message: format!("lock poisoned: {}", e),
        })?;
        Ok(record.clone())
    }

    async fn save(
        &self,
        access_token: &Secret,
        refresh_token: &Secret,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut record = self.record.write().map_err(|e| StoreError::BackendError {
            message: format!("lock poisoned: {}", e),
        })?;

        let created_at = record.as_ref().map(|r| r.created_at);
        let mut updated = CredentialRecord::new(
            access_token.clone(),
            refresh_token.clone(),
            expires_at,
        );
        if let Some(created_at) = created_at {
            updated.created_at = created_at;
        }

        *record = Some(updated);
        Ok(())
    }
}
