//! Durable credential storage.
//!
//! This module provides:
//! - [`Secret`] - A wrapper for sensitive values that prevents accidental logging
//! - [`CredentialStore`] - Trait for backends holding the single [`CredentialRecord`]
//! - [`SqliteStore`] - SQLite-backed implementation (default)
//! - [`MemoryStore`] - In-memory implementation for testing
//! - [`KeyringStore`] - OS keyring implementation (with `keyring-store` feature)
//! - [`create_store`] - Helper to select a backend from configuration
//!
//! # Single tenancy
//!
//! Every backend holds at most one record. `save` is an upsert of that record
//! and replaces access token, refresh token and expiry in one atomic write, so
//! a concurrent `load` never observes a mix of old and new fields.
//!
//! # Example
//!
//! ```rust,ignore
//! use adbroker_core::store::{CredentialStore, MemoryStore, Secret};
//!
//! let store = MemoryStore::new();
//! store
//!     .save(&Secret::new("access"), &Secret::new("refresh"), chrono::Utc::now())
//!     .await?;
//!
//! let record = store.load().await?.unwrap();
//! assert_eq!(record.refresh_token.unwrap().expose(), "refresh");
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::model::CredentialRecord;

mod memory;
mod sqlite;
#[cfg(feature = "keyring-store")]
mod keyring;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
#[cfg(feature = "keyring-store")]
pub use keyring::KeyringStore;

/// A secret value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose).
/// Debug and Display implementations show `[REDACTED]` instead of the value,
/// and the buffer is zeroed when the secret is dropped.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Consume the secret and return the inner value.
    pub fn into_inner(mut self) -> String {
        std::mem::take(&mut self.0)
    }

    /// Whether the secret holds an empty string.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

/// Error type for credential store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The SQLite backend failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The storage backend encountered an error.
    #[error("backend error: {message}")]
    BackendError { message: String },

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Filesystem error while preparing the store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The keyring backend is not available.
    #[error("keyring not available: {message}")]
    KeyringUnavailable { message: String },
}

/// Abstraction over durable storage of the single credential record.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load the stored record.
    ///
    /// Returns `Ok(None)` if authorization has never completed.
    async fn load(&self) -> Result<Option<CredentialRecord>, StoreError>;

    /// Create or overwrite the record and bump its `updated_at`.
    ///
    /// Last write wins; calling this repeatedly with the same values is harmless.
    async fn save(
        &self,
        access_token: &Secret,
        refresh_token: &Secret,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: CredentialStore + ?Sized> CredentialStore for Box<T> {
    async fn load(&self) -> Result<Option<CredentialRecord>, StoreError> {
        (**self).load().await
    }

    async fn save(
        &self,
        access_token: &Secret,
        refresh_token: &Secret,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        (**self).save(access_token, refresh_token, expires_at).await
    }
}

#[async_trait]
impl<T: CredentialStore + ?Sized> CredentialStore for Arc<T> {
    async fn load(&self) -> Result<Option<CredentialRecord>, StoreError> {
        (**self).load().await
    }

    async fn save(
        &self,
        access_token: &Secret,
        refresh_token: &Secret,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        (**self).save(access_token, refresh_token, expires_at).await
    }
}

/// Which backend holds the credential record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreBackend {
    /// SQLite database file at `path`.
    Sqlite { path: PathBuf },

    /// A single entry in the OS keyring under `service`.
    Keyring { service: String },

    /// Process memory only. Nothing survives a restart.
    Memory,
}

/// Create a credential store for the configured backend.
///
/// An unavailable durable backend is an error; there is no fallback to
/// [`MemoryStore`].
pub fn create_store(backend: &StoreBackend) -> Result<Box<dyn CredentialStore>, StoreError> {
    match backend {
        StoreBackend::Sqlite { path } => {
            tracing::info!("Using SQLite credential store at {:?}", path);
            Ok(Box::new(SqliteStore::open(path)?))
        }
        #[cfg(feature = "keyring-store")]
        StoreBackend::Keyring { service } => {
            tracing::info!("Using OS keyring for credential storage");
            Ok(Box::new(KeyringStore::try_new(service)?))
        }
        #[cfg(not(feature = "keyring-store"))]
        StoreBackend::Keyring { .. } => Err(StoreError::KeyringUnavailable {
            message: "keyring-store feature not enabled".to_string(),
        }),
        StoreBackend::Memory => {
            tracing::warn!(
                "Using in-memory credential store. \
                 Credentials will not persist across restarts."
            );
            Ok(Box::new(MemoryStore::new()))
        }
    }
}
