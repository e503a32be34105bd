//! Domain model types for adbroker.
//!
//! - [`CredentialRecord`] - The single durable OAuth state of the managed account

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::Secret;

/// The durable OAuth state of the managed account.
///
/// adbroker is single-tenant: at most one record exists per process, and every
/// [`CredentialStore`](crate::store::CredentialStore) backend enforces that. If
/// multiple accounts are ever needed the record must be keyed by tenant.
///
/// Both tokens are `None` until the first authorization completes. Whenever
/// `access_token` is present, `expires_at` is present as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Short-lived bearer credential for the protected API.
    pub access_token: Option<Secret>,

    /// Long-lived credential exchanged for new access tokens.
    pub refresh_token: Option<Secret>,

    /// Instant after which `access_token` must be treated as invalid.
    pub expires_at: Option<DateTime<Utc>>,

    /// When the record was first written.
    pub created_at: DateTime<Utc>,

    /// When the record was last written.
    pub updated_at: DateTime<Utc>,
}

impl CredentialRecord {
    /// Create a record stamped with the current time.
    pub fn new(access_token: Secret, refresh_token: Secret, expires_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            access_token: Some(access_token),
            refresh_token: Some(refresh_token),
            expires_at: Some(expires_at),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether authorization has completed, i.e. a refresh token exists.
    pub fn is_authorized(&self) -> bool {
        self.refresh_token.is_some()
    }
}
