//! In-memory mirror of the credential record.
//!
//! [`TokenCache`] is consulted on every credentialed call so that the common
//! path never touches the store. It is owned by the token manager and never
//! the source of truth: every mutation is followed by a
//! [`CredentialStore::save`](crate::store::CredentialStore::save) before it is
//! relied upon.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

use crate::model::CredentialRecord;
use crate::store::Secret;

/// Credential fields mirrored from the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachedCredentials {
    pub access_token: Option<Secret>,
    pub refresh_token: Option<Secret>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CachedCredentials {
    /// The access token if it can be used at `now`.
    pub fn usable_access_token(&self, now: DateTime<Utc>) -> Option<&Secret> {
        match (&self.access_token, self.expires_at) {
            (Some(token), Some(expires_at)) if now < expires_at && !token.is_empty() => {
                Some(token)
            }
            _ => None,
        }
    }
}

impl From<&CredentialRecord> for CachedCredentials {
    fn from(record: &CredentialRecord) -> Self {
        Self {
            access_token: record.access_token.clone(),
            refresh_token: record.refresh_token.clone(),
            expires_at: record.expires_at,
        }
    }
}

/// Anti-forgery nonce of an authorization attempt awaiting its callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAuthorization {
    pub nonce: Secret,
    pub issued_at: DateTime<Utc>,
}

impl PendingAuthorization {
    /// Create a pending authorization issued now.
    pub fn new(nonce: impl Into<String>) -> Self {
        Self {
            nonce: Secret::new(nonce),
            issued_at: Utc::now(),
        }
    }

    /// Whether the nonce is older than `ttl` at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.issued_at > ttl
    }
}

#[derive(Debug, Default)]
struct TokenState {
    credentials: CachedCredentials,
    oauth_state: Option<PendingAuthorization>,
}

/// Process-local holder of the token state.
///
/// # Thread Safety
///
/// All fields sit behind one `RwLock`, so [`set_credentials`](Self::set_credentials)
/// replaces token, refresh token and expiry together and readers never see a
/// mixed combination.
#[derive(Debug, Default)]
pub struct TokenCache {
    state: RwLock<TokenState>,
}

impl TokenCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache populated from a stored record, if any.
    pub fn from_record(record: Option<&CredentialRecord>) -> Self {
        let credentials = record.map(CachedCredentials::from).unwrap_or_default();
        Self {
            state: RwLock::new(TokenState {
                credentials,
                oauth_state: None,
            }),
        }
    }

    /// Snapshot of the cached credentials.
    pub fn credentials(&self) -> CachedCredentials {
        self.state.read().credentials.clone()
    }

    pub fn access_token(&self) -> Option<Secret> {
        self.state.read().credentials.access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<Secret> {
        self.state.read().credentials.refresh_token.clone()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().credentials.expires_at
    }

    /// The cached access token if it can be used at `now`.
    pub fn usable_access_token(&self, now: DateTime<Utc>) -> Option<Secret> {
        self.state
            .read()
            .credentials
            .usable_access_token(now)
            .cloned()
    }

    /// Replace all credential fields, returning the previous ones.
    pub fn set_credentials(&self, credentials: CachedCredentials) -> CachedCredentials {
        std::mem::replace(&mut self.state.write().credentials, credentials)
    }

    /// Store a pending authorization, discarding any earlier one.
    pub fn set_pending_authorization(&self, pending: PendingAuthorization) {
        self.state.write().oauth_state = Some(pending);
    }

    /// Remove and return the pending authorization.
    pub fn take_pending_authorization(&self) -> Option<PendingAuthorization> {
        self.state.write().oauth_state.take()
    }

    /// Remove the pending authorization only if its nonce equals `nonce`.
    pub fn take_pending_authorization_matching(
        &self,
        nonce: &str,
    ) -> Option<PendingAuthorization> {
        let mut state = self.state.write();
        match &state.oauth_state {
            Some(pending) if pending.nonce.expose() == nonce => state.oauth_state.take(),
            _ => None,
        }
    }

    pub fn has_pending_authorization(&self) -> bool {
        self.state.read().oauth_state.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(access: &str, expires_at: DateTime<Utc>) -> CachedCredentials {
        CachedCredentials {
            access_token: Some(Secret::new(access)),
            refresh_token: Some(Secret::new("refresh")),
            expires_at: Some(expires_at),
        }
    }

    #[test]
    fn test_usable_access_token_before_expiry() {
        let now = Utc::now();
        let cache = TokenCache::new();
        cache.set_credentials(credentials("a1", now + Duration::seconds(30)));

        assert_eq!(cache.usable_access_token(now).unwrap().expose(), "a1");
    }

    #[test]
    fn test_usable_access_token_at_expiry_is_unusable() {
        let now = Utc::now();
        let cache = TokenCache::new();
        cache.set_credentials(credentials("a1", now));

        assert!(cache.usable_access_token(now).is_none());
    }

    #[test]
    fn test_usable_access_token_missing_expiry() {
        let cache = TokenCache::new();
        cache.set_credentials(CachedCredentials {
            access_token: Some(Secret::new("a1")),
            refresh_token: None,
            expires_at: None,
        });

        assert!(cache.usable_access_token(Utc::now()).is_none());
    }

    #[test]
    fn test_set_credentials_returns_previous() {
        let now = Utc::now();
        let cache = TokenCache::new();
        cache.set_credentials(credentials("a1", now));

        let previous = cache.set_credentials(credentials("a2", now));
        assert_eq!(previous.access_token.unwrap().expose(), "a1");
        assert_eq!(cache.access_token().unwrap().expose(), "a2");
    }

    #[test]
    fn test_from_record() {
        let expires_at = Utc::now() + Duration::hours(1);
        let record = CredentialRecord::new(Secret::new("a"), Secret::new("r"), expires_at);
        let cache = TokenCache::from_record(Some(&record));

        assert_eq!(cache.access_token().unwrap().expose(), "a");
        assert_eq!(cache.refresh_token().unwrap().expose(), "r");
        assert_eq!(cache.expires_at(), Some(expires_at));
        assert!(!cache.has_pending_authorization());
    }

    #[test]
    fn test_pending_authorization_take_clears() {
        let cache = TokenCache::new();
        cache.set_pending_authorization(PendingAuthorization::new("first"));
        cache.set_pending_authorization(PendingAuthorization::new("second"));

        let pending = cache.take_pending_authorization().unwrap();
        assert_eq!(pending.nonce.expose(), "second");
        assert!(cache.take_pending_authorization().is_none());
    }

    #[test]
    fn test_pending_authorization_expiry() {
        let pending = PendingAuthorization::new("nonce");
        let ttl = Duration::minutes(10);

        assert!(!pending.is_expired(pending.issued_at + Duration::minutes(5), ttl));
        assert!(pending.is_expired(pending.issued_at + Duration::minutes(11), ttl));
    }
}
