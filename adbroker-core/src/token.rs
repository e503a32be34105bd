//! Token lifecycle types.
//!
//! This module provides:
//! - [`TokenError`] - Failure conditions callers must be able to tell apart
//! - [`TokenSet`] - Tokens issued by one exchange with the authorization server
//! - [`TokenInfo`] - Non-secret status of the managed credentials
//! - [`TokenManager`] - Trait for components that hand out valid access tokens

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{Secret, StoreError};

/// Seconds subtracted from `expires_in` when computing `expires_at`.
///
/// Tokens are refreshed at least this long before the authorization server
/// would reject them, absorbing clock skew and request latency.
pub const EXPIRY_MARGIN_SECS: i64 = 60;

/// Error type for token operations.
#[derive(Debug, Error)]
pub enum TokenError {
    /// No refresh token exists yet; the authorization flow must run first.
    #[error("not authenticated: re-authentication required")]
    Unauthenticated,

    /// The authorization server rejected a refresh or code exchange.
    #[error("authentication failed: {message}")]
    AuthenticationFailed {
        status: Option<u16>,
        message: String,
    },

    /// The callback `state` did not match the pending authorization.
    #[error("OAuth state mismatch: {message}")]
    StateMismatch { message: String },

    /// Storage error while persisting or loading credentials.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// Transport failure or timeout talking to the authorization server.
    #[error("network error: {message}")]
    Network { message: String },

    /// A required client setting is missing.
    #[error("OAuth provider not configured: missing {field}")]
    ProviderNotConfigured { field: &'static str },

    /// Invalid OAuth configuration (malformed URLs and the like).
    #[error("OAuth configuration error: {message}")]
    OAuthError { message: String },
}

impl TokenError {
    /// Whether the end user has to run the authorization flow again.
    ///
    /// Such errors are never retried automatically: a missing, revoked or
    /// malformed refresh token will not start working on retry.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(
            self,
            TokenError::Unauthenticated | TokenError::AuthenticationFailed { .. }
        )
    }
}

/// Compute the instant after which a token issued at `issued_at` with a
/// lifetime of `expires_in` seconds must no longer be used.
///
/// Returns `None` when the result is not representable.
pub fn expiry_with_margin(issued_at: DateTime<Utc>, expires_in: i64) -> Option<DateTime<Utc>> {
    issued_at
        .checked_add_signed(Duration::try_seconds(expires_in)?)?
        .checked_sub_signed(Duration::try_seconds(EXPIRY_MARGIN_SECS)?)
}

/// Tokens issued by a single exchange with the authorization server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSet {
    /// The new access token.
    pub access_token: Secret,

    /// Refresh token, if the server issued one.
    pub refresh_token: Option<Secret>,

    /// Expiry with [`EXPIRY_MARGIN_SECS`] already applied.
    pub expires_at: DateTime<Utc>,
}

impl TokenSet {
    /// Create a token set from an exchange that happened at `issued_at`.
    ///
    /// Returns `None` if `expires_in` is out of range.
    pub fn issued(
        access_token: impl Into<String>,
        expires_in: i64,
        issued_at: DateTime<Utc>,
    ) -> Option<Self> {
        Some(Self {
            access_token: Secret::new(access_token),
            refresh_token: None,
            expires_at: expiry_with_margin(issued_at, expires_in)?,
        })
    }

    /// Attach a refresh token.
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(Secret::new(refresh_token));
        self
    }
}

/// Status of the managed credentials, safe to show to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// A refresh token is present.
    pub authenticated: bool,

    /// The cached access token can be used right now without a refresh.
    pub access_token_valid: bool,

    /// When the cached access token expires (margin applied).
    pub expires_at: Option<DateTime<Utc>>,

    /// An authorization attempt is waiting for its callback.
    pub authorization_pending: bool,
}

/// Trait for components that hand out valid access tokens.
///
/// Consumers call [`get_valid_access_token`](TokenManager::get_valid_access_token)
/// immediately before every protected API call and must not keep the token
/// across calls.
///
/// # Example
///
/// ```rust,ignore
/// use adbroker_core::{TokenError, TokenManager};
///
/// async fn authorize(manager: &impl TokenManager, req: reqwest::RequestBuilder)
///     -> Result<reqwest::RequestBuilder, TokenError>
/// {
///     let token = manager.get_valid_access_token().await?;
///     Ok(req.bearer_auth(token.expose()))
/// }
/// ```
#[async_trait]
pub trait TokenManager: Send + Sync {
    /// Get a valid access token, refreshing if necessary.
    ///
    /// 1. Returns the cached token if it has not reached `expires_at`
    /// 2. Otherwise exchanges the refresh token for a new access token
    /// 3. Fails with [`TokenError::Unauthenticated`] if no refresh token exists
    async fn get_valid_access_token(&self) -> Result<Secret, TokenError>;

    /// Report the current status without refreshing.
    fn token_info(&self) -> TokenInfo;
}
