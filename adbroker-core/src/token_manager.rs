//! Default implementation of the TokenManager trait.
//!
//! [`DefaultTokenManager`] owns the credential store, the in-memory token
//! cache and the token endpoint client, and is the only component that
//! writes credentials.
//!
//! # Refresh
//!
//! - The cached access token is returned without I/O while `now < expires_at`
//! - Otherwise a single caller exchanges the refresh token; concurrent callers
//!   wait on the same guard and reuse the result
//! - A failed refresh leaves both the cache and the store untouched
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use adbroker_core::{
//!     oauth::{TokenEndpoint, DEFAULT_REQUEST_TIMEOUT},
//!     DefaultTokenManager, MemoryStore, ProviderConfig, TokenManager,
//! };
//!
//! let provider = ProviderConfig::login_with_amazon()
//!     .with_client_id("client-id")
//!     .with_client_secret("client-secret");
//! let endpoint = TokenEndpoint::new(provider, DEFAULT_REQUEST_TIMEOUT)?;
//! let manager = DefaultTokenManager::load(MemoryStore::new(), endpoint).await?;
//!
//! let token = manager.get_valid_access_token().await?;
//! println!("Bearer {}", token.expose());
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::{
    cache::{CachedCredentials, TokenCache},
    oauth::TokenEndpoint,
    provider::ProviderConfig,
    store::{CredentialStore, Secret},
    token::{TokenError, TokenInfo, TokenManager, TokenSet},
};

/// Default implementation of TokenManager.
///
/// # Type Parameters
///
/// * `S` - The credential store implementation to use
pub struct DefaultTokenManager<S: CredentialStore> {
    store: S,
    cache: TokenCache,
    endpoint: TokenEndpoint,
    /// Held while exchanging tokens or writing new credentials.
    refresh_lock: Mutex<()>,
}

impl<S: CredentialStore> DefaultTokenManager<S> {
    /// Create a token manager, populating the cache from the store.
    pub async fn load(store: S, endpoint: TokenEndpoint) -> Result<Self, TokenError> {
        let record = store.load().await?;

        match &record {
            Some(record) if record.is_authorized() => tracing::info!(
                "Loaded stored credentials, access token expires at {:?}",
                record.expires_at
            ),
            _ => tracing::info!("No stored credentials, authorization required"),
        }

        Ok(Self {
            cache: TokenCache::from_record(record.as_ref()),
            store,
            endpoint,
            refresh_lock: Mutex::new(()),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    pub fn endpoint(&self) -> &TokenEndpoint {
        &self.endpoint
    }

    pub fn provider(&self) -> &ProviderConfig {
        self.endpoint.provider()
    }

    /// Persist the result of an authorization code exchange.
    ///
    /// Fails with [`TokenError::AuthenticationFailed`] if the provider did not
    /// issue a refresh token, since the credentials could never be renewed.
    pub async fn install_authorization(&self, token_set: TokenSet) -> Result<(), TokenError> {
        let refresh_token =
            token_set
                .refresh_token
                .ok_or_else(|| TokenError::AuthenticationFailed {
                    status: None,
                    message: "authorization response did not include a refresh token"
                        .to_string(),
                })?;

        let _guard = self.refresh_lock.lock().await;
        self.commit(token_set.access_token, refresh_token, token_set.expires_at)
            .await
    }

    /// Update the cache, then the store, restoring the cache if the store
    /// write fails. Callers must hold `refresh_lock`.
    async fn commit(
        &self,
        access_token: Secret,
        refresh_token: Secret,
        expires_at: DateTime<Utc>,
    ) -> Result<(), TokenError> {
        let previous = self.cache.set_credentials(CachedCredentials {
            access_token: Some(access_token.clone()),
            refresh_token: Some(refresh_token.clone()),
            expires_at: Some(expires_at),
        });

        if let Err(e) = self
            .store
            .save(&access_token, &refresh_token, expires_at)
            .await
        {
            tracing::error!("Failed to persist credentials, discarding update: {}", e);
            self.cache.set_credentials(previous);
            return Err(e.into());
        }

        Ok(())
    }
}

#[async_trait]
impl<S: CredentialStore> TokenManager for DefaultTokenManager<S> {
    async fn get_valid_access_token(&self) -> Result<Secret, TokenError> {
        if let Some(token) = self.cache.usable_access_token(Utc::now()) {
            tracing::debug!("Using cached access token");
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;

        // A caller that held the guard before us may already have refreshed.
        if let Some(token) = self.cache.usable_access_token(Utc::now()) {
            tracing::debug!("Access token was refreshed while waiting");
            return Ok(token);
        }

        let refresh_token = self
            .cache
            .refresh_token()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                tracing::warn!("No refresh token available, authorization required");
                TokenError::Unauthenticated
            })?;

        tracing::info!("Access token expired or missing, refreshing");

        let token_set = self
            .endpoint
            .exchange_refresh_token(&refresh_token)
            .await
            .inspect_err(|e| tracing::error!("Failed to refresh access token: {}", e))?;

        let refresh_token = token_set.refresh_token.unwrap_or(refresh_token);
        self.commit(
            token_set.access_token.clone(),
            refresh_token,
            token_set.expires_at,
        )
        .await?;

        tracing::info!(
            "Refreshed access token, expires at {}",
            token_set.expires_at
        );
        Ok(token_set.access_token)
    }

    fn token_info(&self) -> TokenInfo {
        let credentials = self.cache.credentials();
        TokenInfo {
            authenticated: credentials.refresh_token.is_some(),
            access_token_valid: credentials.usable_access_token(Utc::now()).is_some(),
            expires_at: credentials.expires_at,
            authorization_pending: self.cache.has_pending_authorization(),
        }
    }
}
