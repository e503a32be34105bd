//! Authorization Code bootstrap.
//!
//! This is how the first refresh token is obtained:
//!
//! 1. [`AuthorizationFlow::begin_authorization`] generates a fresh nonce,
//!    remembers it in the token cache and returns the provider's consent URL
//! 2. The end user approves access and the provider redirects back with
//!    `code` and `state`
//! 3. [`AuthorizationFlow::complete_authorization`] checks `state` against the
//!    remembered nonce, exchanges the code and persists the tokens
//!
//! At most one nonce is pending at a time. Starting a new attempt invalidates
//! the previous one, and a nonce is consumed by the first callback that
//! presents it, successful or not.

use chrono::{Duration, Utc};
use oauth2::{CsrfToken, Scope};
use std::sync::Arc;
use url::Url;

use crate::cache::PendingAuthorization;
use crate::oauth::create_oauth_client;
use crate::store::CredentialStore;
use crate::token::TokenError;
use crate::token_manager::DefaultTokenManager;

/// Default lifetime of a pending authorization nonce, in seconds.
pub const DEFAULT_STATE_TTL_SECS: i64 = 600;

/// Drives the Authorization Code grant for a [`DefaultTokenManager`].
pub struct AuthorizationFlow<S: CredentialStore> {
    manager: Arc<DefaultTokenManager<S>>,
    state_ttl: Duration,
}

impl<S: CredentialStore> AuthorizationFlow<S> {
    pub fn new(manager: Arc<DefaultTokenManager<S>>) -> Self {
        Self {
            manager,
            state_ttl: Duration::seconds(DEFAULT_STATE_TTL_SECS),
        }
    }

    /// Set how long a pending nonce stays acceptable.
    pub fn with_state_ttl(mut self, state_ttl: Duration) -> Self {
        self.state_ttl = state_ttl;
        self
    }

    pub fn manager(&self) -> &Arc<DefaultTokenManager<S>> {
        &self.manager
    }

    /// Start an authorization attempt and return the consent URL.
    ///
    /// The URL carries `client_id`, `scope`, `response_type=code`,
    /// `redirect_uri` and the new nonce as `state`. Any nonce from an earlier
    /// attempt is discarded.
    pub fn begin_authorization(&self) -> Result<Url, TokenError> {
        let provider = self.manager.provider();
        let client = create_oauth_client(provider)?;

        let mut request = client.authorize_url(CsrfToken::new_random);
        for scope in &provider.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }
        let (url, nonce) = request.url();

        self.manager
            .cache()
            .set_pending_authorization(PendingAuthorization::new(nonce.secret().clone()));

        tracing::info!("Started authorization via {}", provider.auth_url);
        Ok(url)
    }

    /// Finish an authorization attempt from the provider's callback.
    ///
    /// The pending nonce is consumed before anything else, so a failed
    /// exchange requires a new [`begin_authorization`](Self::begin_authorization).
    /// On any error the stored credentials are left untouched.
    pub async fn complete_authorization(
        &self,
        code: &str,
        returned_nonce: &str,
    ) -> Result<(), TokenError> {
        let pending = self
            .manager
            .cache()
            .take_pending_authorization()
            .ok_or_else(|| {
                tracing::warn!("Authorization callback received with no pending authorization");
                TokenError::StateMismatch {
                    message: "no authorization in progress".to_string(),
                }
            })?;

        if pending.is_expired(Utc::now(), self.state_ttl) {
            tracing::warn!(
                "Authorization callback received for nonce issued at {}, which has expired",
                pending.issued_at
            );
            return Err(TokenError::StateMismatch {
                message: "authorization attempt expired".to_string(),
            });
        }

        if pending.nonce.expose() != returned_nonce {
            tracing::warn!("Authorization callback state does not match pending nonce");
            return Err(TokenError::StateMismatch {
                message: "state does not match pending authorization".to_string(),
            });
        }

        let token_set = self
            .manager
            .endpoint()
            .exchange_authorization_code(code)
            .await
            .inspect_err(|e| tracing::error!("Authorization code exchange failed: {}", e))?;

        self.manager.install_authorization(token_set).await?;

        tracing::info!("Authorization completed");
        Ok(())
    }

    /// Drop the pending nonce if it matches `returned_nonce`, e.g. when the
    /// provider reports an error for that attempt.
    ///
    /// Returns whether an attempt was cancelled. A non-matching nonce leaves
    /// the pending attempt in place.
    pub fn cancel_authorization(&self, returned_nonce: &str) -> bool {
        self.manager
            .cache()
            .take_pending_authorization_matching(returned_nonce)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::{TokenEndpoint, DEFAULT_REQUEST_TIMEOUT};
    use crate::provider::ProviderConfig;
    use crate::store::MemoryStore;
    use std::collections::HashMap;

    async fn flow() -> AuthorizationFlow<MemoryStore> {
        let provider = ProviderConfig::login_with_amazon()
            .with_client_id("client-id")
            .with_client_secret("client-secret")
            .with_redirect_uri("http://localhost:8000/auth/callback");
        let endpoint = TokenEndpoint::new(provider, DEFAULT_REQUEST_TIMEOUT).unwrap();
        let manager = DefaultTokenManager::load(MemoryStore::new(), endpoint)
            .await
            .unwrap();
        AuthorizationFlow::new(Arc::new(manager))
    }

    #[tokio::test]
    async fn test_begin_authorization_url() {
        let flow = flow().await;
        let url = flow.begin_authorization().unwrap();

        let params: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(url.host_str(), Some("www.amazon.com"));
        assert_eq!(params["client_id"], "client-id");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["scope"], "advertising::campaign_management");
        assert_eq!(params["redirect_uri"], "http://localhost:8000/auth/callback");

        let pending = flow.manager().cache().take_pending_authorization().unwrap();
        assert_eq!(pending.nonce.expose(), params["state"]);
    }

    #[tokio::test]
    async fn test_nonces_are_unique() {
        let flow = flow().await;
        let first = flow.begin_authorization().unwrap();
        let second = flow.begin_authorization().unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_complete_without_pending_authorization() {
        let flow = flow().await;
        let result = flow.complete_authorization("code", "state").await;
        assert!(matches!(result, Err(TokenError::StateMismatch { .. })));
    }

    #[tokio::test]
    async fn test_expired_nonce_rejected() {
        let flow = flow().await.with_state_ttl(Duration::seconds(-1));
        let url = flow.begin_authorization().unwrap();
        let state = url
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap();

        let result = flow.complete_authorization("code", &state).await;
        assert!(matches!(result, Err(TokenError::StateMismatch { .. })));
        assert!(!flow.manager().cache().has_pending_authorization());
    }

    fn state_of(url: &Url) -> String {
        url.query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap()
    }

    #[tokio::test]
    async fn test_cancel_authorization() {
        let flow = flow().await;
        assert!(!flow.cancel_authorization("anything"));

        let state = state_of(&flow.begin_authorization().unwrap());
        assert!(flow.cancel_authorization(&state));
        assert!(!flow.manager().cache().has_pending_authorization());
    }

    #[tokio::test]
    async fn test_cancel_with_wrong_state_keeps_pending_attempt() {
        let flow = flow().await;
        let state = state_of(&flow.begin_authorization().unwrap());

        assert!(!flow.cancel_authorization("forged"));
        assert!(flow.manager().cache().has_pending_authorization());

        let pending = flow.manager().cache().take_pending_authorization().unwrap();
        assert_eq!(pending.nonce.expose(), state);
    }
}
