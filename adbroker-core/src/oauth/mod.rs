//! OAuth 2.0 plumbing.
//!
//! - [`TokenEndpoint`] - Form-encoded exchanges against the token endpoint
//! - [`authorization`] - Authorization Code bootstrap with CSRF state
//!
//! Token requests carry `client_id` and `client_secret` in the request body
//! and are bounded by a request timeout, so a hung authorization server
//! cannot stall every caller waiting for a refresh.

pub mod authorization;

use chrono::Utc;
use oauth2::{basic::BasicClient, AuthType, AuthUrl, ClientId, ClientSecret, RedirectUrl, TokenUrl};
use serde::Deserialize;
use std::time::Duration;

use crate::provider::ProviderConfig;
use crate::store::Secret;
use crate::token::{TokenError, TokenSet};

pub use authorization::AuthorizationFlow;

/// Default timeout for requests to the token endpoint.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Standard OAuth 2.0 token response.
///
/// `expires_in` defaults to zero when absent, which makes the issued token
/// immediately due for refresh.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    /// Convert into a [`TokenSet`] for an exchange started at `issued_at`.
    ///
    /// Returns `None` if `expires_in` does not yield a representable expiry.
    pub fn into_token_set(self, issued_at: chrono::DateTime<Utc>) -> Option<TokenSet> {
        let mut token_set =
            TokenSet::issued(self.access_token, self.expires_in.unwrap_or(0), issued_at)?;
        if let Some(refresh_token) = self.refresh_token.filter(|t| !t.is_empty()) {
            token_set = token_set.with_refresh_token(refresh_token);
        }
        Some(token_set)
    }
}

/// Client for the authorization server's token endpoint.
#[derive(Debug, Clone)]
pub struct TokenEndpoint {
    http: reqwest::Client,
    provider: ProviderConfig,
    timeout: Duration,
}

impl TokenEndpoint {
    /// Create a token endpoint client with the given request timeout.
    pub fn new(provider: ProviderConfig, timeout: Duration) -> Result<Self, TokenError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TokenError::OAuthError {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            provider,
            timeout,
        })
    }

    /// The provider this endpoint talks to.
    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// The returned set carries a refresh token only if the server rotated it.
    pub async fn exchange_refresh_token(
        &self,
        refresh_token: &Secret,
    ) -> Result<TokenSet, TokenError> {
        let client_id = self.provider.require_client_id()?;
        let client_secret = self.provider.require_client_secret()?;

        self.request_tokens(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.expose()),
            ("client_id", client_id),
            ("client_secret", client_secret.expose()),
        ])
        .await
    }

    /// Exchange an authorization code for the initial token pair.
    pub async fn exchange_authorization_code(&self, code: &str) -> Result<TokenSet, TokenError> {
        let client_id = self.provider.require_client_id()?;
        let client_secret = self.provider.require_client_secret()?;
        let redirect_uri = self.provider.require_redirect_uri()?;

        self.request_tokens(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", client_id),
            ("client_secret", client_secret.expose()),
        ])
        .await
    }

    async fn request_tokens(&self, form: &[(&str, &str)]) -> Result<TokenSet, TokenError> {
        // Taken before sending so that request latency only shortens the lifetime.
        let issued_at = Utc::now();

        tracing::debug!("Requesting tokens from {}", self.provider.token_url);

        let response = self
            .http
            .post(&self.provider.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(form)
            .send()
            .await
            .map_err(|e| self.network_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(TokenError::AuthenticationFailed {
                status: Some(status.as_u16()),
                message: format!("token endpoint returned {}: {}", status, body),
            });
        }

        let token_response: TokenResponse =
            response
                .json()
                .await
                .map_err(|e| TokenError::AuthenticationFailed {
                    status: Some(status.as_u16()),
                    message: format!("malformed token response: {}", e),
                })?;

        if token_response.access_token.is_empty() {
            return Err(TokenError::AuthenticationFailed {
                status: Some(status.as_u16()),
                message: "token response contained an empty access_token".to_string(),
            });
        }

        tracing::debug!(
            "Token exchange successful, has_refresh_token={}, expires_in={:?}",
            token_response.refresh_token.is_some(),
            token_response.expires_in
        );

        token_response
            .into_token_set(issued_at)
            .ok_or_else(|| TokenError::AuthenticationFailed {
                status: Some(status.as_u16()),
                message: "malformed token response: expires_in out of range".to_string(),
            })
    }

    fn network_error(&self, e: reqwest::Error) -> TokenError {
        if e.is_timeout() {
            TokenError::Network {
                message: format!("token request timed out after {:?}", self.timeout),
            }
        } else {
            TokenError::Network {
                message: format!("token request failed: {}", e),
            }
        }
    }
}

/// Create an OAuth2 client for building authorization URLs.
///
/// Requires the client ID and redirect URI to be configured. The client
/// secret is optional here because the authorization redirect never carries it.
pub fn create_oauth_client(provider: &ProviderConfig) -> Result<BasicClient, TokenError> {
    let auth_url = AuthUrl::new(provider.auth_url.clone()).map_err(|e| TokenError::OAuthError {
        message: format!("invalid auth URL: {}", e),
    })?;

    let token_url =
        TokenUrl::new(provider.token_url.clone()).map_err(|e| TokenError::OAuthError {
            message: format!("invalid token URL: {}", e),
        })?;

    let redirect_url = RedirectUrl::new(provider.require_redirect_uri()?.to_string()).map_err(
        |e| TokenError::OAuthError {
            message: format!("invalid redirect URL: {}", e),
        },
    )?;

    let client = BasicClient::new(
        ClientId::new(provider.require_client_id()?.to_string()),
        provider
            .client_secret
            .as_ref()
            .map(|s| ClientSecret::new(s.expose().to_string())),
        auth_url,
        Some(token_url),
    )
    .set_auth_type(AuthType::RequestBody)
    .set_redirect_uri(redirect_url);

    Ok(client)
}
