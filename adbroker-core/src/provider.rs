//! OAuth provider configuration.
//!
//! [`ProviderConfig`] describes the authorization server and the client
//! identity adbroker presents to it. [`ProviderConfig::login_with_amazon`]
//! returns the endpoints and scope used by the Amazon Ads API.

use serde::{Deserialize, Serialize};

use crate::store::Secret;
use crate::token::TokenError;

/// Login with Amazon authorization endpoint.
pub const LWA_AUTH_URL: &str = "https://www.amazon.com/ap/oa";

/// Login with Amazon token endpoint.
pub const LWA_TOKEN_URL: &str = "https://api.amazon.com/auth/o2/token";

/// Scope required for campaign management through the Ads API.
pub const ADS_CAMPAIGN_SCOPE: &str = "advertising::campaign_management";

/// Configuration for the OAuth provider and client.
///
/// # Example
///
/// ```
/// use adbroker_core::provider::ProviderConfig;
///
/// let provider = ProviderConfig::login_with_amazon()
///     .with_client_id("amzn1.application-oa2-client.example")
///     .with_client_secret("secret")
///     .with_redirect_uri("https://broker.example.com/auth/callback");
///
/// assert!(provider.require_client_secret().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// OAuth authorization endpoint URL.
    pub auth_url: String,

    /// OAuth token endpoint URL.
    pub token_url: String,

    /// OAuth scopes to request.
    pub scopes: Vec<String>,

    /// OAuth client ID.
    pub client_id: String,

    /// OAuth client secret.
    pub client_secret: Option<Secret>,

    /// Callback address registered with the provider.
    pub redirect_uri: Option<String>,
}

impl ProviderConfig {
    /// Create an empty provider configuration for the given endpoints.
    pub fn new(auth_url: impl Into<String>, token_url: impl Into<String>) -> Self {
        Self {
            auth_url: auth_url.into(),
            token_url: token_url.into(),
            scopes: Vec::new(),
            client_id: String::new(),
            client_secret: None,
            redirect_uri: None,
        }
    }

    /// Login with Amazon endpoints with the campaign management scope.
    pub fn login_with_amazon() -> Self {
        Self::new(LWA_AUTH_URL, LWA_TOKEN_URL).with_scopes(vec![ADS_CAMPAIGN_SCOPE.to_string()])
    }

    /// Set the authorization URL.
    pub fn with_auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = url.into();
        self
    }

    /// Set the token URL.
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Set the scopes.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Set the client ID.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Set the client secret.
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(Secret::new(secret));
        self
    }

    /// Set the redirect URI.
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(uri.into());
        self
    }

    /// The client ID, or an error if it is not configured.
    pub fn require_client_id(&self) -> Result<&str, TokenError> {
        if self.client_id.is_empty() {
            return Err(TokenError::ProviderNotConfigured { field: "client_id" });
        }
        Ok(&self.client_id)
    }

    /// The client secret, or an error if it is not configured.
    pub fn require_client_secret(&self) -> Result<&Secret, TokenError> {
        self.client_secret
            .as_ref()
            .filter(|s| !s.is_empty())
            .ok_or(TokenError::ProviderNotConfigured {
                field: "client_secret",
            })
    }

    /// The redirect URI, or an error if it is not configured.
    pub fn require_redirect_uri(&self) -> Result<&str, TokenError> {
        self.redirect_uri
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(TokenError::ProviderNotConfigured {
                field: "redirect_uri",
            })
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::login_with_amazon()
    }
}
