//! Amazon Ads API client.
//!
//! Every request obtains its bearer token from a [`TokenManager`] right
//! before it is sent, so callers never handle tokens themselves.

use reqwest::header::ACCEPT;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::token::{TokenError, TokenManager};

/// Production Ads API base URL (North America).
pub const ADS_API_BASE: &str = "https://advertising-api.amazon.com";

const CLIENT_ID_HEADER: &str = "Amazon-Advertising-API-ClientId";
const SCOPE_HEADER: &str = "Amazon-Advertising-API-Scope";

/// Errors from Ads API calls.
#[derive(Debug, Error)]
pub enum AdsError {
    /// No valid access token could be obtained.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// The Ads API answered with a non-success status.
    #[error("Ads API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Ads API request failed: {message}")]
    Network { message: String },

    #[error("invalid Ads API URL: {message}")]
    InvalidUrl { message: String },
}

/// Client for the Ads API endpoints adbroker exposes.
pub struct AdsClient<M: TokenManager> {
    http: reqwest::Client,
    api_base: Url,
    client_id: String,
    tokens: Arc<M>,
}

impl<M: TokenManager> AdsClient<M> {
    /// Create a client for `api_base`, identifying as `client_id`.
    pub fn new(
        api_base: &str,
        client_id: impl Into<String>,
        tokens: Arc<M>,
        timeout: Duration,
    ) -> Result<Self, AdsError> {
        let mut api_base = Url::parse(api_base).map_err(|e| AdsError::InvalidUrl {
            message: format!("{}: {}", api_base, e),
        })?;
        if !api_base.path().ends_with('/') {
            let path = format!("{}/", api_base.path());
            api_base.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AdsError::Network {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            api_base,
            client_id: client_id.into(),
            tokens,
        })
    }

    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    /// List the advertising profiles the account can access.
    pub async fn profiles(&self) -> Result<Value, AdsError> {
        self.get("v2/profiles", None).await
    }

    /// List campaigns for an advertising profile.
    pub async fn campaigns(&self, profile_id: &str) -> Result<Value, AdsError> {
        self.get("v2/campaigns", Some(profile_id)).await
    }

    async fn get(&self, path: &str, profile_id: Option<&str>) -> Result<Value, AdsError> {
        let url = self.api_base.join(path).map_err(|e| AdsError::InvalidUrl {
            message: format!("{}: {}", path, e),
        })?;

        let token = self.tokens.get_valid_access_token().await?;

        let mut request = self
            .http
            .get(url.clone())
            .bearer_auth(token.expose())
            .header(CLIENT_ID_HEADER, &self.client_id)
            .header(ACCEPT, "application/json");
        if let Some(profile_id) = profile_id {
            request = request.header(SCOPE_HEADER, profile_id);
        }

        tracing::debug!("GET {}", url);

        let response = request.send().await.map_err(|e| AdsError::Network {
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("Ads API {} returned {}", url.path(), status);
            return Err(AdsError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response.json().await.map_err(|e| AdsError::Network {
            message: format!("invalid JSON from Ads API: {}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Secret;
    use crate::token::TokenInfo;
    use async_trait::async_trait;

    struct StaticTokens;

    #[async_trait]
    impl TokenManager for StaticTokens {
        async fn get_valid_access_token(&self) -> Result<Secret, TokenError> {
            Ok(Secret::new("token"))
        }

        fn token_info(&self) -> TokenInfo {
            TokenInfo {
                authenticated: true,
                access_token_valid: true,
                expires_at: None,
                authorization_pending: false,
            }
        }
    }

    #[test]
    fn test_api_base_gets_trailing_slash() {
        let client = AdsClient::new(
            "http://localhost:1234/proxy",
            "id",
            Arc::new(StaticTokens),
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(client.api_base().as_str(), "http://localhost:1234/proxy/");
        assert_eq!(
            client.api_base().join("v2/profiles").unwrap().as_str(),
            "http://localhost:1234/proxy/v2/profiles"
        );
    }

    #[test]
    fn test_invalid_api_base() {
        let result = AdsClient::new(
            "not a url",
            "id",
            Arc::new(StaticTokens),
            Duration::from_secs(5),
        );
        assert!(matches!(result, Err(AdsError::InvalidUrl { .. })));
    }
}
