//! HTTP handlers for the daemon.

use adbroker_core::{
    ads_client::{AdsClient, AdsError},
    oauth::{AuthorizationFlow, TokenEndpoint},
    store::{create_store, CredentialStore},
    token::{TokenError, TokenInfo},
    token_manager::DefaultTokenManager,
    TokenManager,
};
use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Redirect, Response},
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::types::{CallbackParams, CampaignsQuery, ErrorResponse, ServiceInfo, StatusResponse};
use crate::config::DaemonConfig;

/// Type alias for the token manager used by the daemon.
pub type DaemonTokenManager = DefaultTokenManager<Box<dyn CredentialStore>>;

/// Type alias for the authorization flow used by the daemon.
pub type DaemonAuthorizationFlow = AuthorizationFlow<Box<dyn CredentialStore>>;

/// State shared across HTTP handlers.
#[derive(Clone)]
pub struct ApiState {
    /// Hands out access tokens, refreshing as needed
    pub token_manager: Arc<DaemonTokenManager>,
    /// Bootstrap flow for the first refresh token
    pub authorization: Arc<DaemonAuthorizationFlow>,
    /// Ads API client backed by `token_manager`
    pub ads: Arc<AdsClient<DaemonTokenManager>>,
    pub frontend_origin: Option<String>,
    pub default_profile_id: Option<String>,
}

impl ApiState {
    /// Create the API state, opening the configured credential store.
    pub async fn from_config(config: &DaemonConfig) -> Result<Self> {
        let store = create_store(&config.store_backend())
            .context("Failed to open credential store")?;
        Self::with_store(config, store).await
    }

    /// Create the API state on top of an existing store.
    pub async fn with_store(config: &DaemonConfig, store: Box<dyn CredentialStore>) -> Result<Self> {
        config.validate()?;

        if config.oauth.client_id.is_empty() {
            warn!("LWA client ID is not configured; authorization and refresh will fail");
        }

        let endpoint = TokenEndpoint::new(config.provider_config(), config.request_timeout())
            .context("Failed to create token endpoint client")?;

        let token_manager = Arc::new(
            DefaultTokenManager::load(store, endpoint)
                .await
                .context("Failed to load stored credentials")?,
        );

        let authorization = Arc::new(
            AuthorizationFlow::new(Arc::clone(&token_manager)).with_state_ttl(config.state_ttl()?),
        );

        let ads = Arc::new(
            AdsClient::new(
                &config.ads.api_base,
                config.oauth.client_id.clone(),
                Arc::clone(&token_manager),
                config.request_timeout(),
            )
            .context("Failed to create Ads API client")?,
        );

        Ok(Self {
            token_manager,
            authorization,
            ads,
            frontend_origin: config
                .frontend_origin
                .as_deref()
                .map(|o| o.trim_end_matches('/').to_string()),
            default_profile_id: config.ads.profile_id.clone(),
        })
    }
}

/// Error type for HTTP handlers
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Token(TokenError),
    Ads(AdsError),
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        AppError::Token(e)
    }
}

impl From<AdsError> for AppError {
    fn from(e: AdsError) -> Self {
        AppError::Ads(e)
    }
}

fn token_status(e: &TokenError) -> StatusCode {
    match e {
        TokenError::Unauthenticated | TokenError::AuthenticationFailed { .. } => {
            StatusCode::UNAUTHORIZED
        }
        TokenError::StateMismatch { .. } => StatusCode::BAD_REQUEST,
        TokenError::Network { .. } => StatusCode::BAD_GATEWAY,
        TokenError::Storage(_)
        | TokenError::ProviderNotConfigured { .. }
        | TokenError::OAuthError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Token(e) => token_status(e),
            AppError::Ads(AdsError::Token(e)) => token_status(e),
            AppError::Ads(AdsError::Api { .. } | AdsError::Network { .. }) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Ads(AdsError::InvalidUrl { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            AppError::BadRequest(msg) => msg,
            AppError::Token(e) => e.to_string(),
            AppError::Ads(e) => e.to_string(),
        };

        if status.is_server_error() {
            error!(status = %status, "{}", message);
        } else {
            debug!(status = %status, "{}", message);
        }

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// 302 Found, which browsers follow with a GET.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// GET /
pub async fn root(State(state): State<ApiState>) -> Response {
    match &state.frontend_origin {
        Some(origin) => found(origin),
        None => Json(ServiceInfo {
            service: "adbroker".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            health: "/health".to_string(),
            login: "/auth/login".to_string(),
        })
        .into_response(),
    }
}

/// GET /health
pub async fn health() -> Json<StatusResponse> {
    Json(StatusResponse::ok())
}

/// GET /auth/login
///
/// Starts an authorization attempt and redirects to the provider's consent page.
pub async fn auth_login(State(state): State<ApiState>) -> Result<Redirect, AppError> {
    let url = state.authorization.begin_authorization()?;
    Ok(Redirect::temporary(url.as_str()))
}

/// GET /auth/callback
///
/// Completes the authorization attempt. A provider-reported error cancels
/// the pending attempt only when it carries that attempt's state.
pub async fn auth_callback(
    State(state): State<ApiState>,
    Query(params): Query<CallbackParams>,
) -> Result<Response, AppError> {
    if let Some(error) = params.error {
        let description = params
            .error_description
            .unwrap_or_else(|| "no description".to_string());
        warn!(error = %error, "Authorization denied by provider: {}", description);
        let cancelled = params
            .state
            .as_deref()
            .is_some_and(|returned| state.authorization.cancel_authorization(returned));
        if !cancelled {
            warn!("Provider error did not carry the pending state; attempt left in place");
        }
        return Err(AppError::BadRequest(format!(
            "authorization failed: {} - {}",
            error, description
        )));
    }

    let (Some(code), Some(returned_state)) = (params.code, params.state) else {
        return Err(AppError::BadRequest(
            "missing code or state parameter".to_string(),
        ));
    };

    state
        .authorization
        .complete_authorization(&code, &returned_state)
        .await?;

    info!("Amazon Ads account connected");

    Ok(match &state.frontend_origin {
        Some(origin) => found(&format!("{}/connected?status=ok", origin)),
        None => Json(StatusResponse::ok()).into_response(),
    })
}

/// GET /auth/status
pub async fn auth_status(State(state): State<ApiState>) -> Json<TokenInfo> {
    Json(state.token_manager.token_info())
}

/// GET /ads/profiles
pub async fn ads_profiles(State(state): State<ApiState>) -> Result<Json<Value>, AppError> {
    Ok(Json(state.ads.profiles().await?))
}

/// GET /ads/campaigns
pub async fn ads_campaigns(
    State(state): State<ApiState>,
    Query(query): Query<CampaignsQuery>,
) -> Result<Json<Value>, AppError> {
    let profile_id = query
        .profile_id
        .filter(|p| !p.is_empty())
        .or_else(|| state.default_profile_id.clone())
        .ok_or_else(|| {
            AppError::BadRequest(
                "profile_id is required (or set AMAZON_ADS_PROFILE_ID)".to_string(),
            )
        })?;

    Ok(Json(state.ads.campaigns(&profile_id).await?))
}
