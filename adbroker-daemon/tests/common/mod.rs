//! Shared helpers for daemon integration tests.

#![allow(dead_code)]

use adbroker_core::{model::CredentialRecord, store::MemoryStore};
use adbroker_daemon::{
    api::ApiState,
    config::{DaemonConfig, StoreKind},
};
use axum::{
    body::Body,
    http::{Request, Response},
};
use wiremock::MockServer;

pub const CLIENT_ID: &str = "test-client-id";

/// Configuration pointing both the token endpoint and the Ads API at `mock_server`.
pub fn test_config(mock_server: &MockServer) -> DaemonConfig {
    let mut config = DaemonConfig::default();
    config.oauth.client_id = CLIENT_ID.to_string();
    config.oauth.client_secret = Some("test-client-secret".to_string());
    config.oauth.redirect_uri = Some("http://localhost:8000/auth/callback".to_string());
    config.oauth.token_url = format!("{}/auth/o2/token", mock_server.uri());
    config.oauth.request_timeout_secs = 5;
    config.ads.api_base = mock_server.uri();
    config.store.backend = StoreKind::Memory;
    config
}

pub async fn state_with_record(
    config: &DaemonConfig,
    record: Option<CredentialRecord>,
) -> ApiState {
    let store = record.map(MemoryStore::with_record).unwrap_or_default();
    ApiState::with_store(config, Box::new(store)).await.unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get("location")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

/// The `state` parameter of an authorization redirect.
pub fn state_param(location: &str) -> String {
    url::Url::parse(location)
        .unwrap()
        .query_pairs()
        .find(|(key, _)| key == "state")
        .map(|(_, value)| value.into_owned())
        .unwrap()
}
