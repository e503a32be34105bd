//! Integration tests for the Authorization Code bootstrap.

use adbroker_core::{
    model::CredentialRecord,
    oauth::{AuthorizationFlow, TokenEndpoint, DEFAULT_REQUEST_TIMEOUT},
    provider::ProviderConfig,
    store::{CredentialStore, MemoryStore, Secret},
    token::{TokenError, TokenManager},
    token_manager::DefaultTokenManager,
};
use chrono::{Duration, Utc};
use std::sync::Arc;
use url::Url;
use wiremock::{
    matchers::{body_string_contains, method, path},
    Mock, MockServer, ResponseTemplate,
};

const REDIRECT_URI: &str = "http://localhost:8000/auth/callback";

async fn setup_flow(
    token_url: &str,
    record: Option<CredentialRecord>,
) -> AuthorizationFlow<MemoryStore> {
    let provider = ProviderConfig::login_with_amazon()
        .with_auth_url("https://www.amazon.com/ap/oa")
        .with_token_url(token_url)
        .with_client_id("test-client-id")
        .with_client_secret("test-client-secret")
        .with_redirect_uri(REDIRECT_URI);
    let endpoint = TokenEndpoint::new(provider, DEFAULT_REQUEST_TIMEOUT).unwrap();
    let store = match record {
        Some(record) => MemoryStore::with_record(record),
        None => MemoryStore::new(),
    };
    let manager = DefaultTokenManager::load(store, endpoint).await.unwrap();
    AuthorizationFlow::new(Arc::new(manager))
}

fn state_of(url: &Url) -> String {
    url.query_pairs()
        .find(|(key, _)| key == "state")
        .map(|(_, value)| value.into_owned())
        .unwrap()
}

async fn mount_code_exchange(mock_server: &MockServer, body: serde_json::Value, times: u64) {
    Mock::given(method("POST"))
        .and(path("/auth/o2/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=C1"))
        .and(body_string_contains("redirect_uri="))
        .and(body_string_contains("client_secret=test-client-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(times)
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn test_authorization_installs_tokens() {
    let mock_server = MockServer::start().await;
    mount_code_exchange(
        &mock_server,
        serde_json::json!({
            "access_token": "A1",
            "refresh_token": "R1",
            "token_type": "bearer",
            "expires_in": 3600
        }),
        1,
    )
    .await;

    let flow = setup_flow(&format!("{}/auth/o2/token", mock_server.uri()), None).await;
    let url = flow.begin_authorization().unwrap();
    assert!(flow.manager().token_info().authorization_pending);

    flow.complete_authorization("C1", &state_of(&url))
        .await
        .unwrap();

    let stored = flow.manager().store().load().await.unwrap().unwrap();
    assert_eq!(stored.access_token.unwrap().expose(), "A1");
    assert_eq!(stored.refresh_token.unwrap().expose(), "R1");

    let info = flow.manager().token_info();
    assert!(info.authenticated);
    assert!(info.access_token_valid);
    assert!(!info.authorization_pending);

    let token = flow.manager().get_valid_access_token().await.unwrap();
    assert_eq!(token.expose(), "A1");
}

#[tokio::test]
async fn test_wrong_state_is_rejected_without_exchange() {
    let mock_server = MockServer::start().await;
    mount_code_exchange(&mock_server, serde_json::json!({}), 0).await;

    let existing = CredentialRecord::new(
        Secret::new("A0"),
        Secret::new("R0"),
        Utc::now() + Duration::hours(1),
    );
    let flow = setup_flow(
        &format!("{}/auth/o2/token", mock_server.uri()),
        Some(existing.clone()),
    )
    .await;

    flow.begin_authorization().unwrap();
    let result = flow.complete_authorization("C1", "forged-state").await;

    assert!(matches!(result, Err(TokenError::StateMismatch { .. })));
    assert_eq!(flow.manager().store().load().await.unwrap(), Some(existing));
    assert!(!flow.manager().token_info().authorization_pending);
}

#[tokio::test]
async fn test_callback_cannot_be_replayed() {
    let mock_server = MockServer::start().await;
    mount_code_exchange(
        &mock_server,
        serde_json::json!({
            "access_token": "A1",
            "refresh_token": "R1",
            "expires_in": 3600
        }),
        1,
    )
    .await;

    let flow = setup_flow(&format!("{}/auth/o2/token", mock_server.uri()), None).await;
    let state = state_of(&flow.begin_authorization().unwrap());

    flow.complete_authorization("C1", &state).await.unwrap();
    let replay = flow.complete_authorization("C1", &state).await;

    assert!(matches!(replay, Err(TokenError::StateMismatch { .. })));
}

#[tokio::test]
async fn test_new_attempt_invalidates_previous_state() {
    let mock_server = MockServer::start().await;
    mount_code_exchange(&mock_server, serde_json::json!({}), 0).await;

    let flow = setup_flow(&format!("{}/auth/o2/token", mock_server.uri()), None).await;
    let first = state_of(&flow.begin_authorization().unwrap());
    let _second = flow.begin_authorization().unwrap();

    let result = flow.complete_authorization("C1", &first).await;
    assert!(matches!(result, Err(TokenError::StateMismatch { .. })));
}

#[tokio::test]
async fn test_failed_exchange_consumes_state() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/o2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let flow = setup_flow(&format!("{}/auth/o2/token", mock_server.uri()), None).await;
    let state = state_of(&flow.begin_authorization().unwrap());

    let result = flow.complete_authorization("C1", &state).await;
    assert!(matches!(
        result,
        Err(TokenError::AuthenticationFailed {
            status: Some(400),
            ..
        })
    ));
    assert!(flow.manager().store().load().await.unwrap().is_none());

    let retry = flow.complete_authorization("C1", &state).await;
    assert!(matches!(retry, Err(TokenError::StateMismatch { .. })));
}

#[tokio::test]
async fn test_exchange_without_refresh_token_is_rejected() {
    let mock_server = MockServer::start().await;
    mount_code_exchange(
        &mock_server,
        serde_json::json!({
            "access_token": "A1",
            "expires_in": 3600
        }),
        1,
    )
    .await;

    let flow = setup_flow(&format!("{}/auth/o2/token", mock_server.uri()), None).await;
    let state = state_of(&flow.begin_authorization().unwrap());

    let result = flow.complete_authorization("C1", &state).await;
    assert!(matches!(
        result,
        Err(TokenError::AuthenticationFailed { .. })
    ));
    assert!(flow.manager().store().load().await.unwrap().is_none());
    assert!(!flow.manager().token_info().authenticated);
}
