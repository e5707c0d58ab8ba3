use std::time::Duration;

use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use authflow::oauth::{discover_endpoints, exchange_code, load_credentials, save_credentials};
use authflow::{obtain_access_token, Settings, TokenSet};

const CLIENT_ID: &str = "b7dbf19e-d140-4334-bae4-e8cd03614485";

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn token_set(access_token: &str, expires_at: Option<i64>, refresh_token: Option<&str>) -> TokenSet {
    TokenSet {
        access_token: access_token.into(),
        token_type: "Bearer".into(),
        refresh_token: refresh_token.map(Into::into),
        expires_in: None,
        id_token: None,
        state: None,
        expires_at,
        extra: serde_json::Map::new(),
    }
}

fn test_settings(oauth_host: &str, dir: &tempfile::TempDir) -> Settings {
    Settings::new(oauth_host, CLIENT_ID)
        .with_auth_timeout(Duration::from_millis(50))
        .with_credentials_path(dir.path().join("credentials.json"))
}

async fn mount_discovery(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "authorization_endpoint": format!("{}/authorize", server.uri()),
            "token_endpoint": format!("{}/token", server.uri()),
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn valid_stored_token_returned_without_network() {
    let dir = tempfile::tempdir().unwrap();
    // An unroutable host: any network traffic on this path would fail.
    let settings = test_settings("http://127.0.0.1:1", &dir);
    save_credentials(
        &settings.credentials_path,
        &token_set("stored-token", Some(now() + 3600), None),
    )
    .unwrap();

    let token = obtain_access_token(&settings, false).await.unwrap();
    assert_eq!(token, "stored-token");
}

#[tokio::test]
async fn expired_token_refreshed_exactly_once() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=old-refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "b",
            "token_type": "Bearer",
            "refresh_token": "new-refresh",
            "expires_in": 3600,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(&server.uri(), &dir);
    save_credentials(
        &settings.credentials_path,
        &token_set("a", Some(now() - 3600), Some("old-refresh")),
    )
    .unwrap();

    let token = obtain_access_token(&settings, false).await.unwrap();
    assert_eq!(token, "b");

    // The refreshed set was persisted before being returned.
    let stored = load_credentials(&settings.credentials_path).unwrap();
    assert_eq!(stored.token_set.access_token, "b");
    assert_eq!(stored.token_set.refresh_token.as_deref(), Some("new-refresh"));
    assert!(stored.token_set.expires_at.unwrap() > now());

    // Second call hits the fast path; the refresh mock still counts one call.
    let token = obtain_access_token(&settings, false).await.unwrap();
    assert_eq!(token, "b");
}

#[tokio::test]
async fn refresh_failure_falls_back_then_fails_terminally() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(&server.uri(), &dir);
    save_credentials(
        &settings.credentials_path,
        &token_set("a", Some(now() - 3600), Some("revoked")),
    )
    .unwrap();

    // The refresh fails, the browser flow is attempted, and with no redirect
    // arriving within the short timeout the whole operation reports a single
    // terminal failure.
    let err = obtain_access_token(&settings, false).await.unwrap_err();
    assert_eq!(err.code(), "auth_failed");

    // The failed attempt never clobbered the stored credentials.
    let stored = load_credentials(&settings.credentials_path).unwrap();
    assert_eq!(stored.token_set.access_token, "a");
}

#[tokio::test]
async fn corrupted_credentials_treated_as_first_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(&server.uri(), &dir);
    std::fs::write(&settings.credentials_path, "{ not json").unwrap();

    // Corruption reads as no credentials; the full flow is attempted and
    // fails at discovery, before any browser is opened.
    let err = obtain_access_token(&settings, false).await.unwrap_err();
    assert_eq!(err.code(), "auth_failed");
}

#[tokio::test]
async fn invalid_client_id_fails_before_any_request() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings::new("http://127.0.0.1:1", "not-a-uuid")
        .with_credentials_path(dir.path().join("credentials.json"));

    let err = obtain_access_token(&settings, true).await.unwrap_err();
    assert_eq!(err.code(), "auth_failed");
}

#[tokio::test]
async fn discovery_resolves_endpoints() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;

    let endpoints = discover_endpoints(&server.uri()).await.unwrap();
    assert_eq!(
        endpoints.authorization_endpoint,
        format!("{}/authorize", server.uri())
    );
    assert_eq!(endpoints.token_endpoint, format!("{}/token", server.uri()));
}

#[tokio::test]
async fn discovery_rejects_incomplete_document() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "authorization_endpoint": "https://auth.example.com/authorize",
        })))
        .mount(&server)
        .await;

    let err = discover_endpoints(&server.uri()).await.unwrap_err();
    assert_eq!(err.code(), "discovery_error");
    assert!(err.to_string().contains("token_endpoint"));
}

#[tokio::test]
async fn exchange_sends_pkce_form_and_derives_expiry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=auth-code"))
        .and(body_string_contains("code_verifier=the-verifier"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "fresh",
            "token_type": "Bearer",
            "expires_in": 3600,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token = exchange_code(
        &format!("{}/token", server.uri()),
        "auth-code",
        "the-verifier",
        "http://127.0.0.1:9999/callback",
        CLIENT_ID,
    )
    .await
    .unwrap();

    assert_eq!(token.access_token, "fresh");
    assert!(token.expires_at.unwrap() >= now() + 3590);
}

#[tokio::test]
async fn exchange_error_in_200_response_is_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "code already used",
        })))
        .mount(&server)
        .await;

    let err = exchange_code(
        &format!("{}/token", server.uri()),
        "auth-code",
        "the-verifier",
        "http://127.0.0.1:9999/callback",
        CLIENT_ID,
    )
    .await
    .unwrap_err();

    assert_eq!(err.code(), "token_exchange_error");
    assert!(err.to_string().contains("code already used"));
}

#[tokio::test]
async fn exchange_non_200_carries_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = exchange_code(
        &format!("{}/token", server.uri()),
        "auth-code",
        "the-verifier",
        "http://127.0.0.1:9999/callback",
        CLIENT_ID,
    )
    .await
    .unwrap_err();

    assert_eq!(err.code(), "token_exchange_error");
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn exchange_without_access_token_is_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "token_type": "Bearer",
        })))
        .mount(&server)
        .await;

    let err = exchange_code(
        &format!("{}/token", server.uri()),
        "auth-code",
        "the-verifier",
        "http://127.0.0.1:9999/callback",
        CLIENT_ID,
    )
    .await
    .unwrap_err();

    assert!(err.to_string().contains("no access token received"));
}
