//! End-to-end manager flows over a scripted transport.

use std::sync::Arc;
use std::time::Duration;

use auth_session::config::{ApiConfig, GoogleAuthProviderConfig, ProviderSection};
use auth_session::providers::fake::{
    FAKE_ACCESS_TOKEN, FAKE_EMAIL, FAKE_VERIFY_CODE, INVALID_REFRESH_TOKEN,
};
use auth_session::store::{MemoryTokenStore, TokenCell};
use auth_session::transport::TransportError;
use auth_session::{
    AuthManager, LoginRequest, LogoutRequest, Platform, ProviderKind, RefreshTokenRequest,
    ScriptedTransport, Token,
};
use serde_json::json;

const BASE: &str = "https://auth.example.com";

fn email_manager(transport: &Arc<ScriptedTransport>, platform: Platform) -> AuthManager {
    AuthManager::builder()
        .provider_type(ProviderKind::Email)
        .transport(transport.clone())
        .api(ApiConfig::new(BASE).with_retry_count(1))
        .platform(platform)
        .build()
        .unwrap()
}

fn login_ok() -> serde_json::Value {
    json!({
        "success": true,
        "message": "Login successful",
        "data": {
            "accessToken": "acc-1",
            "refreshToken": "ref-1",
            "expiresIn": 3600,
            "user": {"id": 7, "email": "a@example.com", "provider": "email"}
        }
    })
}

#[tokio::test]
async fn fake_provider_scenario() {
    let manager = AuthManager::builder()
        .provider_type(ProviderKind::Fake)
        .build()
        .unwrap();

    let login = manager
        .login(&LoginRequest::email(FAKE_EMAIL, FAKE_VERIFY_CODE))
        .await;
    assert!(login.is_success());
    assert_eq!(
        login.data().unwrap().access_token.as_deref(),
        Some(FAKE_ACCESS_TOKEN)
    );

    let stored = manager.token_store().get_token().await;
    assert_eq!(
        stored.into_data().unwrap().unwrap().access_token,
        FAKE_ACCESS_TOKEN
    );

    let logout = manager.logout(LogoutRequest::new(ProviderKind::Email)).await;
    assert!(logout.is_success());
    assert_eq!(manager.token_store().get_token().await.into_data(), Some(None));

    let wire = serde_json::to_value(manager.token_store().get_token().await).unwrap();
    assert_eq!(wire["data"], serde_json::Value::Null);
    assert_eq!(wire["success"], true);
}

#[tokio::test]
async fn fake_provider_rejects_invalid_refresh_token() {
    let manager = AuthManager::builder()
        .provider_type(ProviderKind::Fake)
        .build()
        .unwrap();

    let resp = manager
        .refresh_token(RefreshTokenRequest::with_refresh_token(INVALID_REFRESH_TOKEN))
        .await;
    assert!(!resp.is_success());
    assert!(resp.message().contains("refresh token invalid"));
    assert_eq!(manager.token_store().has_token().await.into_data(), Some(false));
}

#[tokio::test]
async fn email_login_writes_through_and_logout_removes() {
    let transport = Arc::new(ScriptedTransport::new());
    transport
        .respond_json("/api/auth/email/login", 200, login_ok())
        .respond_json("/api/auth/logout", 200, json!({"success": true, "message": "bye", "data": null}));
    let manager = email_manager(&transport, Platform::Web);

    let login = manager.login(&LoginRequest::email("a@example.com", "111111")).await;
    assert!(login.is_success(), "{login:?}");
    assert_eq!(login.data().unwrap().user.as_ref().unwrap().id, "7");

    let token = manager.token_store().get_token().await.into_data().unwrap().unwrap();
    assert_eq!(token.access_token, "acc-1");
    assert!(token.expires_at.is_some());

    let logout = manager.logout(LogoutRequest::new(ProviderKind::Email)).await;
    assert!(logout.is_success());
    assert_eq!(manager.token_store().has_token().await.into_data(), Some(false));

    let sent = transport.requests_to("/api/auth/logout");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].header("Authorization"), Some("Bearer acc-1"));
    assert!(sent[0].with_credentials);
    assert!(sent[0].body_field("refreshToken").is_none());
}

#[tokio::test]
async fn app_logout_injects_stored_refresh_token() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond_json("/api/auth/logout", 200, json!({"success": true, "message": "bye"}));
    let cell = TokenCell::new();
    cell.set(Some(Token::new("acc-2").with_refresh_token("ref-2")));

    let manager = AuthManager::builder()
        .provider_type(ProviderKind::Email)
        .transport(transport.clone())
        .api(ApiConfig::new(BASE).with_retry_count(1))
        .platform(Platform::App)
        .token_store(Arc::new(MemoryTokenStore::with_cell(cell.clone())))
        .build()
        .unwrap();

    let mut request = LogoutRequest::new(ProviderKind::Email);
    request.device_id = Some("device-9".into());
    assert!(manager.logout(request).await.is_success());

    let sent = &transport.requests()[0];
    assert_eq!(sent.header("Authorization"), Some("Bearer acc-2"));
    assert_eq!(sent.body_field("refreshToken"), Some("ref-2"));
    assert_eq!(sent.body_field("deviceId"), Some("device-9"));
    assert!(cell.get().is_none());
}

#[tokio::test]
async fn logout_without_token_makes_no_call() {
    let transport = Arc::new(ScriptedTransport::new());
    let manager = email_manager(&transport, Platform::Web);

    let resp = manager.logout(LogoutRequest::new(ProviderKind::Email)).await;
    assert_eq!(resp.error_code(), Some("VALIDATION_ERROR"));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn logout_with_caller_token_but_empty_store_makes_no_call() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond_json("/api/auth/logout", 200, json!({"success": true, "message": "bye"}));
    let manager = email_manager(&transport, Platform::Web);

    let mut request = LogoutRequest::new(ProviderKind::Email);
    request.access_token = Some("caller-token".into());
    let resp = manager.logout(request).await;

    assert_eq!(resp.error_code(), Some("VALIDATION_ERROR"));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn incompatible_oauth_login_mentions_provider() {
    let transport = Arc::new(ScriptedTransport::new());
    let manager = email_manager(&transport, Platform::Web);

    let resp = manager
        .login(&LoginRequest::oauth(ProviderKind::Google, "x"))
        .await;
    assert!(!resp.is_success());
    assert!(resp.message().contains("Google"), "{}", resp.message());
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn malformed_logins_are_rejected_before_the_transport() {
    let transport = Arc::new(ScriptedTransport::new());
    let manager = email_manager(&transport, Platform::Web);

    let resp = manager.login(&LoginRequest::email("a@example.com", "")).await;
    assert_eq!(resp.error_code(), Some("VALIDATION_ERROR"));

    let google = AuthManager::builder()
        .provider_type(ProviderKind::Google)
        .provider_section(ProviderSection {
            google: Some(GoogleAuthProviderConfig::new("client-1")),
            ..ProviderSection::default()
        })
        .transport(transport.clone())
        .api(ApiConfig::new(BASE))
        .build()
        .unwrap();
    let resp = google.login(&LoginRequest::oauth(ProviderKind::Google, " ")).await;
    assert_eq!(resp.error_code(), Some("VALIDATION_ERROR"));

    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn failed_login_leaves_store_untouched() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond_json(
        "/api/auth/email/login",
        401,
        json!({"success": false, "message": "invalid code", "error": "AUTH_ERROR"}),
    );
    let manager = email_manager(&transport, Platform::Web);

    let resp = manager.login(&LoginRequest::email("a@example.com", "000000")).await;
    assert_eq!(resp.message(), "invalid code");
    assert_eq!(resp.error_code(), Some("AUTH_ERROR"));
    assert_eq!(manager.token_store().has_token().await.into_data(), Some(false));
}

#[tokio::test(start_paused = true)]
async fn transport_failures_are_retried_then_reported() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.fail_with(TransportError::Connect("connection refused".into()));
    let manager = AuthManager::builder()
        .provider_type(ProviderKind::Email)
        .transport(transport.clone())
        .api(ApiConfig::new(BASE))
        .build()
        .unwrap();

    let resp = manager.login(&LoginRequest::email("a@example.com", "111111")).await;
    assert_eq!(resp.error_code(), Some("NETWORK_ERROR"));
    assert_eq!(transport.call_count(), 3);

    let times = transport.call_times();
    assert_eq!(times[1] - times[0], Duration::from_secs(1));
    assert_eq!(times[2] - times[1], Duration::from_secs(2));
}

#[tokio::test]
async fn server_errors_are_not_retried() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond_raw("/api/auth/email/login", 503, "upstream down");
    let manager = AuthManager::builder()
        .provider_type(ProviderKind::Email)
        .transport(transport.clone())
        .api(ApiConfig::new(BASE).with_retry_count(5))
        .build()
        .unwrap();

    let resp = manager.login(&LoginRequest::email("a@example.com", "111111")).await;
    assert_eq!(resp.error_code(), Some("SERVER_ERROR"));
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn app_refresh_uses_stored_token_and_overwrites() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond_json(
        "/api/auth/refresh",
        200,
        json!({"success": true, "message": "ok", "data": {"accessToken": "acc-new"}}),
    );
    let cell = TokenCell::new();
    cell.set(Some(Token::new("acc-old").with_refresh_token("ref-old")));
    let manager = AuthManager::builder()
        .provider_type(ProviderKind::Email)
        .transport(transport.clone())
        .api(ApiConfig::new(BASE).with_retry_count(1))
        .platform(Platform::App)
        .token_store(Arc::new(MemoryTokenStore::with_cell(cell.clone())))
        .build()
        .unwrap();

    let resp = manager.refresh_token(RefreshTokenRequest::default()).await;
    assert!(resp.is_success(), "{resp:?}");
    assert_eq!(transport.requests()[0].body_field("refreshToken"), Some("ref-old"));

    let token = cell.get().unwrap();
    assert_eq!(token.access_token, "acc-new");
    assert_eq!(token.refresh_token.as_deref(), Some("ref-old"));
}

#[tokio::test]
async fn app_refresh_without_any_token_is_validation_error() {
    let transport = Arc::new(ScriptedTransport::new());
    let manager = email_manager(&transport, Platform::App);

    let resp = manager.refresh_token(RefreshTokenRequest::default()).await;
    assert_eq!(resp.error_code(), Some("VALIDATION_ERROR"));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn validation_and_user_info_follow_the_stored_token() {
    let transport = Arc::new(ScriptedTransport::new());
    transport
        .respond_json("/api/auth/email/login", 200, login_ok())
        .respond_json(
            "/api/auth/validate",
            200,
            json!({"success": true, "message": "ok", "data": {"valid": true}}),
        )
        .respond_json(
            "/api/auth/me",
            200,
            json!({"success": true, "message": "ok", "data": {"id": "7", "email": "a@example.com"}}),
        );
    let manager = email_manager(&transport, Platform::Web);

    assert_eq!(manager.is_authenticated().await.into_data(), Some(false));
    assert_eq!(
        manager.get_current_user_info().await.error_code(),
        Some("AUTH_ERROR")
    );
    assert_eq!(transport.call_count(), 0);

    manager.login(&LoginRequest::email("a@example.com", "111111")).await;
    assert_eq!(manager.is_authenticated().await.into_data(), Some(true));

    let user = manager.get_current_user_info().await.into_data().unwrap();
    assert_eq!(user.provider, ProviderKind::Email);
    assert_eq!(
        transport.requests_to("/api/auth/me")[0].header("Authorization"),
        Some("Bearer acc-1")
    );

    let status = manager.session_status().await.into_data().unwrap();
    assert!(status.authenticated);
    assert!(!status.expired);

    assert!(manager.clear().await.is_success());
    assert_eq!(manager.is_authenticated().await.into_data(), Some(false));
}
