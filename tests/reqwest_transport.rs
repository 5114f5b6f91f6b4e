//! The reqwest transport against a mock backend.

use std::sync::Arc;
use std::time::Duration;

use auth_session::config::{ApiConfig, GoogleAuthProviderConfig, ProviderSection};
use auth_session::{AuthManager, LoginRequest, LogoutRequest, Platform, ProviderKind, ReqwestTransport};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport() -> Arc<ReqwestTransport> {
    Arc::new(ReqwestTransport::new())
}

#[tokio::test]
async fn email_login_and_logout_over_http() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/email/login"))
        .and(body_json(json!({"email": "a@example.com", "verifyCode": "123456"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "Login successful",
            "data": {"accessToken": "acc-http", "expiresIn": 600}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .and(header("authorization", "Bearer acc-http"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "Logged out",
            "data": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let manager = AuthManager::builder()
        .provider_type(ProviderKind::Email)
        .transport(transport())
        .api(ApiConfig::new(server.uri()).with_retry_count(1))
        .platform(Platform::Web)
        .build()
        .unwrap();

    let login = manager
        .login(&LoginRequest::email("a@example.com", "123456"))
        .await;
    assert!(login.is_success(), "{login:?}");

    let logout = manager.logout(LogoutRequest::new(ProviderKind::Email)).await;
    assert!(logout.is_success(), "{logout:?}");
    assert_eq!(manager.token_store().has_token().await.into_data(), Some(false));
}

#[tokio::test]
async fn plain_error_status_becomes_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let manager = AuthManager::builder()
        .provider_type(ProviderKind::Email)
        .transport(transport())
        .api(ApiConfig::new(server.uri()))
        .build()
        .unwrap();
    manager
        .token_store()
        .save_token(&auth_session::Token::new("acc"))
        .await;

    let resp = manager.get_current_user_info().await;
    assert_eq!(resp.error_code(), Some("AUTH_ERROR"));
    assert!(resp.message().contains("403"), "{}", resp.message());
}

#[tokio::test]
async fn slow_backend_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let manager = AuthManager::builder()
        .provider_type(ProviderKind::Email)
        .transport(transport())
        .api(ApiConfig::new(server.uri()).with_timeout(Duration::from_millis(100)))
        .build()
        .unwrap();

    let resp = manager.provider().is_available().await;
    assert_eq!(resp.error_code(), Some("SERVICE_UNAVAILABLE"));
}

fn google_direct_manager(server: &MockServer) -> AuthManager {
    AuthManager::builder()
        .provider_type(ProviderKind::Google)
        .provider_section(ProviderSection {
            google: Some(
                GoogleAuthProviderConfig::new("client-1")
                    .direct(format!("{}/oauth2/v3/userinfo", server.uri())),
            ),
            ..ProviderSection::default()
        })
        .transport(transport())
        .api(ApiConfig::new(server.uri()).with_retry_count(1))
        .build()
        .unwrap()
}

#[tokio::test]
async fn google_direct_validation_requires_verified_email() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oauth2/v3/userinfo"))
        .and(header("authorization", "Bearer good"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sub": "g-1",
            "email": "g@example.com",
            "email_verified": true,
            "name": "G"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/oauth2/v3/userinfo"))
        .and(header("authorization", "Bearer unverified"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sub": "g-2",
            "email": "u@example.com",
            "email_verified": false
        })))
        .mount(&server)
        .await;

    let manager = google_direct_manager(&server);

    manager.token_store().save_token(&auth_session::Token::new("good")).await;
    let user = manager.get_current_user_info().await.into_data().unwrap();
    assert_eq!(user.id, "g-1");
    assert_eq!(user.provider, ProviderKind::Google);
    assert_eq!(manager.is_authenticated().await.into_data(), Some(true));

    manager
        .token_store()
        .save_token(&auth_session::Token::new("unverified"))
        .await;
    let resp = manager.validate_current_token().await;
    assert_eq!(resp.error_code(), Some("TOKEN_VALIDATION_ERROR"));
    assert!(resp.message().contains("not verified"));
    assert_eq!(manager.is_authenticated().await.into_data(), Some(false));
}

#[tokio::test]
async fn google_login_forwards_code_and_client_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/google/login"))
        .and(body_json(json!({"authCode": "code-1", "clientId": "client-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "ok",
            "data": {"accessToken": "g-acc"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let manager = google_direct_manager(&server);
    let resp = manager
        .login(&LoginRequest::oauth(ProviderKind::Google, "code-1"))
        .await;
    assert!(resp.is_success(), "{resp:?}");
    assert_eq!(
        manager.token_store().get_token().await.into_data().unwrap().unwrap().access_token,
        "g-acc"
    );
}
