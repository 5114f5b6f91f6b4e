//! Kakao OAuth provider. Every call goes through the backend's Kakao group.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::{ApiConfig, AuthProviderConfig, KakaoAuthProviderConfig};
use crate::envelope::ApiResponse;
use crate::error::Result;
use crate::platform::Platform;
use crate::transport::HttpTransport;
use crate::types::{
    LoginData, LoginRequest, LogoutRequest, ProviderKind, RefreshTokenRequest, TokenValidation,
    UserInfo,
};

use super::LoginProvider;
use super::backend::{BackendClient, EndpointGroup, oauth_login_body};

const GROUP: EndpointGroup = EndpointGroup::KAKAO;

#[derive(Debug, Clone)]
pub struct KakaoAuthProvider {
    backend: BackendClient,
    config: KakaoAuthProviderConfig,
}

impl KakaoAuthProvider {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        api: &ApiConfig,
        config: KakaoAuthProviderConfig,
        platform: Platform,
    ) -> Result<Self> {
        let backend = BackendClient::new(
            ProviderKind::Kakao,
            transport,
            api,
            &config.base,
            platform,
            &GROUP.all(),
        )?;
        Ok(Self { backend, config })
    }

    pub fn client_id(&self) -> &str {
        &self.config.client_id
    }
}

#[async_trait]
impl LoginProvider for KakaoAuthProvider {
    fn provider_name(&self) -> ProviderKind {
        ProviderKind::Kakao
    }

    fn config(&self) -> &AuthProviderConfig {
        &self.config.base
    }

    async fn login(&self, request: &LoginRequest) -> ApiResponse<LoginData> {
        match oauth_login_body(ProviderKind::Kakao, request, &self.config.client_id) {
            Ok((body, req)) => {
                self.backend
                    .login(GROUP.login, body, req.device_id.as_deref())
                    .await
            }
            Err(e) => e.into(),
        }
    }

    async fn logout(&self, request: &LogoutRequest) -> ApiResponse<Value> {
        self.backend.logout(GROUP.logout, request).await
    }

    async fn refresh_token(&self, request: &RefreshTokenRequest) -> ApiResponse<LoginData> {
        self.backend.refresh(GROUP.refresh, request).await
    }

    async fn validate_token(&self, access_token: &str) -> ApiResponse<TokenValidation> {
        self.backend.validate(GROUP.validate, access_token).await
    }

    async fn get_user_info(&self, access_token: &str) -> ApiResponse<UserInfo> {
        self.backend.user_info(GROUP.user_info, access_token).await
    }

    async fn is_available(&self) -> ApiResponse<bool> {
        self.backend.health().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ScriptedTransport;
    use serde_json::json;

    fn provider(transport: Arc<ScriptedTransport>) -> KakaoAuthProvider {
        KakaoAuthProvider::new(
            transport,
            &ApiConfig::new("https://auth.example.com").with_retry_count(1),
            KakaoAuthProviderConfig {
                base: AuthProviderConfig::default(),
                client_id: "kakao-rest-key".into(),
            },
            Platform::App,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_login_hits_kakao_group_with_device_id() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_json(
            "/api/auth/kakao/login",
            200,
            json!({"success": true, "message": "ok", "data": {"accessToken": "k-acc", "refreshToken": "k-ref"}}),
        );

        let resp = provider(transport.clone())
            .login(&LoginRequest::oauth(ProviderKind::Kakao, "code").with_device_id("phone-1"))
            .await;

        assert_eq!(resp.data().unwrap().refresh_token.as_deref(), Some("k-ref"));
        let sent = &transport.requests()[0];
        assert_eq!(sent.body_field("clientId"), Some("kakao-rest-key"));
        assert_eq!(sent.body_field("deviceId"), Some("phone-1"));
        assert!(!sent.with_credentials);
    }

    #[tokio::test]
    async fn test_email_request_is_rejected_without_network() {
        let transport = Arc::new(ScriptedTransport::new());
        let resp = provider(transport.clone())
            .login(&LoginRequest::email("a@b.c", "1"))
            .await;
        assert_eq!(resp.error_code(), Some("AUTH_ERROR"));
        assert!(resp.message().contains("Kakao"));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_server_error_is_distinguished() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_raw("/api/auth/kakao/validate", 500, "upstream exploded");
        let resp = provider(transport.clone()).validate_token("k-acc").await;
        assert_eq!(resp.error_code(), Some("SERVER_ERROR"));
        assert_eq!(transport.call_count(), 1);
    }
}
