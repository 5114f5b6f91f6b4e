//! Naver OAuth provider.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::{ApiConfig, AuthProviderConfig, NaverAuthProviderConfig};
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

const GROUP: EndpointGroup = EndpointGroup::NAVER;

#[derive(Debug, Clone)]
pub struct NaverAuthProvider {
    backend: BackendClient,
    config: NaverAuthProviderConfig,
}

impl NaverAuthProvider {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        api: &ApiConfig,
        config: NaverAuthProviderConfig,
        platform: Platform,
    ) -> Result<Self> {
        let backend = BackendClient::new(
            ProviderKind::Naver,
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
impl LoginProvider for NaverAuthProvider {
    fn provider_name(&self) -> ProviderKind {
        ProviderKind::Naver
    }

    fn config(&self) -> &AuthProviderConfig {
        &self.config.base
    }

    async fn login(&self, request: &LoginRequest) -> ApiResponse<LoginData> {
        match oauth_login_body(ProviderKind::Naver, request, &self.config.client_id) {
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
