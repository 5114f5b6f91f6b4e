//! Email + verification-code provider.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::instrument;

use crate::config::{ApiConfig, AuthProviderConfig, EndpointName};
use crate::envelope::ApiResponse;
use crate::error::Result;
use crate::net::RequestOptions;
use crate::platform::Platform;
use crate::transport::HttpTransport;
use crate::types::{
    EmailVerificationRequest, LoginData, LoginRequest, LogoutRequest, ProviderKind,
    RefreshTokenRequest, TokenValidation, UserInfo, VerificationStatus, VerifyEmailRequest,
};

use super::backend::{BackendClient, EndpointGroup};
use super::{EmailVerifiable, LoginProvider};

/// Endpoints the email provider cannot work without.
pub const REQUIRED_ENDPOINTS: &[EndpointName] = &[
    EndpointName::Login,
    EndpointName::Refresh,
    EndpointName::Logout,
    EndpointName::Validate,
    EndpointName::Me,
    EndpointName::RequestVerification,
    EndpointName::VerifyEmail,
];

#[derive(Debug, Clone)]
pub struct EmailAuthProvider {
    backend: BackendClient,
    config: AuthProviderConfig,
}

impl EmailAuthProvider {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        api: &ApiConfig,
        config: AuthProviderConfig,
        platform: Platform,
    ) -> Result<Self> {
        let backend = BackendClient::new(
            ProviderKind::Email,
            transport,
            api,
            &config,
            platform,
            REQUIRED_ENDPOINTS,
        )?;
        Ok(Self { backend, config })
    }
}

#[async_trait]
impl LoginProvider for EmailAuthProvider {
    fn provider_name(&self) -> ProviderKind {
        ProviderKind::Email
    }

    fn config(&self) -> &AuthProviderConfig {
        &self.config
    }

    async fn login(&self, request: &LoginRequest) -> ApiResponse<LoginData> {
        let LoginRequest::Email(req) = request else {
            return ApiResponse::error(
                "AUTH_ERROR",
                "Email provider only supports email login",
            );
        };
        if req.email.trim().is_empty() || req.verify_code.trim().is_empty() {
            return ApiResponse::validation_error("email and verifyCode are required");
        }
        let body = json!({ "email": req.email, "verifyCode": req.verify_code });
        self.backend
            .login(EndpointGroup::EMAIL.login, body, req.device_id.as_deref())
            .await
    }

    async fn logout(&self, request: &LogoutRequest) -> ApiResponse<Value> {
        self.backend.logout(EndpointGroup::EMAIL.logout, request).await
    }

    async fn refresh_token(&self, request: &RefreshTokenRequest) -> ApiResponse<LoginData> {
        self.backend.refresh(EndpointGroup::EMAIL.refresh, request).await
    }

    async fn validate_token(&self, access_token: &str) -> ApiResponse<TokenValidation> {
        self.backend
            .validate(EndpointGroup::EMAIL.validate, access_token)
            .await
    }

    async fn get_user_info(&self, access_token: &str) -> ApiResponse<UserInfo> {
        self.backend
            .user_info(EndpointGroup::EMAIL.user_info, access_token)
            .await
    }

    async fn is_available(&self) -> ApiResponse<bool> {
        self.backend.health().await
    }

    fn as_email_verifiable(&self) -> Option<&dyn EmailVerifiable> {
        Some(self)
    }
}

#[async_trait]
impl EmailVerifiable for EmailAuthProvider {
    #[instrument(skip(self, request))]
    async fn request_email_verification(
        &self,
        request: &EmailVerificationRequest,
    ) -> ApiResponse<VerificationStatus> {
        if request.email.trim().is_empty() {
            return ApiResponse::validation_error("email is required");
        }
        let options = RequestOptions::post(json!({ "email": request.email }));
        ApiResponse::settle(
            self.backend
                .call(
                    EndpointName::RequestVerification,
                    options,
                    "Failed to send verification code",
                )
                .await,
        )
    }

    #[instrument(skip(self, request))]
    async fn verify_email(&self, request: &VerifyEmailRequest) -> ApiResponse<VerificationStatus> {
        if request.email.trim().is_empty() || request.verify_code.trim().is_empty() {
            return ApiResponse::validation_error("email and verifyCode are required");
        }
        let options = RequestOptions::post(json!({
            "email": request.email,
            "verifyCode": request.verify_code,
        }));
        ApiResponse::settle(
            self.backend
                .call(EndpointName::VerifyEmail, options, "Email verification failed")
                .await,
        )
    }
}
