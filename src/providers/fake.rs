//! In-process provider for tests and demos. Never touches the network.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use crate::config::AuthProviderConfig;
use crate::envelope::ApiResponse;
use crate::types::{
    EmailVerificationRequest, LoginData, LoginRequest, LogoutRequest, ProviderKind,
    RefreshTokenRequest, TokenValidation, UserInfo, VerificationStatus, VerifyEmailRequest,
};

use super::{EmailVerifiable, LoginProvider};

pub const FAKE_EMAIL: &str = "test@example.com";
pub const FAKE_VERIFY_CODE: &str = "123456";
pub const FAKE_ACCESS_TOKEN: &str = "fake-access-token-123";
pub const FAKE_REFRESH_TOKEN: &str = "fake-refresh-token-123";
pub const FAKE_REFRESHED_ACCESS_TOKEN: &str = "fake-access-token-456";
/// Refresh token the fake always rejects.
pub const INVALID_REFRESH_TOKEN: &str = "invalid-refresh-token";

const TOKEN_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Clone, Default)]
pub struct FakeAuthProvider {
    config: AuthProviderConfig,
}

impl FakeAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn user() -> UserInfo {
        UserInfo {
            id: "fake-user-1".into(),
            email: FAKE_EMAIL.into(),
            nickname: Some("Test User".into()),
            provider: ProviderKind::Fake,
        }
    }

    fn issue(access_token: &str, refresh_token: &str) -> LoginData {
        LoginData {
            access_token: Some(access_token.into()),
            refresh_token: Some(refresh_token.into()),
            expires_at: Some(Utc::now().timestamp() + TOKEN_LIFETIME_SECS),
            expires_in: Some(TOKEN_LIFETIME_SECS),
            user: Some(Self::user()),
        }
    }
}

#[async_trait]
impl LoginProvider for FakeAuthProvider {
    fn provider_name(&self) -> ProviderKind {
        ProviderKind::Fake
    }

    fn config(&self) -> &AuthProviderConfig {
        &self.config
    }

    async fn login(&self, request: &LoginRequest) -> ApiResponse<LoginData> {
        let LoginRequest::Email(req) = request else {
            return ApiResponse::error("AUTH_ERROR", "Fake provider only supports email login");
        };
        debug!(email = %req.email, "Fake login");
        if req.email == FAKE_EMAIL && req.verify_code == FAKE_VERIFY_CODE {
            ApiResponse::success("Login successful", Self::issue(FAKE_ACCESS_TOKEN, FAKE_REFRESH_TOKEN))
        } else {
            ApiResponse::error("AUTH_ERROR", "invalid email or verification code")
        }
    }

    async fn logout(&self, _request: &LogoutRequest) -> ApiResponse<Value> {
        ApiResponse::success("Logout successful", Value::Null)
    }

    async fn refresh_token(&self, request: &RefreshTokenRequest) -> ApiResponse<LoginData> {
        match request.refresh_token.as_deref() {
            Some(INVALID_REFRESH_TOKEN) => {
                ApiResponse::error("AUTH_ERROR", "refresh token invalid")
            }
            _ => ApiResponse::success(
                "Token refreshed",
                Self::issue(FAKE_REFRESHED_ACCESS_TOKEN, FAKE_REFRESH_TOKEN),
            ),
        }
    }

    async fn validate_token(&self, access_token: &str) -> ApiResponse<TokenValidation> {
        if access_token == FAKE_ACCESS_TOKEN || access_token == FAKE_REFRESHED_ACCESS_TOKEN {
            ApiResponse::success(
                "Token is valid",
                TokenValidation {
                    valid: true,
                    user: Some(Self::user()),
                    expires_at: None,
                },
            )
        } else {
            ApiResponse::token_validation_error("token is not recognized")
        }
    }

    async fn get_user_info(&self, access_token: &str) -> ApiResponse<UserInfo> {
        if access_token.is_empty() {
            return ApiResponse::user_info_error();
        }
        ApiResponse::success("User information loaded", Self::user())
    }

    async fn is_available(&self) -> ApiResponse<bool> {
        ApiResponse::success("Service is available", true)
    }

    fn as_email_verifiable(&self) -> Option<&dyn EmailVerifiable> {
        Some(self)
    }
}

#[async_trait]
impl EmailVerifiable for FakeAuthProvider {
    async fn request_email_verification(
        &self,
        request: &EmailVerificationRequest,
    ) -> ApiResponse<VerificationStatus> {
        if request.email.trim().is_empty() {
            return ApiResponse::validation_error("email is required");
        }
        ApiResponse::success(
            "Verification code sent",
            VerificationStatus {
                sent: true,
                verified: false,
                expires_in: Some(300),
            },
        )
    }

    async fn verify_email(&self, request: &VerifyEmailRequest) -> ApiResponse<VerificationStatus> {
        if request.verify_code == FAKE_VERIFY_CODE {
            ApiResponse::success(
                "Email verified",
                VerificationStatus {
                    sent: true,
                    verified: true,
                    expires_in: None,
                },
            )
        } else {
            ApiResponse::error("AUTH_ERROR", "invalid verification code")
        }
    }
}
