//! Provider capability traits.

use async_trait::async_trait;
use serde_json::Value;

use crate::config::AuthProviderConfig;
use crate::envelope::ApiResponse;
use crate::types::{
    EmailVerificationRequest, LoginData, LoginRequest, LogoutRequest, ProviderKind,
    RefreshTokenRequest, TokenValidation, UserInfo, VerificationStatus, VerifyEmailRequest,
};

/// Trait that every identity provider implements.
///
/// Every operation answers with an [`ApiResponse`]; failures never escape as
/// `Err`. The trait is object safe and is used as `Arc<dyn LoginProvider>`.
#[async_trait]
pub trait LoginProvider: Send + Sync {
    /// Which backend family this provider talks to.
    fn provider_name(&self) -> ProviderKind;

    /// Tuning this provider was built with.
    fn config(&self) -> &AuthProviderConfig;

    async fn login(&self, request: &LoginRequest) -> ApiResponse<LoginData>;

    async fn logout(&self, request: &LogoutRequest) -> ApiResponse<Value>;

    async fn refresh_token(&self, request: &RefreshTokenRequest) -> ApiResponse<LoginData>;

    async fn validate_token(&self, access_token: &str) -> ApiResponse<TokenValidation>;

    async fn get_user_info(&self, access_token: &str) -> ApiResponse<UserInfo>;

    /// Lightweight reachability probe.
    async fn is_available(&self) -> ApiResponse<bool>;

    /// Email verification capability, when the provider has one.
    fn as_email_verifiable(&self) -> Option<&dyn EmailVerifiable> {
        None
    }
}

/// Optional capability of providers that log in with emailed codes.
#[async_trait]
pub trait EmailVerifiable: Send + Sync {
    async fn request_email_verification(
        &self,
        request: &EmailVerificationRequest,
    ) -> ApiResponse<VerificationStatus>;

    async fn verify_email(&self, request: &VerifyEmailRequest) -> ApiResponse<VerificationStatus>;
}
