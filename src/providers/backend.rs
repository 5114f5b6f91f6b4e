//! Shared plumbing for providers that talk to the identity backend.
//!
//! Each provider owns a [`BackendClient`] plus the [`EndpointGroup`] it is
//! allowed to use. The client applies platform shaping, runs the resilient
//! request layer and turns the outcome into an envelope.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use crate::config::{ApiConfig, AuthProviderConfig, EndpointName};
use crate::envelope::ApiResponse;
use crate::error::Result;
use crate::net::{RequestOptions, handle_response, request, request_with_retry};
use crate::platform::{Platform, shape_login, shape_refresh};
use crate::transport::HttpTransport;
use crate::error::AuthError;
use crate::types::{
    LoginData, LoginRequest, LogoutRequest, OAuthLoginRequest, ProviderKind, RefreshTokenRequest,
    TokenValidation, UserInfo,
};

/// The endpoints one provider family uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointGroup {
    pub login: EndpointName,
    pub logout: EndpointName,
    pub refresh: EndpointName,
    pub validate: EndpointName,
    pub user_info: EndpointName,
}

impl EndpointGroup {
    pub const EMAIL: Self = Self {
        login: EndpointName::Login,
        logout: EndpointName::Logout,
        refresh: EndpointName::Refresh,
        validate: EndpointName::Validate,
        user_info: EndpointName::Me,
    };

    pub const GOOGLE: Self = Self {
        login: EndpointName::GoogleLogin,
        logout: EndpointName::GoogleLogout,
        refresh: EndpointName::GoogleRefresh,
        validate: EndpointName::GoogleValidate,
        user_info: EndpointName::GoogleUserInfo,
    };

    pub const KAKAO: Self = Self {
        login: EndpointName::KakaoLogin,
        logout: EndpointName::KakaoLogout,
        refresh: EndpointName::KakaoRefresh,
        validate: EndpointName::KakaoValidate,
        user_info: EndpointName::KakaoUserInfo,
    };

    pub const NAVER: Self = Self {
        login: EndpointName::NaverLogin,
        logout: EndpointName::NaverLogout,
        refresh: EndpointName::NaverRefresh,
        validate: EndpointName::NaverValidate,
        user_info: EndpointName::NaverUserInfo,
    };

    /// Every endpoint in the group. Login and refresh come first so that
    /// missing-endpoint errors name them first.
    pub fn all(&self) -> [EndpointName; 5] {
        [
            self.login,
            self.refresh,
            self.logout,
            self.validate,
            self.user_info,
        ]
    }
}

/// Pick out the OAuth request and build the backend login body.
///
/// The check is structural: any request carrying an `authCode` qualifies.
pub fn oauth_login_body<'a>(
    kind: ProviderKind,
    request: &'a LoginRequest,
    client_id: &str,
) -> Result<(Value, &'a OAuthLoginRequest)> {
    let LoginRequest::OAuth(req) = request else {
        return Err(AuthError::Auth(format!(
            "{} login requires an authorization code",
            kind.display_name()
        )));
    };
    if req.auth_code.trim().is_empty() {
        return Err(AuthError::validation("authCode is required"));
    }

    let mut body = json!({ "authCode": req.auth_code, "clientId": client_id });
    if let Some(redirect_uri) = &req.redirect_uri {
        body["redirectUri"] = json!(redirect_uri);
    }
    if let Some(code_verifier) = &req.code_verifier {
        body["codeVerifier"] = json!(code_verifier);
    }
    Ok((body, req))
}

/// User payload as the backend sends it; the provider tag is optional there.
type BackendUser = serde_json::Map<String, Value>;

#[derive(Clone)]
pub struct BackendClient {
    kind: ProviderKind,
    transport: Arc<dyn HttpTransport>,
    api: ApiConfig,
    platform: Platform,
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("kind", &self.kind)
            .field("api_base_url", &self.api.api_base_url)
            .field("platform", &self.platform)
            .finish_non_exhaustive()
    }
}

impl BackendClient {
    /// Build a client, failing fast when any endpoint in `required` is absent.
    pub fn new(
        kind: ProviderKind,
        transport: Arc<dyn HttpTransport>,
        api: &ApiConfig,
        tuning: &AuthProviderConfig,
        platform: Platform,
        required: &[EndpointName],
    ) -> Result<Self> {
        api.endpoints.ensure(required)?;
        Ok(Self {
            kind,
            transport,
            api: api.tuned(tuning),
            platform,
        })
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn api(&self) -> &ApiConfig {
        &self.api
    }

    pub fn transport(&self) -> &dyn HttpTransport {
        self.transport.as_ref()
    }

    /// Send `options` to `endpoint` with retry and normalize the response.
    pub async fn call<T: DeserializeOwned>(
        &self,
        endpoint: EndpointName,
        options: RequestOptions,
        fallback_message: &str,
    ) -> Result<ApiResponse<T>> {
        let path = self.api.endpoints.require(endpoint)?;
        let response = request_with_retry(self.transport.as_ref(), &self.api, path, &options).await?;
        debug!(
            provider = %self.kind,
            endpoint = endpoint.key(),
            status = response.status,
            "Backend responded"
        );
        handle_response(&response, fallback_message)
    }

    #[instrument(skip(self, body, device_id), fields(provider = %self.kind))]
    pub async fn login(
        &self,
        endpoint: EndpointName,
        body: Value,
        device_id: Option<&str>,
    ) -> ApiResponse<LoginData> {
        let options = shape_login(self.platform, body, device_id);
        let outcome = self.call::<LoginData>(endpoint, options, "Login failed").await;
        ApiResponse::settle(outcome).map(|data| self.stamp_login(data))
    }

    #[instrument(skip(self, request), fields(provider = %self.kind))]
    pub async fn logout(&self, endpoint: EndpointName, request: &LogoutRequest) -> ApiResponse<Value> {
        let outcome = async {
            let mut options = shape_refresh(
                self.platform,
                request.refresh_token.as_deref(),
                request.device_id.as_deref(),
            )?;
            // Every backend group accepts the bearer on logout, OAuth ones included.
            if let Some(token) = request.access_token.as_deref().filter(|t| !t.is_empty()) {
                options = options.bearer(token);
            }
            self.call::<Value>(endpoint, options, "Logout failed").await
        }
        .await;
        ApiResponse::settle(outcome)
    }

    #[instrument(skip(self, request), fields(provider = %self.kind))]
    pub async fn refresh(
        &self,
        endpoint: EndpointName,
        request: &RefreshTokenRequest,
    ) -> ApiResponse<LoginData> {
        let outcome = async {
            let options = shape_refresh(
                self.platform,
                request.refresh_token.as_deref(),
                request.device_id.as_deref(),
            )?;
            self.call::<LoginData>(endpoint, options, "Token refresh failed")
                .await
        }
        .await;
        ApiResponse::settle(outcome).map(|data| self.stamp_login(data))
    }

    #[instrument(skip(self, access_token), fields(provider = %self.kind))]
    pub async fn validate(&self, endpoint: EndpointName, access_token: &str) -> ApiResponse<TokenValidation> {
        if access_token.is_empty() {
            return ApiResponse::token_validation_error("access token is required");
        }
        let options = RequestOptions::get().bearer(access_token);
        let outcome = self
            .call::<TokenValidation>(endpoint, options, "Token validation failed")
            .await;
        ApiResponse::settle(outcome).map(|mut validation| {
            if let Some(user) = validation.user.as_mut() {
                user.provider = self.kind;
            }
            validation
        })
    }

    #[instrument(skip(self, access_token), fields(provider = %self.kind))]
    pub async fn user_info(&self, endpoint: EndpointName, access_token: &str) -> ApiResponse<UserInfo> {
        if access_token.is_empty() {
            return ApiResponse::validation_error("access token is required");
        }
        let options = RequestOptions::get().bearer(access_token);
        let outcome = self
            .call::<BackendUser>(endpoint, options, "Failed to load user information")
            .await;
        match ApiResponse::settle(outcome) {
            ApiResponse::Success { message, data } => match self.to_user(data) {
                Some(user) => ApiResponse::success(message, user),
                None => {
                    warn!(provider = %self.kind, "User payload is missing id or email");
                    ApiResponse::user_info_error()
                }
            },
            ApiResponse::Error { message, error } => ApiResponse::Error { message, error },
        }
    }

    /// Probe the health endpoint once, without retry.
    pub async fn health(&self) -> ApiResponse<bool> {
        let Some(path) = self.api.endpoints.get(EndpointName::Health) else {
            return ApiResponse::service_availability_error();
        };
        match request(self.transport.as_ref(), &self.api, path, &RequestOptions::get()).await {
            Ok(response) if response.ok() => ApiResponse::success("Service is available", true),
            Ok(response) => {
                warn!(provider = %self.kind, status = response.status, "Health check failed");
                ApiResponse::service_availability_error()
            }
            Err(e) => {
                warn!(provider = %self.kind, error = %e, "Health check failed");
                ApiResponse::service_availability_error()
            }
        }
    }

    fn stamp_login(&self, mut data: LoginData) -> LoginData {
        if let Some(user) = data.user.as_mut() {
            user.provider = self.kind;
        }
        data
    }

    fn to_user(&self, mut fields: BackendUser) -> Option<UserInfo> {
        fields.insert("provider".to_string(), json!(self.kind));
        serde_json::from_value(Value::Object(fields)).ok()
    }
}
