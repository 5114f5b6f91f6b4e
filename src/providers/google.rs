//! Google OAuth provider.
//!
//! Login, logout and refresh always go through the backend's Google group.
//! Validation and profile lookup either use the backend as well
//! ([`GoogleValidation::Backend`]) or call Google's userinfo endpoint directly
//! ([`GoogleValidation::Direct`]), in which case an unverified email fails
//! closed.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::{
    ApiConfig, ApiEndpoints, AuthProviderConfig, EndpointName, GoogleAuthProviderConfig,
    GoogleValidation,
};
use crate::envelope::ApiResponse;
use crate::error::{AuthError, Result};
use crate::net::{RequestOptions, request_with_retry};
use crate::platform::Platform;
use crate::transport::HttpTransport;
use crate::types::{
    LoginData, LoginRequest, LogoutRequest, ProviderKind, RefreshTokenRequest, TokenValidation,
    UserInfo,
};

use super::LoginProvider;
use super::backend::{BackendClient, EndpointGroup, oauth_login_body};

const GROUP: EndpointGroup = EndpointGroup::GOOGLE;

/// Profile returned by Google's OpenID userinfo endpoint.
#[derive(Debug, Deserialize)]
struct GoogleProfile {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
    #[serde(default)]
    name: Option<String>,
}

/// Google's userinfo URL split into a base and a path for the request layer.
#[derive(Debug, Clone)]
struct DirectEndpoint {
    api: ApiConfig,
    path: String,
}

impl DirectEndpoint {
    fn parse(userinfo_url: &str, tuning: &ApiConfig) -> Result<Self> {
        let url = Url::parse(userinfo_url).map_err(|e| {
            AuthError::config(format!("Invalid Google userinfo URL '{userinfo_url}': {e}"))
        })?;
        let origin = url.origin();
        if !origin.is_tuple() {
            return Err(AuthError::config(format!(
                "Google userinfo URL '{userinfo_url}' has no usable origin"
            )));
        }

        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }

        Ok(Self {
            api: ApiConfig {
                api_base_url: origin.ascii_serialization(),
                endpoints: ApiEndpoints::new(),
                timeout_ms: tuning.timeout_ms,
                retry_count: tuning.retry_count,
            },
            path,
        })
    }
}

#[derive(Debug, Clone)]
pub struct GoogleAuthProvider {
    backend: BackendClient,
    config: GoogleAuthProviderConfig,
    direct: Option<DirectEndpoint>,
}

impl GoogleAuthProvider {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        api: &ApiConfig,
        config: GoogleAuthProviderConfig,
        platform: Platform,
    ) -> Result<Self> {
        if config.client_id.trim().is_empty() {
            return Err(AuthError::config("Google provider requires a client id"));
        }

        let required: Vec<EndpointName> = match config.validation {
            GoogleValidation::Backend => GROUP.all().to_vec(),
            GoogleValidation::Direct => vec![GROUP.login, GROUP.refresh, GROUP.logout],
        };
        let backend = BackendClient::new(
            ProviderKind::Google,
            transport,
            api,
            &config.base,
            platform,
            &required,
        )?;

        let direct = match config.validation {
            GoogleValidation::Direct => Some(DirectEndpoint::parse(
                &config.userinfo_url,
                backend.api(),
            )?),
            GoogleValidation::Backend => None,
        };

        Ok(Self {
            backend,
            config,
            direct,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.config.client_id
    }

    /// Fetch and vet the profile straight from Google.
    #[instrument(skip(self, direct, access_token))]
    async fn fetch_profile(&self, direct: &DirectEndpoint, access_token: &str) -> Result<UserInfo> {
        if access_token.is_empty() {
            return Err(AuthError::validation("access token is required"));
        }
        let options = RequestOptions::get().bearer(access_token);
        let response =
            request_with_retry(self.backend.transport(), &direct.api, &direct.path, &options)
                .await?;

        if !response.ok() {
            warn!(status = response.status, "Google rejected the access token");
            return Err(AuthError::Auth(format!(
                "Google rejected the access token ({})",
                response.status
            )));
        }

        let profile: GoogleProfile = response.json()?;
        if profile.email_verified != Some(true) {
            warn!(sub = %profile.sub, "Google account email is not verified");
            return Err(AuthError::Auth("Google account email is not verified".into()));
        }
        let email = profile
            .email
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AuthError::Auth("Google profile has no email".into()))?;

        debug!(sub = %profile.sub, "Google profile verified");
        Ok(UserInfo {
            id: profile.sub,
            email,
            nickname: profile.name,
            provider: ProviderKind::Google,
        })
    }
}

#[async_trait]
impl LoginProvider for GoogleAuthProvider {
    fn provider_name(&self) -> ProviderKind {
        ProviderKind::Google
    }

    fn config(&self) -> &AuthProviderConfig {
        &self.config.base
    }

    async fn login(&self, request: &LoginRequest) -> ApiResponse<LoginData> {
        match oauth_login_body(ProviderKind::Google, request, &self.config.client_id) {
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
        let Some(direct) = &self.direct else {
            return self.backend.validate(GROUP.validate, access_token).await;
        };
        match self.fetch_profile(direct, access_token).await {
            Ok(user) => ApiResponse::success(
                "Token is valid",
                TokenValidation {
                    valid: true,
                    user: Some(user),
                    expires_at: None,
                },
            ),
            Err(e @ AuthError::Network(_)) => e.into(),
            Err(e) => ApiResponse::token_validation_error(e.to_string()),
        }
    }

    async fn get_user_info(&self, access_token: &str) -> ApiResponse<UserInfo> {
        let Some(direct) = &self.direct else {
            return self.backend.user_info(GROUP.user_info, access_token).await;
        };
        match self.fetch_profile(direct, access_token).await {
            Ok(user) => ApiResponse::success("User information loaded", user),
            Err(e @ AuthError::Network(_)) => e.into(),
            Err(e) => ApiResponse::error("USER_INFO_ERROR", e.to_string()),
        }
    }

    async fn is_available(&self) -> ApiResponse<bool> {
        self.backend.health().await
    }
}
