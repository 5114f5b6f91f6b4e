//! Authentication session orchestrator.
//!
//! [`AuthManager`] ties one [`LoginProvider`] to one [`TokenStore`]. It
//! validates requests before any network call, delegates to the provider and
//! writes successful results through to the store.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::bridge::{NativeApiRequest, NativeApiResponse, NativeBridge, NativeSession};
use crate::config::{ApiConfig, ClientConfig, ProviderSection};
use crate::envelope::ApiResponse;
use crate::error::{AuthError, Result};
use crate::platform::Platform;
use crate::providers::{EmailVerifiable, LoginProvider, ProviderOptions, create_provider};
use crate::store::{TokenStore, TokenStoreOptions, TokenStoreType, create_token_store};
use crate::transport::{HttpTransport, ReqwestTransport};
use crate::types::{
    EmailVerificationRequest, LoginData, LoginRequest, LogoutRequest, ProviderKind,
    RefreshTokenRequest, SessionStatus, TokenValidation, UserInfo, VerificationStatus,
    VerifyEmailRequest,
};

/// Orchestrates login, logout, refresh and session queries.
///
/// Overlapping `login`/`logout`/`refresh_token` calls on one manager are not
/// serialized; callers that need that must serialize them.
pub struct AuthManager {
    provider: Arc<dyn LoginProvider>,
    token_store: Arc<dyn TokenStore>,
    platform: Platform,
    bridge: Option<Arc<dyn NativeBridge>>,
}

impl std::fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManager")
            .field("provider", &self.provider.provider_name())
            .field("token_store", &self.token_store.name())
            .field("platform", &self.platform)
            .field("bridge", &self.bridge.is_some())
            .finish()
    }
}

impl AuthManager {
    pub fn builder() -> AuthManagerBuilder {
        AuthManagerBuilder::default()
    }

    pub fn provider(&self) -> &Arc<dyn LoginProvider> {
        &self.provider
    }

    pub fn token_store(&self) -> &Arc<dyn TokenStore> {
        &self.token_store
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn native_bridge(&self) -> Option<&Arc<dyn NativeBridge>> {
        self.bridge.as_ref()
    }

    /// The provider's email verification capability, if it has one.
    pub fn email_verifiable(&self) -> Option<&dyn EmailVerifiable> {
        self.provider.as_email_verifiable()
    }

    // =========================================================================
    // Session lifecycle
    // =========================================================================

    /// Log in and store the issued token.
    #[instrument(skip(self, request), fields(provider = %request.provider()))]
    pub async fn login(&self, request: &LoginRequest) -> ApiResponse<LoginData> {
        if let Err(e) = request
            .validate()
            .and_then(|()| self.check_compatibility(request))
        {
            debug!(error = %e, "Login rejected before delegation");
            return e.into();
        }

        let response = self.provider.login(request).await;

        if let Some(token) = response.data().and_then(LoginData::to_token) {
            let saved = self.token_store.save_token(&token).await;
            if !saved.is_success() {
                warn!(
                    store = self.token_store.name(),
                    error = saved.message(),
                    "Login succeeded but the token could not be stored"
                );
            } else {
                info!("Login succeeded, token stored");
            }
        }
        response
    }

    fn check_compatibility(&self, request: &LoginRequest) -> Result<()> {
        let configured = self.provider.provider_name();
        let declared = request.provider();
        let compatible = match request {
            LoginRequest::Email(_) => configured.is_email_like() && declared.is_email_like(),
            LoginRequest::OAuth(_) => configured == declared,
        };
        if compatible {
            Ok(())
        } else {
            Err(AuthError::Auth(format!(
                "{} login is not supported by the configured {} provider",
                declared.display_name(),
                configured.display_name()
            )))
        }
    }

    /// Log out and remove the stored token.
    ///
    /// Requires a stored token; a caller-supplied access token alone is not
    /// enough. The stored access token is sent as the bearer token. On `app`
    /// the stored refresh token is added when the caller did not supply one. On
    /// `react-native` the host signs out and the provider is not called.
    #[instrument(skip(self, request), fields(provider = %self.provider.provider_name()))]
    pub async fn logout(&self, request: LogoutRequest) -> ApiResponse<Value> {
        let stored = match self.token_store.get_token().await.into_result() {
            Ok(stored) => stored,
            Err(e) => return e,
        };

        if self.platform == Platform::ReactNative {
            if stored.is_none() {
                return ApiResponse::validation_error("No active session to log out of");
            }
            return self.token_store.remove_token().await.map(|()| Value::Null);
        }

        let Some(token) = stored else {
            return ApiResponse::validation_error("No stored token to log out with");
        };
        let mut request = request;
        request.access_token = Some(token.access_token.clone());
        if self.platform.uses_body_tokens()
            && request.refresh_token.as_deref().is_none_or(str::is_empty)
        {
            request.refresh_token = token.refresh_token().map(str::to_string);
        }

        let response = self.provider.logout(&request).await;
        if response.is_success() {
            let removed = self.token_store.remove_token().await;
            if !removed.is_success() {
                warn!(
                    store = self.token_store.name(),
                    error = removed.message(),
                    "Logout succeeded but the token could not be removed"
                );
            }
        }
        response
    }

    /// Refresh the session and overwrite the stored token.
    ///
    /// On `app` a missing refresh token is taken from the store, and a response
    /// without a new refresh token keeps the one that was used.
    #[instrument(skip(self, request), fields(provider = %self.provider.provider_name()))]
    pub async fn refresh_token(&self, request: RefreshTokenRequest) -> ApiResponse<LoginData> {
        let mut request = request;
        if request.provider.is_none() {
            request.provider = Some(self.provider.provider_name());
        }

        if self.platform.uses_body_tokens()
            && request.refresh_token.as_deref().is_none_or(str::is_empty)
        {
            let stored = match self.token_store.get_token().await.into_result() {
                Ok(stored) => stored,
                Err(e) => return e,
            };
            request.refresh_token = stored
                .as_ref()
                .and_then(|t| t.refresh_token())
                .map(str::to_string);
        }

        let response = self.provider.refresh_token(&request).await;

        if let Some(mut token) = response.data().and_then(LoginData::to_token) {
            if self.platform.uses_body_tokens() && token.refresh_token().is_none() {
                token.refresh_token = request.refresh_token.clone();
            }
            let saved = self.token_store.save_token(&token).await;
            if !saved.is_success() {
                warn!(
                    store = self.token_store.name(),
                    error = saved.message(),
                    "Refresh succeeded but the token could not be stored"
                );
            }
        }
        response
    }

    /// Validate the stored token with the provider.
    ///
    /// Fails without a network call when there is no token or it has expired.
    #[instrument(skip(self))]
    pub async fn validate_current_token(&self) -> ApiResponse<TokenValidation> {
        let token = match self.token_store.get_token().await.into_result() {
            Ok(Some(token)) => token,
            Ok(None) => return ApiResponse::token_validation_error("No stored token"),
            Err(e) => return e,
        };

        match self.token_store.is_token_expired().await.into_result() {
            Ok(false) => {}
            Ok(true) => return ApiResponse::token_validation_error("Stored token has expired"),
            Err(e) => return e,
        }

        let response = self.provider.validate_token(&token.access_token).await;
        match response.data() {
            Some(validation) if !validation.valid => {
                ApiResponse::token_validation_error("Token was rejected by the provider")
            }
            _ => response,
        }
    }

    /// Fetch the profile for the stored token.
    #[instrument(skip(self))]
    pub async fn get_current_user_info(&self) -> ApiResponse<UserInfo> {
        match self.token_store.get_token().await.into_result() {
            Ok(Some(token)) => self.provider.get_user_info(&token.access_token).await,
            Ok(None) => ApiResponse::error("AUTH_ERROR", "No stored token"),
            Err(e) => e,
        }
    }

    /// Two-tier check: no stored token answers `false` locally, otherwise the
    /// token is validated remotely. On `react-native` the host session decides.
    pub async fn is_authenticated(&self) -> ApiResponse<bool> {
        let has_token = match self.token_store.has_token().await.into_result() {
            Ok(has_token) => has_token,
            Err(e) => return e,
        };
        if !has_token {
            return ApiResponse::success("Not authenticated", false);
        }
        if self.platform == Platform::ReactNative {
            return ApiResponse::success("Native session active", true);
        }

        let validation = self.validate_current_token().await;
        let authenticated = validation.data().is_some_and(|v| v.valid);
        ApiResponse::success(
            if authenticated {
                "Authenticated"
            } else {
                "Not authenticated"
            },
            authenticated,
        )
    }

    /// Local view of the stored session. Never touches the network.
    pub async fn session_status(&self) -> ApiResponse<SessionStatus> {
        let provider = self.provider.provider_name();
        match self.token_store.get_token().await.into_result() {
            Ok(Some(token)) => {
                let now = Utc::now().timestamp();
                ApiResponse::success(
                    "",
                    SessionStatus {
                        provider,
                        authenticated: true,
                        expired: token.is_expired_at(now),
                        expires_in_secs: token.expires_at.map(|exp| (exp - now).max(0)),
                    },
                )
            }
            Ok(None) => ApiResponse::success(
                "",
                SessionStatus {
                    provider,
                    authenticated: false,
                    expired: false,
                    expires_in_secs: None,
                },
            ),
            Err(e) => e,
        }
    }

    /// Wipe every piece of stored auth state.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> ApiResponse<()> {
        self.token_store.clear().await
    }

    // =========================================================================
    // Email verification
    // =========================================================================

    pub async fn request_email_verification(
        &self,
        request: &EmailVerificationRequest,
    ) -> ApiResponse<VerificationStatus> {
        match self.email_verifiable() {
            Some(verifier) => verifier.request_email_verification(request).await,
            None => self.no_email_verification().into(),
        }
    }

    pub async fn verify_email(&self, request: &VerifyEmailRequest) -> ApiResponse<VerificationStatus> {
        match self.email_verifiable() {
            Some(verifier) => verifier.verify_email(request).await,
            None => self.no_email_verification().into(),
        }
    }

    fn no_email_verification(&self) -> AuthError {
        AuthError::Unsupported(format!(
            "{} provider does not support email verification",
            self.provider.provider_name().display_name()
        ))
    }

    // =========================================================================
    // React-native surface
    // =========================================================================

    fn native(&self, operation: &str) -> Result<&Arc<dyn NativeBridge>> {
        match (&self.bridge, self.platform) {
            (Some(bridge), Platform::ReactNative) => Ok(bridge),
            _ => Err(AuthError::PlatformUnavailable(operation.to_string())),
        }
    }

    pub async fn is_native_bridge_available(&self) -> ApiResponse<bool> {
        match self.native("Native bridge") {
            Ok(bridge) => ApiResponse::success("", bridge.is_available().await),
            Err(e) => e.into(),
        }
    }

    #[instrument(skip(self))]
    pub async fn start_native_oauth(&self, provider: ProviderKind) -> ApiResponse<bool> {
        let bridge = match self.native("Native OAuth") {
            Ok(bridge) => bridge,
            Err(e) => return e.into(),
        };
        match bridge.start_oauth(provider).await {
            Ok(true) => ApiResponse::success("Native OAuth completed", true),
            Ok(false) => ApiResponse::error(
                "AUTH_ERROR",
                format!("{} sign-in was cancelled or failed", provider.display_name()),
            ),
            Err(e) => e.into(),
        }
    }

    pub async fn get_native_session_info(&self) -> ApiResponse<NativeSession> {
        match self.native("Native session info") {
            Ok(bridge) => ApiResponse::from_result(bridge.get_session().await, ""),
            Err(e) => e.into(),
        }
    }

    /// Have the host perform an authenticated API call with its own token.
    #[instrument(skip(self, request), fields(path = %request.path))]
    pub async fn call_native_api(&self, request: NativeApiRequest) -> ApiResponse<NativeApiResponse> {
        let bridge = match self.native("Native API call") {
            Ok(bridge) => bridge,
            Err(e) => return e.into(),
        };
        match bridge.call_with_auth(request).await {
            Ok(response) if response.ok() => ApiResponse::success("", response),
            Ok(response) if response.status >= 500 => ApiResponse::server_error(response.status),
            Ok(response) => ApiResponse::error(
                "AUTH_ERROR",
                response
                    .body
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Native API call failed ({})", response.status)),
            ),
            Err(e) => e.into(),
        }
    }
}

// =============================================================================
// AuthManagerBuilder
// =============================================================================

/// Builder for [`AuthManager`]. Configuration mistakes fail in [`build`].
///
/// [`build`]: AuthManagerBuilder::build
#[derive(Default)]
pub struct AuthManagerBuilder {
    provider: Option<Arc<dyn LoginProvider>>,
    provider_type: Option<ProviderKind>,
    provider_section: ProviderSection,
    transport: Option<Arc<dyn HttpTransport>>,
    api: ApiConfig,
    platform: Option<Platform>,
    token_store: Option<Arc<dyn TokenStore>>,
    token_store_type: Option<TokenStoreType>,
    token_store_options: TokenStoreOptions,
    bridge: Option<Arc<dyn NativeBridge>>,
}

impl AuthManagerBuilder {
    /// Seed the builder from a loaded [`ClientConfig`].
    pub fn from_config(config: &ClientConfig) -> Self {
        let mut builder = Self {
            api: config.api.clone(),
            platform: Some(config.platform),
            provider_type: config.provider.provider_type,
            provider_section: config.provider.clone(),
            token_store_options: TokenStoreOptions::from_section(&config.token_store),
            ..Self::default()
        };
        if config.token_store.store_type != TokenStoreType::default() {
            builder.token_store_type = Some(config.token_store.store_type);
        }
        builder
    }

    /// Use this provider instance.
    pub fn provider(mut self, provider: Arc<dyn LoginProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Build the provider through the factory.
    pub fn provider_type(mut self, kind: ProviderKind) -> Self {
        self.provider_type = Some(kind);
        self
    }

    /// Per-provider settings for [`provider_type`](Self::provider_type).
    pub fn provider_section(mut self, section: ProviderSection) -> Self {
        self.provider_section = section;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn api(mut self, api: ApiConfig) -> Self {
        self.api = api;
        self
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.token_store = Some(store);
        self
    }

    pub fn token_store_type(mut self, store_type: TokenStoreType) -> Self {
        self.token_store_type = Some(store_type);
        self
    }

    pub fn token_store_options(mut self, options: TokenStoreOptions) -> Self {
        self.token_store_options = options;
        self
    }

    /// Supplying a bridge selects the `react-native` platform.
    pub fn native_bridge(mut self, bridge: Arc<dyn NativeBridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    fn resolve_platform(&self) -> Platform {
        let implied_native = self.token_store_type == Some(TokenStoreType::ReactNative)
            || self.bridge.is_some();
        if implied_native {
            Platform::ReactNative
        } else {
            self.platform.unwrap_or_default()
        }
    }

    pub fn build(self) -> Result<AuthManager> {
        let platform = self.resolve_platform();

        if platform == Platform::ReactNative && self.bridge.is_none() {
            return Err(AuthError::config(
                "The react-native platform requires a native bridge",
            ));
        }

        let provider = match (self.provider, self.provider_type) {
            (Some(_), Some(_)) => {
                return Err(AuthError::config(
                    "Supply either a provider or a provider type, not both",
                ));
            }
            (None, None) => {
                return Err(AuthError::config("A provider or a provider type is required"));
            }
            (Some(provider), None) => provider,
            (None, Some(kind)) => {
                let transport = self
                    .transport
                    .unwrap_or_else(|| Arc::new(ReqwestTransport::new()));
                let options = ProviderOptions::new(transport, self.api)
                    .with_platform(platform)
                    .with_section(&self.provider_section);
                create_provider(kind, &options)?
            }
        };

        let token_store = match self.token_store {
            Some(store) => store,
            None => {
                let mut options = self.token_store_options;
                if options.bridge.is_none() {
                    options.bridge = self.bridge.clone();
                }
                let store_type = self.token_store_type.unwrap_or(match platform {
                    Platform::ReactNative => TokenStoreType::ReactNative,
                    Platform::Web | Platform::App => TokenStoreType::Memory,
                });
                create_token_store(store_type, &options)?
            }
        };

        info!(
            provider = %provider.provider_name(),
            store = token_store.name(),
            platform = %platform,
            "Auth manager ready"
        );

        Ok(AuthManager {
            provider,
            token_store,
            platform,
            bridge: self.bridge,
        })
    }
}
