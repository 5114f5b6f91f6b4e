use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::AuthError;
use crate::platform::Platform;
use crate::store::TokenStoreType;
use crate::types::ProviderKind;

/// Default per-request timeout when neither the call nor the config sets one.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Default number of attempts for retried requests.
pub const DEFAULT_RETRY_COUNT: u32 = 3;

/// Google's OpenID userinfo endpoint, used by direct validation.
pub const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

/// Logical backend operations. The set is closed: unknown names are rejected
/// when deserializing an [`ApiEndpoints`] table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EndpointName {
    Login,
    Logout,
    Refresh,
    Validate,
    Me,
    Health,
    RequestVerification,
    VerifyEmail,
    GoogleLogin,
    GoogleLogout,
    GoogleRefresh,
    GoogleValidate,
    GoogleUserInfo,
    KakaoLogin,
    KakaoLogout,
    KakaoRefresh,
    KakaoValidate,
    KakaoUserInfo,
    NaverLogin,
    NaverLogout,
    NaverRefresh,
    NaverValidate,
    NaverUserInfo,
}

impl EndpointName {
    pub fn key(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Logout => "logout",
            Self::Refresh => "refresh",
            Self::Validate => "validate",
            Self::Me => "me",
            Self::Health => "health",
            Self::RequestVerification => "requestVerification",
            Self::VerifyEmail => "verifyEmail",
            Self::GoogleLogin => "googleLogin",
            Self::GoogleLogout => "googleLogout",
            Self::GoogleRefresh => "googleRefresh",
            Self::GoogleValidate => "googleValidate",
            Self::GoogleUserInfo => "googleUserInfo",
            Self::KakaoLogin => "kakaoLogin",
            Self::KakaoLogout => "kakaoLogout",
            Self::KakaoRefresh => "kakaoRefresh",
            Self::KakaoValidate => "kakaoValidate",
            Self::KakaoUserInfo => "kakaoUserInfo",
            Self::NaverLogin => "naverLogin",
            Self::NaverLogout => "naverLogout",
            Self::NaverRefresh => "naverRefresh",
            Self::NaverValidate => "naverValidate",
            Self::NaverUserInfo => "naverUserInfo",
        }
    }
}

/// Mapping of logical operation name to backend path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiEndpoints(BTreeMap<EndpointName, String>);

impl ApiEndpoints {
    /// An empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// The canonical path set exposed by the identity backend.
    pub fn defaults() -> Self {
        use EndpointName::*;
        let paths = [
            (Login, "/api/auth/email/login"),
            (Logout, "/api/auth/logout"),
            (Refresh, "/api/auth/refresh"),
            (Validate, "/api/auth/validate"),
            (Me, "/api/auth/me"),
            (Health, "/api/health"),
            (RequestVerification, "/api/auth/email/request-verification"),
            (VerifyEmail, "/api/auth/email/verify"),
            (GoogleLogin, "/api/auth/google/login"),
            (GoogleLogout, "/api/auth/google/logout"),
            (GoogleRefresh, "/api/auth/google/refresh"),
            (GoogleValidate, "/api/auth/google/validate"),
            (GoogleUserInfo, "/api/auth/google/me"),
            (KakaoLogin, "/api/auth/kakao/login"),
            (KakaoLogout, "/api/auth/kakao/logout"),
            (KakaoRefresh, "/api/auth/kakao/refresh"),
            (KakaoValidate, "/api/auth/kakao/validate"),
            (KakaoUserInfo, "/api/auth/kakao/me"),
            (NaverLogin, "/api/auth/naver/login"),
            (NaverLogout, "/api/auth/naver/logout"),
            (NaverRefresh, "/api/auth/naver/refresh"),
            (NaverValidate, "/api/auth/naver/validate"),
            (NaverUserInfo, "/api/auth/naver/me"),
        ];
        Self(
            paths
                .into_iter()
                .map(|(name, path)| (name, path.to_string()))
                .collect(),
        )
    }

    /// Set (or replace) the path for an endpoint.
    pub fn with(mut self, name: EndpointName, path: impl Into<String>) -> Self {
        self.0.insert(name, path.into());
        self
    }

    /// Remove an endpoint from the mapping.
    pub fn without(mut self, name: EndpointName) -> Self {
        self.0.remove(&name);
        self
    }

    pub fn get(&self, name: EndpointName) -> Option<&str> {
        self.0.get(&name).map(String::as_str)
    }

    /// Fetch a path that a provider declared as required.
    pub fn require(&self, name: EndpointName) -> Result<&str, AuthError> {
        self.get(name).ok_or_else(|| {
            AuthError::config(format!("Endpoint '{}' is not configured", name.key()))
        })
    }

    /// Verify that every endpoint in `required` is present.
    pub fn ensure(&self, required: &[EndpointName]) -> Result<(), AuthError> {
        let missing: Vec<&str> = required
            .iter()
            .filter(|name| !self.0.contains_key(name))
            .map(|name| name.key())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AuthError::config(format!(
                "Missing required endpoints: {}",
                missing.join(", ")
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// API configuration
// ---------------------------------------------------------------------------

/// Where and how to reach the identity backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    pub api_base_url: String,
    #[serde(default = "ApiEndpoints::defaults")]
    pub endpoints: ApiEndpoints,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::new("http://localhost:8080")
    }
}

impl ApiConfig {
    /// Config with the default endpoint set.
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            endpoints: ApiEndpoints::defaults(),
            timeout_ms: None,
            retry_count: None,
        }
    }

    pub fn with_endpoints(mut self, endpoints: ApiEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = Some(retry_count);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Number of attempts for retried requests.
    pub fn max_retries(&self) -> u32 {
        self.retry_count.unwrap_or(DEFAULT_RETRY_COUNT)
    }

    /// Absolute URL for an endpoint path.
    pub fn url_for(&self, endpoint: &str) -> String {
        let base = self.api_base_url.trim_end_matches('/');
        if endpoint.starts_with('/') {
            format!("{base}{endpoint}")
        } else {
            format!("{base}/{endpoint}")
        }
    }

    /// Apply provider-level tuning on top of this config.
    pub fn tuned(&self, provider: &AuthProviderConfig) -> Self {
        Self {
            timeout_ms: provider.timeout_ms.or(self.timeout_ms),
            retry_count: provider.retry_count.or(self.retry_count),
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Provider configuration
// ---------------------------------------------------------------------------

/// Tuning shared by every provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
}

/// How the Google provider validates tokens and loads the profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoogleValidation {
    /// Ask the backend's Google endpoint group.
    #[default]
    Backend,
    /// Call Google's userinfo endpoint and require `email_verified`.
    Direct,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoogleAuthProviderConfig {
    #[serde(flatten)]
    pub base: AuthProviderConfig,
    pub client_id: String,
    #[serde(default)]
    pub validation: GoogleValidation,
    #[serde(default = "default_google_userinfo_url")]
    pub userinfo_url: String,
}

impl GoogleAuthProviderConfig {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            base: AuthProviderConfig::default(),
            client_id: client_id.into(),
            validation: GoogleValidation::Backend,
            userinfo_url: default_google_userinfo_url(),
        }
    }

    pub fn direct(mut self, userinfo_url: impl Into<String>) -> Self {
        self.validation = GoogleValidation::Direct;
        self.userinfo_url = userinfo_url.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KakaoAuthProviderConfig {
    #[serde(flatten)]
    pub base: AuthProviderConfig,
    pub client_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NaverAuthProviderConfig {
    #[serde(flatten)]
    pub base: AuthProviderConfig,
    pub client_id: String,
}

/// Provider selection plus per-provider settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSection {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub provider_type: Option<ProviderKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<AuthProviderConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google: Option<GoogleAuthProviderConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kakao: Option<KakaoAuthProviderConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub naver: Option<NaverAuthProviderConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenStoreSection {
    #[serde(default, rename = "type")]
    pub store_type: TokenStoreType,
    /// Directory for the file-backed medium.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_google_userinfo_url() -> String {
    GOOGLE_USERINFO_URL.to_string()
}

// ---------------------------------------------------------------------------
// Environment override tracking
// ---------------------------------------------------------------------------

/// Tracks which settings were overridden by environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    overrides: HashMap<String, String>,
}

impl EnvOverrides {
    /// Check whether a setting key (e.g. "api.api_base_url") is overridden.
    pub fn is_overridden(&self, key: &str) -> bool {
        self.overrides.contains_key(key)
    }

    /// Get the env var name that overrides the given setting key.
    pub fn env_var_for(&self, key: &str) -> Option<&str> {
        self.overrides.get(key).map(String::as_str)
    }

    fn record(&mut self, key: &str, env_var: &str) {
        self.overrides.insert(key.to_string(), env_var.to_string());
    }
}

// ---------------------------------------------------------------------------
// Client configuration file
// ---------------------------------------------------------------------------

/// Everything needed to assemble an [`AuthManager`](crate::AuthManager) from a
/// file. The core itself only ever receives these values explicitly.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub platform: Platform,
    #[serde(default)]
    pub provider: ProviderSection,
    #[serde(default)]
    pub token_store: TokenStoreSection,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Env var overrides are not serialized to TOML.
    #[serde(skip)]
    pub env_overrides: EnvOverrides,
}

impl ClientConfig {
    /// Load configuration from a TOML file, then apply `AUTH_SESSION_*`
    /// environment overrides.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml_str(&content)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from TOML text without touching the environment.
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Save the file-level configuration.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {e}"))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        let mut ov = EnvOverrides::default();

        macro_rules! env_str {
            ($key:expr, $env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    $field = val;
                    ov.record($key, $env);
                }
            };
        }
        macro_rules! env_bool {
            ($key:expr, $env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    $field = matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
                    ov.record($key, $env);
                }
            };
        }
        macro_rules! env_parse_opt {
            ($key:expr, $env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    if let Ok(parsed) = val.parse() {
                        $field = Some(parsed);
                        ov.record($key, $env);
                    }
                }
            };
        }

        // -- API --
        env_str!("api.api_base_url", "AUTH_SESSION_API_BASE_URL", self.api.api_base_url);
        env_parse_opt!("api.timeout_ms", "AUTH_SESSION_TIMEOUT_MS", self.api.timeout_ms);
        env_parse_opt!("api.retry_count", "AUTH_SESSION_RETRY_COUNT", self.api.retry_count);

        // -- Platform / provider --
        if let Ok(val) = std::env::var("AUTH_SESSION_PLATFORM") {
            if let Ok(platform) = val.parse() {
                self.platform = platform;
                ov.record("platform", "AUTH_SESSION_PLATFORM");
            }
        }
        env_parse_opt!(
            "provider.type",
            "AUTH_SESSION_PROVIDER",
            self.provider.provider_type
        );
        if let Ok(val) = std::env::var("AUTH_SESSION_GOOGLE_CLIENT_ID") {
            match self.provider.google.as_mut() {
                Some(google) => google.client_id = val,
                None => self.provider.google = Some(GoogleAuthProviderConfig::new(val)),
            }
            ov.record("provider.google.client_id", "AUTH_SESSION_GOOGLE_CLIENT_ID");
        }

        // -- Logging --
        env_str!("logging.level", "AUTH_SESSION_LOG_LEVEL", self.logging.level);
        env_bool!("logging.json", "AUTH_SESSION_LOG_JSON", self.logging.json);

        self.env_overrides = ov;
    }
}
