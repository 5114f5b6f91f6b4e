//! Domain types exchanged between the manager, providers and token stores.

use chrono::Utc;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::AuthError;

// MARK: - Provider kind

/// Identity backend family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Email,
    Google,
    Kakao,
    Naver,
    /// In-process provider used by tests and demos. Accepts email requests.
    Fake,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Email => "email",
            ProviderKind::Google => "google",
            ProviderKind::Kakao => "kakao",
            ProviderKind::Naver => "naver",
            ProviderKind::Fake => "fake",
        }
    }

    /// Capitalized name for user-facing messages.
    pub fn display_name(self) -> &'static str {
        match self {
            ProviderKind::Email => "Email",
            ProviderKind::Google => "Google",
            ProviderKind::Kakao => "Kakao",
            ProviderKind::Naver => "Naver",
            ProviderKind::Fake => "Fake",
        }
    }

    /// Whether the provider accepts email/verification-code logins.
    pub fn is_email_like(self) -> bool {
        matches!(self, ProviderKind::Email | ProviderKind::Fake)
    }

    pub fn is_oauth(self) -> bool {
        matches!(
            self,
            ProviderKind::Google | ProviderKind::Kakao | ProviderKind::Naver
        )
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(ProviderKind::Email),
            "google" => Ok(ProviderKind::Google),
            "kakao" => Ok(ProviderKind::Kakao),
            "naver" => Ok(ProviderKind::Naver),
            "fake" => Ok(ProviderKind::Fake),
            other => Err(AuthError::config(format!("Unsupported provider type: {other}"))),
        }
    }
}

// MARK: - Token

/// Credentials for the current session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Unix timestamp in seconds. `None` means the token never expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl Token {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn with_expires_at(mut self, expires_at: i64) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Expired iff `now > expires_at`. A token without expiry never expires.
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|exp| now > exp)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp())
    }

    /// Seconds until expiry, negative once expired.
    pub fn expires_in_secs(&self) -> Option<i64> {
        self.expires_at.map(|exp| exp - Utc::now().timestamp())
    }

    /// Refresh token, treating an empty string as absent.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }
}

// MARK: - User

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    pub provider: ProviderKind,
}

/// Backends disagree on whether ids are strings or numbers.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!(
            "expected a string or numeric id, got {other}"
        ))),
    }
}

/// Embedded user objects without a provider tag are dropped rather than
/// failing the whole payload. Providers stamp their own tag afterwards.
fn lenient_user<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<UserInfo>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

// MARK: - Requests

/// Email + verification code login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailLoginRequest {
    pub provider: ProviderKind,
    pub email: String,
    pub verify_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

/// Authorization-code login for an OAuth provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthLoginRequest {
    pub provider: ProviderKind,
    pub auth_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_verifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

/// Login request. Deserialization picks the variant by the presence of
/// `email` or `authCode`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LoginRequest {
    Email(EmailLoginRequest),
    OAuth(OAuthLoginRequest),
}

impl LoginRequest {
    pub fn email(email: impl Into<String>, verify_code: impl Into<String>) -> Self {
        LoginRequest::Email(EmailLoginRequest {
            provider: ProviderKind::Email,
            email: email.into(),
            verify_code: verify_code.into(),
            device_id: None,
        })
    }

    pub fn oauth(provider: ProviderKind, auth_code: impl Into<String>) -> Self {
        LoginRequest::OAuth(OAuthLoginRequest {
            provider,
            auth_code: auth_code.into(),
            redirect_uri: None,
            code_verifier: None,
            device_id: None,
        })
    }

    /// The provider the caller declared.
    pub fn provider(&self) -> ProviderKind {
        match self {
            LoginRequest::Email(r) => r.provider,
            LoginRequest::OAuth(r) => r.provider,
        }
    }

    pub fn device_id(&self) -> Option<&str> {
        match self {
            LoginRequest::Email(r) => r.device_id.as_deref(),
            LoginRequest::OAuth(r) => r.device_id.as_deref(),
        }
    }

    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        let id = Some(device_id.into());
        match &mut self {
            LoginRequest::Email(r) => r.device_id = id,
            LoginRequest::OAuth(r) => r.device_id = id,
        }
        self
    }

    /// Check required fields before any network call.
    pub fn validate(&self) -> Result<(), AuthError> {
        match self {
            LoginRequest::Email(r) => {
                if !r.provider.is_email_like() {
                    return Err(AuthError::validation(format!(
                        "Email login is not valid for provider '{}'",
                        r.provider
                    )));
                }
                if r.email.trim().is_empty() {
                    return Err(AuthError::validation("email is required"));
                }
                if r.verify_code.trim().is_empty() {
                    return Err(AuthError::validation("verifyCode is required"));
                }
                Ok(())
            }
            LoginRequest::OAuth(r) => {
                if r.provider == ProviderKind::Email {
                    return Err(AuthError::validation(
                        "OAuth login requires an OAuth provider, not 'email'",
                    ));
                }
                if r.auth_code.trim().is_empty() {
                    return Err(AuthError::validation("authCode is required"));
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub provider: ProviderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

impl LogoutRequest {
    pub fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            access_token: None,
            refresh_token: None,
            device_id: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

impl RefreshTokenRequest {
    pub fn with_refresh_token(refresh_token: impl Into<String>) -> Self {
        Self {
            refresh_token: Some(refresh_token.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailVerificationRequest {
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyEmailRequest {
    pub email: String,
    pub verify_code: String,
}

// MARK: - Responses

/// Payload of a successful login or refresh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoginData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    /// Lifetime in seconds, used when `expires_at` is absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_user")]
    pub user: Option<UserInfo>,
}

impl LoginData {
    /// Build the stored token, if an access token was returned.
    ///
    /// A missing refresh token becomes an empty string: on the web it lives in
    /// a cookie the client never sees.
    pub fn to_token(&self) -> Option<Token> {
        let access_token = self.access_token.as_deref().filter(|t| !t.is_empty())?;
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|secs| Utc::now().timestamp() + secs));
        Some(Token {
            access_token: access_token.to_string(),
            refresh_token: Some(self.refresh_token.clone().unwrap_or_default()),
            expires_at,
        })
    }
}

pub type LoginResponse = LoginData;
pub type RefreshTokenResponse = LoginData;

/// Outcome of a token validation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenValidation {
    #[serde(default = "default_true")]
    pub valid: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_user"
    )]
    pub user: Option<UserInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl Default for TokenValidation {
    fn default() -> Self {
        Self {
            valid: true,
            user: None,
            expires_at: None,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerificationStatus {
    pub sent: bool,
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
}

/// Locally computed session summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub provider: ProviderKind,
    pub authenticated: bool,
    pub expired: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_secs: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_expiry_boundary() {
        let token = Token::new("a").with_expires_at(1_000);
        assert!(!token.is_expired_at(999));
        assert!(!token.is_expired_at(1_000));
        assert!(token.is_expired_at(1_001));
        assert!(!Token::new("a").is_expired_at(i64::MAX));
    }

    #[test]
    fn test_login_request_discriminates_on_fields() {
        let email: LoginRequest = serde_json::from_value(json!({
            "provider": "email", "email": "test@example.com", "verifyCode": "123456"
        }))
        .unwrap();
        assert!(matches!(email, LoginRequest::Email(_)));

        let oauth: LoginRequest = serde_json::from_value(json!({
            "provider": "google", "authCode": "code-1", "codeVerifier": "v"
        }))
        .unwrap();
        match oauth {
            LoginRequest::OAuth(r) => {
                assert_eq!(r.provider, ProviderKind::Google);
                assert_eq!(r.code_verifier.as_deref(), Some("v"));
            }
            other => panic!("unexpected {other:?}"),
        }

        let neither: Result<LoginRequest, _> =
            serde_json::from_value(json!({"provider": "google"}));
        assert!(neither.is_err());
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        assert!(LoginRequest::email("a@b.c", "").validate().is_err());
        assert!(LoginRequest::email("", "1").validate().is_err());
        assert!(LoginRequest::oauth(ProviderKind::Kakao, " ").validate().is_err());
        assert!(LoginRequest::oauth(ProviderKind::Email, "c").validate().is_err());
        assert!(LoginRequest::oauth(ProviderKind::Naver, "c").validate().is_ok());

        let mut google_email = LoginRequest::email("a@b.c", "1");
        if let LoginRequest::Email(r) = &mut google_email {
            r.provider = ProviderKind::Google;
        }
        assert!(google_email.validate().is_err());
    }

    #[test]
    fn test_login_data_to_token_defaults_refresh() {
        let data = LoginData {
            access_token: Some("acc".into()),
            ..LoginData::default()
        };
        let token = data.to_token().unwrap();
        assert_eq!(token.refresh_token.as_deref(), Some(""));
        assert_eq!(token.refresh_token(), None);
        assert!(LoginData::default().to_token().is_none());
    }

    #[test]
    fn test_provider_kind_parse_and_display() {
        assert_eq!("Kakao".parse::<ProviderKind>().unwrap(), ProviderKind::Kakao);
        assert!("github".parse::<ProviderKind>().is_err());
        assert_eq!(ProviderKind::Google.display_name(), "Google");
        assert_eq!(ProviderKind::Naver.to_string(), "naver");
    }

    #[test]
    fn test_numeric_user_id_and_untagged_user() {
        let user: UserInfo = serde_json::from_value(json!({
            "id": 42, "email": "a@b.c", "provider": "kakao"
        }))
        .unwrap();
        assert_eq!(user.id, "42");

        let data: LoginData = serde_json::from_value(json!({
            "accessToken": "acc",
            "user": {"id": "u1", "email": "a@b.c"}
        }))
        .unwrap();
        assert_eq!(data.access_token.as_deref(), Some("acc"));
        assert!(data.user.is_none());
    }

    #[test]
    fn test_token_wire_names() {
        let token = Token::new("a").with_refresh_token("r").with_expires_at(5);
        let value = serde_json::to_value(&token).unwrap();
        assert_eq!(value, json!({"accessToken": "a", "refreshToken": "r", "expiresAt": 5}));
    }

    mod expiry_props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(200))]

            /// A token is expired exactly when the clock has passed its expiry.
            #[test]
            fn expired_iff_now_past_expiry(exp in -1_000_000i64..4_000_000_000, now in -1_000_000i64..4_000_000_000) {
                let token = Token::new("a").with_expires_at(exp);
                prop_assert_eq!(token.is_expired_at(now), now > exp);
            }

            #[test]
            fn no_expiry_never_expires(now in any::<i64>()) {
                prop_assert!(!Token::new("a").is_expired_at(now));
            }

            /// Numeric and string ids decode to the same user id.
            #[test]
            fn numeric_ids_decode_as_strings(id in 0u64..u64::MAX) {
                let user: UserInfo = serde_json::from_value(json!({
                    "id": id, "email": "a@b.c", "provider": "email"
                })).unwrap();
                prop_assert_eq!(user.id, id.to_string());
            }
        }
    }
}
