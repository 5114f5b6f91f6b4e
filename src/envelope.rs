//! The result envelope shared by every public operation.
//!
//! On the wire an envelope is `{success, message, data, error?}`. In Rust it is
//! a two-variant enum, so "`data` is null iff `success` is false" holds by
//! construction.

use serde::de::{DeserializeOwned, Error as _};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::AuthError;

/// Uniform success/error wrapper.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse<T> {
    /// The operation succeeded and produced `data`.
    Success { message: String, data: T },
    /// The operation failed. `error` is a short code, `message` is display text.
    Error { message: String, error: String },
}

impl<T> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        ApiResponse::Success {
            message: message.into(),
            data,
        }
    }

    pub fn error(error: impl Into<String>, message: impl Into<String>) -> Self {
        ApiResponse::Error {
            message: message.into(),
            error: error.into(),
        }
    }

    /// A required field was missing or malformed.
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::error("VALIDATION_ERROR", message)
    }

    /// The transport failed after all retries.
    pub fn network_error() -> Self {
        Self::error(
            "NETWORK_ERROR",
            "Network request failed. Check your connection and try again.",
        )
    }

    /// The backend answered with an error status.
    pub fn server_error(status_code: u16) -> Self {
        Self::error(
            "SERVER_ERROR",
            format!("Server error ({status_code}). Please try again later."),
        )
    }

    pub fn token_validation_error(message: impl Into<String>) -> Self {
        Self::error("TOKEN_VALIDATION_ERROR", message)
    }

    pub fn user_info_error() -> Self {
        Self::error("USER_INFO_ERROR", "Failed to load user information.")
    }

    pub fn service_availability_error() -> Self {
        Self::error(
            "SERVICE_UNAVAILABLE",
            "The authentication service is currently unavailable.",
        )
    }

    /// Build an envelope from an internal result.
    pub fn from_result(result: crate::error::Result<T>, message: impl Into<String>) -> Self {
        match result {
            Ok(data) => Self::success(message, data),
            Err(err) => err.into(),
        }
    }

    /// Collapse a fallible envelope-producing call into a plain envelope.
    pub fn settle(outcome: crate::error::Result<Self>) -> Self {
        outcome.unwrap_or_else(Self::from)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ApiResponse::Success { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            ApiResponse::Success { message, .. } | ApiResponse::Error { message, .. } => message,
        }
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            ApiResponse::Success { data, .. } => Some(data),
            ApiResponse::Error { .. } => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            ApiResponse::Success { data, .. } => Some(data),
            ApiResponse::Error { .. } => None,
        }
    }

    /// The error code, if this is an error envelope.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            ApiResponse::Success { .. } => None,
            ApiResponse::Error { error, .. } => Some(error),
        }
    }

    /// Split into the payload or an error envelope of another payload type,
    /// for early returns.
    pub fn into_result<U>(self) -> Result<T, ApiResponse<U>> {
        match self {
            ApiResponse::Success { data, .. } => Ok(data),
            ApiResponse::Error { message, error } => Err(ApiResponse::Error { message, error }),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        match self {
            ApiResponse::Success { message, data } => ApiResponse::Success {
                message,
                data: f(data),
            },
            ApiResponse::Error { message, error } => ApiResponse::Error { message, error },
        }
    }
}

impl<T> From<AuthError> for ApiResponse<T> {
    fn from(err: AuthError) -> Self {
        match &err {
            AuthError::Network(_) => Self::network_error(),
            _ => Self::error(err.code(), err.to_string()),
        }
    }
}

impl<T: Serialize> Serialize for ApiResponse<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ApiResponse::Success { message, data } => {
                let mut s = serializer.serialize_struct("ApiResponse", 3)?;
                s.serialize_field("success", &true)?;
                s.serialize_field("message", message)?;
                s.serialize_field("data", data)?;
                s.end()
            }
            ApiResponse::Error { message, error } => {
                let mut s = serializer.serialize_struct("ApiResponse", 4)?;
                s.serialize_field("success", &false)?;
                s.serialize_field("message", message)?;
                s.serialize_field("error", error)?;
                s.serialize_field("data", &Value::Null)?;
                s.end()
            }
        }
    }
}

/// Loose wire shape used while decoding backend envelopes.
#[derive(Deserialize)]
struct WireEnvelope {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    error: Option<Value>,
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for ApiResponse<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = WireEnvelope::deserialize(deserializer)?;
        let message = wire.message.unwrap_or_default();

        if !wire.success {
            let error = match wire.error {
                Some(Value::String(code)) => code,
                Some(Value::Null) | None => {
                    if message.is_empty() {
                        "UNKNOWN_ERROR".to_string()
                    } else {
                        message.clone()
                    }
                }
                Some(other) => other.to_string(),
            };
            return Ok(ApiResponse::Error { message, error });
        }

        let data = decode_data::<T>(wire.data).map_err(D::Error::custom)?;
        Ok(ApiResponse::Success { message, data })
    }
}

/// Decode `data`, treating a missing/null payload as an empty object when the
/// target type cannot be built from `null`.
fn decode_data<T: DeserializeOwned>(data: Value) -> Result<T, serde_json::Error> {
    if data.is_null() {
        return serde_json::from_value::<T>(Value::Null)
            .or_else(|_| serde_json::from_value::<T>(Value::Object(Default::default())));
    }
    serde_json::from_value(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq, Default)]
    #[serde(default)]
    struct Flags {
        sent: bool,
    }

    #[test]
    fn test_error_serializes_with_null_data() {
        let resp: ApiResponse<String> = ApiResponse::validation_error("email is required");
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["error"], json!("VALIDATION_ERROR"));
        assert_eq!(value["message"], json!("email is required"));
        assert!(value["data"].is_null());
    }

    #[test]
    fn test_success_serializes_without_error_field() {
        let resp = ApiResponse::success("ok", 42);
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["success"], json!(true));
        assert_eq!(value["data"], json!(42));
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_backend_error_envelope_is_preserved() {
        let resp: ApiResponse<Value> = serde_json::from_value(json!({
            "success": false,
            "message": "인증 코드가 올바르지 않습니다",
            "error": "INVALID_CODE",
            "data": null
        }))
        .unwrap();
        assert_eq!(resp.error_code(), Some("INVALID_CODE"));
        assert_eq!(resp.message(), "인증 코드가 올바르지 않습니다");
        assert!(resp.data().is_none());
    }

    #[test]
    fn test_error_without_code_falls_back_to_message() {
        let resp: ApiResponse<Value> =
            serde_json::from_value(json!({"success": false, "message": "nope"})).unwrap();
        assert_eq!(resp.error_code(), Some("nope"));
    }

    #[test]
    fn test_null_data_decodes_into_defaulted_struct() {
        let resp: ApiResponse<Flags> =
            serde_json::from_value(json!({"success": true, "message": "sent"})).unwrap();
        assert_eq!(resp.data(), Some(&Flags::default()));
    }

    #[test]
    fn test_schema_violation_is_a_decode_error() {
        let result: Result<ApiResponse<u32>, _> =
            serde_json::from_value(json!({"success": true, "data": "not a number"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_helpers() {
        let err: ApiResponse<()> = ApiResponse::server_error(502);
        assert_eq!(err.error_code(), Some("SERVER_ERROR"));
        assert!(err.message().contains("502"));
        assert!(!err.is_success());

        let net: ApiResponse<()> = ApiResponse::network_error();
        assert_eq!(net.error_code(), Some("NETWORK_ERROR"));
    }

    #[test]
    fn test_from_auth_error() {
        let resp: ApiResponse<()> = AuthError::Auth("Google login is not supported".into()).into();
        assert_eq!(resp.error_code(), Some("AUTH_ERROR"));
        assert_eq!(resp.message(), "Google login is not supported");
    }

    #[test]
    fn test_map_keeps_error() {
        let resp: ApiResponse<u8> = ApiResponse::user_info_error();
        let mapped = resp.map(|v| v as u32 + 1);
        assert_eq!(mapped.error_code(), Some("USER_INFO_ERROR"));
        assert_eq!(ApiResponse::success("", 1u8).map(|v| v + 1).into_data(), Some(2));
    }
}
