//! Error taxonomy for the authentication layer.
//!
//! Internal code propagates [`AuthError`] with `?`; every public operation
//! converts it into an [`ApiResponse::Error`](crate::envelope::ApiResponse)
//! before returning, so no error escapes a request-time call.

use crate::transport::TransportError;

/// Result type alias using [`AuthError`].
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur while orchestrating authentication.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    /// A required field is missing or malformed. Raised before any network call.
    #[error("{0}")]
    Validation(String),

    /// Transport or timeout failure after retries were exhausted.
    #[error("Network error: {0}")]
    Network(#[from] TransportError),

    /// The backend answered with a 5xx status.
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Business-level authentication failure (invalid code, provider mismatch, ...).
    #[error("{0}")]
    Auth(String),

    /// Response body was not JSON or did not match the expected schema.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Token store or key/value medium failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Deployment or programmer error detected at construction time.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The selected provider does not implement the requested capability.
    #[error("{0}")]
    Unsupported(String),

    /// Unknown, mismatched or already consumed OAuth state (possible CSRF).
    #[error("Invalid state token")]
    InvalidState,

    /// The OAuth state outlived its time-to-live.
    #[error("Flow expired")]
    FlowExpired,

    /// A react-native-only operation was called on another platform.
    #[error("{0} is not available on this platform")]
    PlatformUnavailable(String),
}

impl AuthError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        AuthError::Validation(msg.into())
    }

    /// Create a storage error.
    pub fn storage(msg: impl Into<String>) -> Self {
        AuthError::Storage(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        AuthError::Config(msg.into())
    }

    /// Short machine-oriented code carried in the envelope's `error` field.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Network(_) => "NETWORK_ERROR",
            Self::Server { .. } => "SERVER_ERROR",
            Self::Auth(_) => "AUTH_ERROR",
            Self::Parse(_) => "PARSE_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Unsupported(_) => "UNSUPPORTED",
            Self::InvalidState => "INVALID_STATE",
            Self::FlowExpired => "FLOW_EXPIRED",
            Self::PlatformUnavailable(_) => "PLATFORM_UNAVAILABLE",
        }
    }

    /// Whether the failure happened on the wire rather than in business logic.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        AuthError::Parse(err.to_string())
    }
}
