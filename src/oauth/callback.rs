//! Redirect callback parameters.
//!
//! The provider redirects back with `?code=...&state=...`, or with
//! `?error=...&error_description=...` when the user declined.

use serde::Deserialize;
use tracing::warn;
use url::Url;

use crate::error::{AuthError, Result};

/// Query parameters from the OAuth redirect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Parse a raw query string, with or without the leading `?`.
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let value = Some(value.into_owned());
            match key.as_ref() {
                "code" => params.code = value,
                "state" => params.state = value,
                "error" => params.error = value,
                "error_description" => params.error_description = value,
                _ => {}
            }
        }
        params
    }

    /// Parse the query of a full redirect URL.
    pub fn from_url(redirect: &str) -> Result<Self> {
        let url = Url::parse(redirect)
            .map_err(|e| AuthError::validation(format!("Invalid callback URL: {e}")))?;
        Ok(Self::from_query(url.query().unwrap_or_default()))
    }
}

/// Validate callback parameters and extract `(code, state)`.
///
/// A provider-reported error or a missing code aborts the flow. A missing
/// state is treated as an invalid state.
pub fn validate_callback_params(params: &CallbackParams) -> Result<(String, String)> {
    if let Some(error) = &params.error {
        let desc = params
            .error_description
            .as_deref()
            .unwrap_or("Unknown error");
        warn!(error = %error, description = %desc, "OAuth error from provider");
        return Err(AuthError::Auth(format!("{error}: {desc}")));
    }

    let code = params
        .code
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AuthError::Auth("Missing authorization code in callback".to_string()))?;

    let state = params
        .state
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(AuthError::InvalidState)?;

    Ok((code.to_string(), state.to_string()))
}
