//! Platform-conditional request shaping.
//!
//! On `web` the refresh token rides in an HTTP-only cookie and never appears in
//! a body. On `app` (and `react-native`, which shapes requests the same way)
//! the refresh token and device id travel explicitly in the JSON body.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;

use crate::error::{AuthError, Result};
use crate::net::RequestOptions;

/// The runtime the client is embedded in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    #[default]
    Web,
    App,
    ReactNative,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Web => "web",
            Platform::App => "app",
            Platform::ReactNative => "react-native",
        }
    }

    /// True when the refresh token is carried as a cookie.
    pub fn uses_cookie_refresh(self) -> bool {
        matches!(self, Platform::Web)
    }

    /// True when request bodies carry tokens and device ids.
    pub fn uses_body_tokens(self) -> bool {
        !self.uses_cookie_refresh()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "web" => Ok(Platform::Web),
            "app" => Ok(Platform::App),
            "react-native" | "react_native" | "reactnative" => Ok(Platform::ReactNative),
            other => Err(AuthError::config(format!("Unknown platform: {other}"))),
        }
    }
}

/// Shape a login request body for the platform.
///
/// The device id is only sent from `app`-style platforms; web logins ask the
/// backend to set the refresh cookie instead.
pub fn shape_login(platform: Platform, body: serde_json::Value, device_id: Option<&str>) -> RequestOptions {
    let mut options = RequestOptions::post(body);
    match platform {
        Platform::Web => options = options.with_credentials(),
        Platform::App | Platform::ReactNative => {
            if let Some(device_id) = device_id.filter(|d| !d.is_empty()) {
                options = options.body_field("deviceId", device_id);
            }
        }
    }
    options
}

/// Shape a refresh or logout request that must carry the refresh token.
///
/// On `web` the token argument is ignored and cookies are attached. Elsewhere
/// a missing or empty refresh token is rejected before any network call.
pub fn shape_refresh(
    platform: Platform,
    refresh_token: Option<&str>,
    device_id: Option<&str>,
) -> Result<RequestOptions> {
    if platform.uses_cookie_refresh() {
        return Ok(RequestOptions::post(json!({})).with_credentials());
    }

    let refresh_token = refresh_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::validation("refresh token is required on this platform"))?;

    let mut options = RequestOptions::post(json!({ "refreshToken": refresh_token }));
    if let Some(device_id) = device_id.filter(|d| !d.is_empty()) {
        options = options.body_field("deviceId", device_id);
    }
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_platform() {
        assert_eq!("web".parse::<Platform>().unwrap(), Platform::Web);
        assert_eq!("App".parse::<Platform>().unwrap(), Platform::App);
        assert_eq!("react-native".parse::<Platform>().unwrap(), Platform::ReactNative);
        assert!("desktop".parse::<Platform>().is_err());
    }

    #[test]
    fn test_serde_uses_kebab_case() {
        let json = serde_json::to_string(&Platform::ReactNative).unwrap();
        assert_eq!(json, "\"react-native\"");
    }

    #[test]
    fn test_web_refresh_never_puts_token_in_body() {
        let options = shape_refresh(Platform::Web, Some("secret-refresh"), Some("dev-1")).unwrap();
        assert!(options.with_credentials);
        let body = options.body.unwrap();
        assert!(body.get("refreshToken").is_none());
        assert!(body.get("deviceId").is_none());
    }

    #[test]
    fn test_app_refresh_puts_token_and_device_in_body() {
        let options = shape_refresh(Platform::App, Some("r-1"), Some("dev-1")).unwrap();
        assert!(!options.with_credentials);
        let body = options.body.unwrap();
        assert_eq!(body["refreshToken"], "r-1");
        assert_eq!(body["deviceId"], "dev-1");
    }

    #[test]
    fn test_app_refresh_requires_token() {
        let err = shape_refresh(Platform::App, None, None).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        let err = shape_refresh(Platform::ReactNative, Some(""), None).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_login_device_id_only_on_app() {
        let web = shape_login(Platform::Web, json!({"email": "a"}), Some("dev"));
        assert!(web.body.unwrap().get("deviceId").is_none());
        assert!(web.with_credentials);

        let app = shape_login(Platform::App, json!({"email": "a"}), Some("dev"));
        assert_eq!(app.body.unwrap()["deviceId"], "dev");
    }
}
