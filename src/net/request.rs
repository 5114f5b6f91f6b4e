use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::{ApiConfig, DEFAULT_TIMEOUT_MS};
use crate::envelope::ApiResponse;
use crate::error::AuthError;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method, TransportError};

use super::retry::{RetryPolicy, execute_with_retry};

/// Timeout applied when neither the call nor the API config sets one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(DEFAULT_TIMEOUT_MS);

/// Per-call request shape, before the base URL is applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    pub timeout: Option<Duration>,
    pub with_credentials: bool,
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post(body: Value) -> Self {
        Self {
            method: Method::Post,
            body: Some(body),
            ..Self::default()
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach `Authorization: Bearer <token>`, replacing any previous value.
    pub fn bearer(mut self, token: &str) -> Self {
        self.headers
            .retain(|(k, _)| !k.eq_ignore_ascii_case("authorization"));
        self.header("Authorization", format!("Bearer {token}"))
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_credentials(mut self) -> Self {
        self.with_credentials = true;
        self
    }

    /// Set a top-level body field, creating an object body if needed.
    pub fn body_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        let body = self
            .body
            .get_or_insert_with(|| Value::Object(Default::default()));
        if let Value::Object(map) = body {
            map.insert(key.to_string(), value.into());
        }
        self
    }
}

/// Send one request with a timeout.
///
/// The timeout is `options.timeout`, then `api.timeout`, then ten seconds. The
/// timer is owned by the future returned here, so it is released on every
/// exit path, including when the caller drops the future.
pub async fn request(
    transport: &dyn HttpTransport,
    api: &ApiConfig,
    endpoint: &str,
    options: &RequestOptions,
) -> Result<HttpResponse, TransportError> {
    let timeout = options
        .timeout
        .or_else(|| api.timeout())
        .unwrap_or(DEFAULT_TIMEOUT);

    let req = HttpRequest {
        url: api.url_for(endpoint),
        method: options.method,
        headers: with_json_content_type(&options.headers, options.body.is_some()),
        body: options.body.clone(),
        timeout: Some(timeout),
        with_credentials: options.with_credentials,
    };

    debug!(method = req.method.as_str(), url = %req.url, "Sending request");

    match tokio::time::timeout(timeout, transport.send(req)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout(timeout)),
    }
}

/// [`request`] wrapped in the bounded backoff loop. Non-2xx responses are
/// returned as data and never retried.
#[instrument(skip(transport, api, options), fields(max_retries = api.max_retries()))]
pub async fn request_with_retry(
    transport: &dyn HttpTransport,
    api: &ApiConfig,
    endpoint: &str,
    options: &RequestOptions,
) -> Result<HttpResponse, TransportError> {
    let policy = RetryPolicy::for_api(api);
    execute_with_retry(&policy, |_| request(transport, api, endpoint, options)).await
}

/// Turn a raw response into an envelope.
///
/// A body carrying a boolean `success` field is the backend's own envelope and
/// wins. Otherwise an error status becomes a synthesized error envelope
/// (`SERVER_ERROR` for 5xx, `AUTH_ERROR` for 4xx). A 2xx body that is not JSON
/// or does not match `T` is a parse error.
pub fn handle_response<T: DeserializeOwned>(
    response: &HttpResponse,
    fallback_message: &str,
) -> Result<ApiResponse<T>, AuthError> {
    let parsed: Option<Value> = serde_json::from_str(response.text()).ok();

    if let Some(body) = &parsed {
        if body.get("success").is_some_and(Value::is_boolean) {
            return Ok(serde_json::from_value(body.clone())?);
        }
    }

    if !response.ok() {
        let detail = parsed
            .as_ref()
            .and_then(|b| b.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string);
        return Ok(synthesize_error(response.status, fallback_message, detail));
    }

    match parsed {
        Some(body) => Ok(ApiResponse::success(String::new(), serde_json::from_value(body)?)),
        None => Err(AuthError::Parse(format!(
            "expected a JSON body from the server (status {})",
            response.status
        ))),
    }
}

fn synthesize_error<T>(status: u16, fallback: &str, detail: Option<String>) -> ApiResponse<T> {
    let message = match detail {
        Some(detail) if !detail.is_empty() => format!("{fallback}: {detail}"),
        _ => format!("{fallback} ({status})"),
    };
    if status >= 500 {
        ApiResponse::error("SERVER_ERROR", message)
    } else {
        ApiResponse::error("AUTH_ERROR", message)
    }
}

fn with_json_content_type(headers: &[(String, String)], has_body: bool) -> Vec<(String, String)> {
    let mut headers = headers.to_vec();
    if has_body
        && !headers
            .iter()
            .any(|(k, _)| k.eq_ignore_ascii_case("content-type"))
    {
        headers.push(("Content-Type".to_string(), "application/json".to_string()));
    }
    headers
}
