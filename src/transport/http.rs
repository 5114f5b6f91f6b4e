//! reqwest-backed transport.

use std::time::Duration;

use reqwest::{Client, ClientBuilder};
use tracing::{debug, warn};

use super::{HttpRequest, HttpResponse, HttpTransport, Method, TransportError};

/// Default user agent for the library.
pub const USER_AGENT: &str = "auth-session/0.1.0";

/// Default connection timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP transport built on reqwest.
///
/// Keeps two clients: one with a cookie store, used for requests that travel
/// with credentials (the web refresh-token cookie), and one without.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    with_cookies: Client,
    plain: Client,
}

impl ReqwestTransport {
    /// Create a new transport with default settings.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a new builder.
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::default()
    }

    fn client_for(&self, request: &HttpRequest) -> &Client {
        if request.with_credentials {
            &self.with_cookies
        } else {
            &self.plain
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`ReqwestTransport`].
pub struct ReqwestTransportBuilder {
    user_agent: String,
    connect_timeout: Duration,
}

impl Default for ReqwestTransportBuilder {
    fn default() -> Self {
        Self {
            user_agent: USER_AGENT.to_string(),
            connect_timeout: CONNECT_TIMEOUT,
        }
    }
}

impl ReqwestTransportBuilder {
    /// Set a custom user agent.
    pub fn user_agent(mut self, ua: &str) -> Self {
        self.user_agent = ua.to_string();
        self
    }

    /// Set connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn base(&self) -> ClientBuilder {
        Client::builder()
            .user_agent(&self.user_agent)
            .connect_timeout(self.connect_timeout)
    }

    /// Build the transport.
    pub fn build(self) -> ReqwestTransport {
        let with_cookies = match self.base().cookie_store(true).build() {
            Ok(c) => c,
            Err(e) => {
                warn!("Failed to build HTTP client with custom config: {}; using defaults", e);
                Client::default()
            }
        };
        let plain = match self.base().build() {
            Ok(c) => c,
            Err(e) => {
                warn!("Failed to build HTTP client with custom config: {}; using defaults", e);
                Client::default()
            }
        };
        ReqwestTransport {
            with_cookies,
            plain,
        }
    }
}

fn map_error(err: reqwest::Error, timeout: Option<Duration>) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(timeout.unwrap_or_default())
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Request(err.to_string())
    }
}

#[async_trait::async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let client = self.client_for(&request);
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        debug!(method = request.method.as_str(), url = %request.url, "Sending request");
        let response = builder
            .send()
            .await
            .map_err(|e| map_error(e, request.timeout))?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| map_error(e, request.timeout))?;

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}
