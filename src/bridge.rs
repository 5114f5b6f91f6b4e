//! React-native host bridge.
//!
//! On react-native the host app owns the real tokens. The core talks to it
//! through [`NativeBridge`] and never sees a credential.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::error::Result;
use crate::transport::Method;
use crate::types::{ProviderKind, UserInfo};

/// Session state as reported by the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeSession {
    pub is_logged_in: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_profile: Option<UserInfo>,
}

/// An API call the host performs with its own credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeApiRequest {
    #[serde(with = "method_serde")]
    pub method: Method,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl NativeApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeApiResponse {
    pub status: u16,
    #[serde(default)]
    pub body: Value,
}

impl NativeApiResponse {
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

mod method_serde {
    use super::Method;
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn serialize<S: Serializer>(method: &Method, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(method.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Method, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            other => Err(D::Error::custom(format!("unsupported method {other}"))),
        }
    }
}

/// Asynchronous status notifications from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeAuthStatus {
    Started,
    CallbackReceived,
    Success,
    Error,
    TokenRefreshed,
    SignedOut,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeAuthEvent {
    pub status: NativeAuthStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl NativeAuthEvent {
    pub fn new(status: NativeAuthStatus) -> Self {
        Self {
            status,
            provider: None,
            message: None,
        }
    }

    pub fn for_provider(status: NativeAuthStatus, provider: ProviderKind) -> Self {
        Self {
            status,
            provider: Some(provider),
            message: None,
        }
    }
}

/// Listener callback for [`NativeAuthEvent`]s.
pub type NativeListener = Arc<dyn Fn(&NativeAuthEvent) + Send + Sync>;

/// Handle returned by `add_listener`, used to remove the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Capabilities the react-native host exposes.
#[async_trait]
pub trait NativeBridge: Send + Sync {
    /// Whether the host module is loaded and answering.
    async fn is_available(&self) -> bool {
        true
    }

    async fn start_oauth(&self, provider: ProviderKind) -> Result<bool>;

    async fn get_session(&self) -> Result<NativeSession>;

    async fn sign_out(&self) -> Result<bool>;

    async fn call_with_auth(&self, request: NativeApiRequest) -> Result<NativeApiResponse>;

    fn add_listener(&self, listener: NativeListener) -> ListenerId;

    fn remove_listener(&self, id: ListenerId) -> bool;
}

/// Listener registry for bridge implementations.
#[derive(Default)]
pub struct NativeEventHub {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, NativeListener)>>,
}

impl std::fmt::Debug for NativeEventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeEventHub")
            .field("listeners", &self.len())
            .finish()
    }
}

impl NativeEventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: NativeListener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        id
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Deliver `event` to every listener. Listeners run outside the lock, so
    /// they may add or remove listeners themselves.
    pub fn emit(&self, event: &NativeAuthEvent) {
        let snapshot: Vec<NativeListener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        debug!(status = ?event.status, listeners = snapshot.len(), "Emitting native auth event");
        for listener in snapshot {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process bridge that simulates a host app. Used by tests and demos.
#[derive(Debug, Default)]
pub struct FakeNativeBridge {
    session: Mutex<NativeSession>,
    unavailable: bool,
    hub: NativeEventHub,
}

impl FakeNativeBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bridge whose host module is missing.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Start out already signed in as `user`.
    pub fn signed_in(user: UserInfo) -> Self {
        Self {
            session: Mutex::new(NativeSession {
                is_logged_in: true,
                user_profile: Some(user),
            }),
            ..Self::default()
        }
    }

    fn session(&self) -> std::sync::MutexGuard<'_, NativeSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl NativeBridge for FakeNativeBridge {
    async fn is_available(&self) -> bool {
        !self.unavailable
    }

    async fn start_oauth(&self, provider: ProviderKind) -> Result<bool> {
        self.hub
            .emit(&NativeAuthEvent::for_provider(NativeAuthStatus::Started, provider));
        {
            let mut session = self.session();
            session.is_logged_in = true;
            session.user_profile = Some(UserInfo {
                id: format!("native-{provider}"),
                email: format!("native@{provider}.example"),
                nickname: None,
                provider,
            });
        }
        self.hub
            .emit(&NativeAuthEvent::for_provider(NativeAuthStatus::Success, provider));
        Ok(true)
    }

    async fn get_session(&self) -> Result<NativeSession> {
        Ok(self.session().clone())
    }

    async fn sign_out(&self) -> Result<bool> {
        *self.session() = NativeSession::default();
        self.hub.emit(&NativeAuthEvent::new(NativeAuthStatus::SignedOut));
        Ok(true)
    }

    async fn call_with_auth(&self, request: NativeApiRequest) -> Result<NativeApiResponse> {
        let logged_in = self.session().is_logged_in;
        if !logged_in {
            return Ok(NativeApiResponse {
                status: 401,
                body: json!({"success": false, "message": "not signed in", "error": "AUTH_ERROR"}),
            });
        }
        Ok(NativeApiResponse {
            status: 200,
            body: json!({
                "success": true,
                "message": "ok",
                "data": {"method": request.method.as_str(), "path": request.path}
            }),
        })
    }

    fn add_listener(&self, listener: NativeListener) -> ListenerId {
        self.hub.add(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.hub.remove(id)
    }
}
