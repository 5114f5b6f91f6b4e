//! Single-use OAuth state records.
//!
//! Before the user is sent to the provider, a random state and PKCE verifier
//! are persisted. The callback must present the same state; the record is
//! deleted on first use and rejected once it is older than the TTL.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{AuthError, Result};
use crate::store::KeyValueStore;
use crate::types::{LoginRequest, OAuthLoginRequest, ProviderKind};

use super::authorize::AuthorizeEndpoint;
use super::callback::{CallbackParams, validate_callback_params};
use super::message::CallbackMessage;
use super::pkce::{generate_code_challenge, generate_code_verifier, generate_state};

/// State records expire after 15 minutes.
pub const DEFAULT_STATE_TTL: Duration = Duration::from_secs(15 * 60);

const STATE_KEY: &str = "oauth_pending_states";

/// Everything needed to finish a flow once the provider calls back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PkceState {
    pub state: String,
    pub code_verifier: String,
    pub provider: ProviderKind,
    pub redirect_uri: String,
    /// Unix seconds.
    pub created_at: i64,
}

/// Returned by [`OAuthStateController::begin`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationStart {
    /// Send the user here.
    pub url: String,
    pub state: String,
}

type PendingStates = BTreeMap<String, PkceState>;

/// Persists pending flows in a [`KeyValueStore`] and checks callbacks.
pub struct OAuthStateController {
    kv: Arc<dyn KeyValueStore>,
    key: String,
    ttl_secs: i64,
    // Serializes read-modify-write cycles on the pending map.
    lock: Mutex<()>,
}

impl std::fmt::Debug for OAuthStateController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthStateController")
            .field("medium", &self.kv.name())
            .field("key", &self.key)
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

impl OAuthStateController {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            key: STATE_KEY.to_string(),
            ttl_secs: DEFAULT_STATE_TTL.as_secs() as i64,
            lock: Mutex::new(()),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_secs = ttl.as_secs() as i64;
        self
    }

    async fn load(&self) -> Result<PendingStates> {
        match self.kv.get(&self.key).await? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                AuthError::storage(format!("Pending OAuth state is corrupt: {e}"))
            }),
            None => Ok(PendingStates::new()),
        }
    }

    async fn persist(&self, pending: &PendingStates) -> Result<()> {
        if pending.is_empty() {
            return self.kv.remove(&self.key).await;
        }
        let json = serde_json::to_string(pending)?;
        self.kv.set(&self.key, &json).await
    }

    fn is_expired(&self, record: &PkceState, now: i64) -> bool {
        now - record.created_at > self.ttl_secs
    }

    /// Start a flow: persist a fresh state and verifier, then return the
    /// authorization URL.
    #[instrument(skip(self, endpoint, client_id), fields(provider = %endpoint.provider))]
    pub async fn begin(
        &self,
        endpoint: &AuthorizeEndpoint,
        client_id: &str,
        redirect_uri: &str,
    ) -> Result<AuthorizationStart> {
        if client_id.is_empty() {
            return Err(AuthError::config(format!(
                "{} client id is not configured",
                endpoint.provider.display_name()
            )));
        }

        let record = PkceState {
            state: generate_state(),
            code_verifier: generate_code_verifier(),
            provider: endpoint.provider,
            redirect_uri: redirect_uri.to_string(),
            created_at: Utc::now().timestamp(),
        };
        let challenge = generate_code_challenge(&record.code_verifier);
        let url = endpoint.build_url(client_id, redirect_uri, &record.state, &challenge);
        let state = record.state.clone();

        {
            let _guard = self.lock.lock().await;
            let mut pending = self.load().await?;
            pending.insert(state.clone(), record);
            self.persist(&pending).await?;
        }

        info!("Started OAuth flow");
        Ok(AuthorizationStart { url, state })
    }

    /// Look up and delete the record for `state`.
    ///
    /// Unknown or already consumed states are [`AuthError::InvalidState`];
    /// records past the TTL are deleted and reported as
    /// [`AuthError::FlowExpired`].
    #[instrument(skip_all)]
    pub async fn consume_state(&self, state: &str) -> Result<PkceState> {
        let _guard = self.lock.lock().await;
        let mut pending = self.load().await?;
        let Some(record) = pending.remove(state) else {
            warn!("OAuth callback presented an unknown state");
            return Err(AuthError::InvalidState);
        };
        self.persist(&pending).await?;

        if self.is_expired(&record, Utc::now().timestamp()) {
            warn!(provider = %record.provider, "OAuth state expired");
            return Err(AuthError::FlowExpired);
        }
        Ok(record)
    }

    /// Drop every expired record. Returns how many were removed.
    pub async fn cleanup_expired_states(&self) -> Result<usize> {
        let _guard = self.lock.lock().await;
        let mut pending = self.load().await?;
        let now = Utc::now().timestamp();
        let before = pending.len();
        pending.retain(|_, record| !self.is_expired(record, now));
        let removed = before - pending.len();
        if removed > 0 {
            self.persist(&pending).await?;
            debug!(removed, "Cleaned up expired OAuth states");
        }
        Ok(removed)
    }

    /// Finish a redirect callback for `provider`, producing the login request
    /// to hand to the manager.
    pub async fn complete_redirect(
        &self,
        provider: ProviderKind,
        params: &CallbackParams,
    ) -> Result<LoginRequest> {
        let (code, state) = validate_callback_params(params)?;
        self.complete(provider, code, &state).await
    }

    /// Finish a cross-window callback for `provider`.
    pub async fn complete_message(
        &self,
        provider: ProviderKind,
        message: CallbackMessage,
    ) -> Result<LoginRequest> {
        match message {
            CallbackMessage::Callback { code, state } => self.complete(provider, code, &state).await,
            CallbackMessage::Error {
                error,
                error_description,
            } => Err(AuthError::Auth(format!(
                "{error}: {}",
                error_description.as_deref().unwrap_or("Unknown error")
            ))),
        }
    }

    async fn complete(&self, provider: ProviderKind, code: String, state: &str) -> Result<LoginRequest> {
        let record = self.consume_state(state).await?;
        if record.provider != provider {
            warn!(
                expected = %provider,
                actual = %record.provider,
                "Provider mismatch in OAuth callback"
            );
            return Err(AuthError::InvalidState);
        }
        Ok(LoginRequest::OAuth(OAuthLoginRequest {
            provider,
            auth_code: code,
            redirect_uri: Some(record.redirect_uri),
            code_verifier: Some(record.code_verifier),
            device_id: None,
        }))
    }
}
