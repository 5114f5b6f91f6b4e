//! Token store that defers to the react-native host.
//!
//! The host keeps the real credentials. This store holds nothing: it asks the
//! bridge for session health and signs out through it.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{instrument, warn};

use crate::bridge::NativeBridge;
use crate::envelope::ApiResponse;
use crate::types::Token;

use super::TokenStore;

/// Access token reported while the host holds a live session.
pub const NATIVE_PLACEHOLDER_TOKEN: &str = "native-session";

#[derive(Clone)]
pub struct NativeBridgeTokenStore {
    bridge: Arc<dyn NativeBridge>,
}

impl std::fmt::Debug for NativeBridgeTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeBridgeTokenStore").finish_non_exhaustive()
    }
}

impl NativeBridgeTokenStore {
    pub fn new(bridge: Arc<dyn NativeBridge>) -> Self {
        Self { bridge }
    }

    async fn sign_out(&self, message: &str) -> ApiResponse<()> {
        match self.bridge.sign_out().await {
            Ok(true) => ApiResponse::success(message, ()),
            Ok(false) => ApiResponse::error("STORAGE_ERROR", "Native sign-out was refused"),
            Err(e) => e.into(),
        }
    }

    async fn logged_in(&self) -> ApiResponse<bool> {
        match self.bridge.get_session().await {
            Ok(session) => ApiResponse::success("", session.is_logged_in),
            Err(e) => {
                warn!(error = %e, "Native session query failed");
                e.into()
            }
        }
    }
}

#[async_trait]
impl TokenStore for NativeBridgeTokenStore {
    /// The host owns the token; saving is accepted and ignored.
    async fn save_token(&self, _token: &Token) -> ApiResponse<()> {
        ApiResponse::success("Token is managed by the native host", ())
    }

    async fn get_token(&self) -> ApiResponse<Option<Token>> {
        match self.bridge.get_session().await {
            Ok(session) if session.is_logged_in => ApiResponse::success(
                "Native session active",
                Some(Token::new(NATIVE_PLACEHOLDER_TOKEN)),
            ),
            Ok(_) => ApiResponse::success("No native session", None),
            Err(e) => e.into(),
        }
    }

    #[instrument(skip(self))]
    async fn remove_token(&self) -> ApiResponse<()> {
        self.sign_out("Signed out").await
    }

    async fn has_token(&self) -> ApiResponse<bool> {
        self.logged_in().await
    }

    /// A dead native session reads as expired.
    async fn is_token_expired(&self) -> ApiResponse<bool> {
        self.logged_in().await.map(|logged_in| !logged_in)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> ApiResponse<()> {
        self.sign_out("Token store cleared").await
    }

    fn name(&self) -> &str {
        "react-native"
    }
}
