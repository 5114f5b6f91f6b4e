//! In-memory token store.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use tracing::instrument;

use crate::envelope::ApiResponse;
use crate::types::Token;

use super::TokenStore;

/// A single shared slot holding the current token.
///
/// Cloning the cell shares the slot, so a test can hand the same cell to a
/// store and inspect it afterwards.
#[derive(Debug, Clone, Default)]
pub struct TokenCell {
    inner: Arc<RwLock<Option<Token>>>,
}

impl TokenCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Token> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set(&self, token: Option<Token>) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = token;
    }
}

/// Token store backed by a [`TokenCell`]. The manager's default store.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    cell: TokenCell,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store backed by an existing cell.
    pub fn with_cell(cell: TokenCell) -> Self {
        Self { cell }
    }

    /// Store that starts out holding `token`.
    pub fn with_token(token: Token) -> Self {
        let cell = TokenCell::new();
        cell.set(Some(token));
        Self { cell }
    }

    pub fn cell(&self) -> &TokenCell {
        &self.cell
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    #[instrument(skip(self, token))]
    async fn save_token(&self, token: &Token) -> ApiResponse<()> {
        self.cell.set(Some(token.clone()));
        ApiResponse::success("Token saved", ())
    }

    async fn get_token(&self) -> ApiResponse<Option<Token>> {
        ApiResponse::success("Token loaded", self.cell.get())
    }

    #[instrument(skip(self))]
    async fn remove_token(&self) -> ApiResponse<()> {
        self.cell.set(None);
        ApiResponse::success("Token removed", ())
    }

    async fn has_token(&self) -> ApiResponse<bool> {
        ApiResponse::success("", self.cell.get().is_some())
    }

    async fn is_token_expired(&self) -> ApiResponse<bool> {
        let now = Utc::now().timestamp();
        let expired = self.cell.get().is_some_and(|t| t.is_expired_at(now));
        ApiResponse::success("", expired)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> ApiResponse<()> {
        self.cell.set(None);
        ApiResponse::success("Token store cleared", ())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_new_is_empty() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.get_token().await.into_data(), Some(None));
        assert_eq!(store.has_token().await.into_data(), Some(false));
        assert_eq!(store.is_token_expired().await.into_data(), Some(false));
    }

    #[tokio::test]
    async fn test_memory_save_load_remove() {
        let store = MemoryTokenStore::new();
        let token = Token::new("access").with_refresh_token("refresh");
        assert!(store.save_token(&token).await.is_success());
        assert_eq!(store.get_token().await.into_data(), Some(Some(token)));

        store.remove_token().await;
        assert_eq!(store.has_token().await.into_data(), Some(false));
    }

    #[tokio::test]
    async fn test_memory_shared_cell() {
        let cell = TokenCell::new();
        let store = MemoryTokenStore::with_cell(cell.clone());
        store.save_token(&Token::new("shared")).await;
        assert_eq!(cell.get().map(|t| t.access_token), Some("shared".to_string()));
    }

    #[tokio::test]
    async fn test_memory_expiry() {
        let past = Utc::now().timestamp() - 10;
        let store = MemoryTokenStore::with_token(Token::new("a").with_expires_at(past));
        assert_eq!(store.is_token_expired().await.into_data(), Some(true));

        store.save_token(&Token::new("b")).await;
        assert_eq!(store.is_token_expired().await.into_data(), Some(false));
    }
}
