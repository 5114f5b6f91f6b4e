//! Token stores.
//!
//! A [`TokenStore`] persists the current session's [`Token`]. Every operation
//! answers with an [`ApiResponse`] and never fails with `Err`.

pub mod durable;
pub mod factory;
pub mod kv;
pub mod memory;
pub mod native;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::envelope::ApiResponse;
use crate::error::AuthError;
use crate::types::Token;

pub use durable::{DurableTokenStore, StorageLayout};
pub use factory::{TokenStoreOptions, create_token_store, create_token_store_from_str};
pub use kv::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
#[cfg(feature = "system-keyring")]
pub use kv::KeyringKeyValueStore;
pub use memory::{MemoryTokenStore, TokenCell};
pub use native::NativeBridgeTokenStore;

/// Persistence for the current session's token.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Replace the stored token.
    async fn save_token(&self, token: &Token) -> ApiResponse<()>;

    async fn get_token(&self) -> ApiResponse<Option<Token>>;

    /// Remove the token, keeping other auth-related state.
    async fn remove_token(&self) -> ApiResponse<()>;

    async fn has_token(&self) -> ApiResponse<bool>;

    /// `false` when no expiry is set; `true` iff now is past the expiry.
    async fn is_token_expired(&self) -> ApiResponse<bool>;

    /// Wipe every piece of auth-related state.
    async fn clear(&self) -> ApiResponse<()>;

    /// Short identifier for logs.
    fn name(&self) -> &str;
}

#[async_trait]
impl<T: TokenStore + ?Sized> TokenStore for Arc<T> {
    async fn save_token(&self, token: &Token) -> ApiResponse<()> {
        (**self).save_token(token).await
    }

    async fn get_token(&self) -> ApiResponse<Option<Token>> {
        (**self).get_token().await
    }

    async fn remove_token(&self) -> ApiResponse<()> {
        (**self).remove_token().await
    }

    async fn has_token(&self) -> ApiResponse<bool> {
        (**self).has_token().await
    }

    async fn is_token_expired(&self) -> ApiResponse<bool> {
        (**self).is_token_expired().await
    }

    async fn clear(&self) -> ApiResponse<()> {
        (**self).clear().await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Which token store to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenStoreType {
    #[default]
    Memory,
    /// Alias of `Memory` kept for test setups.
    Fake,
    Web,
    Mobile,
    ReactNative,
}

impl TokenStoreType {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenStoreType::Memory => "memory",
            TokenStoreType::Fake => "fake",
            TokenStoreType::Web => "web",
            TokenStoreType::Mobile => "mobile",
            TokenStoreType::ReactNative => "react-native",
        }
    }
}

impl fmt::Display for TokenStoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenStoreType {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(TokenStoreType::Memory),
            "fake" => Ok(TokenStoreType::Fake),
            "web" => Ok(TokenStoreType::Web),
            "mobile" => Ok(TokenStoreType::Mobile),
            "react-native" | "react_native" | "reactnative" => Ok(TokenStoreType::ReactNative),
            other => Err(AuthError::config(format!("Unsupported token store type: {other}"))),
        }
    }
}
