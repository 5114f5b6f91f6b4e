//! Token store factory.

use std::sync::Arc;

use tracing::info;

use crate::bridge::NativeBridge;
use crate::config::TokenStoreSection;
use crate::error::{AuthError, Result};

use super::durable::{DurableTokenStore, StorageLayout};
use super::kv::{FileKeyValueStore, KeyValueStore};
use super::memory::{MemoryTokenStore, TokenCell};
use super::native::NativeBridgeTokenStore;
use super::{TokenStore, TokenStoreType};

/// Everything a store might need. Unused fields are ignored.
#[derive(Clone, Default)]
pub struct TokenStoreOptions {
    /// Medium for the `web` and `mobile` stores.
    pub kv: Option<Arc<dyn KeyValueStore>>,
    /// Host bridge for the `react-native` store.
    pub bridge: Option<Arc<dyn NativeBridge>>,
    pub key_prefix: Option<String>,
    /// Shared cell for the `memory` store.
    pub cell: Option<TokenCell>,
}

impl std::fmt::Debug for TokenStoreOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStoreOptions")
            .field("kv", &self.kv.as_ref().map(|kv| kv.name().to_string()))
            .field("bridge", &self.bridge.is_some())
            .field("key_prefix", &self.key_prefix)
            .field("cell", &self.cell.is_some())
            .finish()
    }
}

impl TokenStoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options from the `[token_store]` config table. A `dir` selects the
    /// file medium.
    pub fn from_section(section: &TokenStoreSection) -> Self {
        Self {
            kv: section
                .dir
                .as_ref()
                .map(|dir| Arc::new(FileKeyValueStore::new(dir)) as Arc<dyn KeyValueStore>),
            key_prefix: section.key_prefix.clone(),
            ..Self::default()
        }
    }

    pub fn with_kv(mut self, kv: Arc<dyn KeyValueStore>) -> Self {
        self.kv = Some(kv);
        self
    }

    pub fn with_bridge(mut self, bridge: Arc<dyn NativeBridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    pub fn with_cell(mut self, cell: TokenCell) -> Self {
        self.cell = Some(cell);
        self
    }

    fn durable(&self, store_type: TokenStoreType, layout: StorageLayout) -> Result<Arc<dyn TokenStore>> {
        let kv = self.kv.clone().ok_or_else(|| {
            AuthError::config(format!("Token store '{store_type}' needs a key/value medium"))
        })?;
        let mut store = DurableTokenStore::new(kv, layout);
        if let Some(prefix) = &self.key_prefix {
            store = store.with_prefix(prefix.clone());
        }
        Ok(Arc::new(store))
    }
}

/// Build the token store for `store_type`.
pub fn create_token_store(
    store_type: TokenStoreType,
    options: &TokenStoreOptions,
) -> Result<Arc<dyn TokenStore>> {
    let store: Arc<dyn TokenStore> = match store_type {
        TokenStoreType::Memory | TokenStoreType::Fake => match &options.cell {
            Some(cell) => Arc::new(MemoryTokenStore::with_cell(cell.clone())),
            None => Arc::new(MemoryTokenStore::new()),
        },
        TokenStoreType::Web => options.durable(store_type, StorageLayout::Web)?,
        TokenStoreType::Mobile => options.durable(store_type, StorageLayout::Mobile)?,
        TokenStoreType::ReactNative => {
            let bridge = options.bridge.clone().ok_or_else(|| {
                AuthError::config("Token store 'react-native' needs a native bridge")
            })?;
            Arc::new(NativeBridgeTokenStore::new(bridge))
        }
    };
    info!(store_type = %store_type, store = store.name(), "Created token store");
    Ok(store)
}

/// Like [`create_token_store`], parsing the type name first.
pub fn create_token_store_from_str(
    store_type: &str,
    options: &TokenStoreOptions,
) -> Result<Arc<dyn TokenStore>> {
    create_token_store(store_type.parse()?, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::FakeNativeBridge;
    use crate::store::kv::MemoryKeyValueStore;
    use crate::types::Token;

    #[test]
    fn test_memory_and_fake_need_nothing() {
        let opts = TokenStoreOptions::new();
        assert_eq!(create_token_store(TokenStoreType::Memory, &opts).unwrap().name(), "memory");
        assert_eq!(create_token_store_from_str("fake", &opts).unwrap().name(), "memory");
    }

    #[test]
    fn test_missing_medium_is_config_error() {
        let opts = TokenStoreOptions::new();
        for kind in [TokenStoreType::Web, TokenStoreType::Mobile, TokenStoreType::ReactNative] {
            let err = create_token_store(kind, &opts).err().unwrap();
            assert!(matches!(err, AuthError::Config(_)), "{kind}: {err}");
        }
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let err = create_token_store_from_str("indexeddb", &TokenStoreOptions::new())
            .err()
            .unwrap();
        assert!(err.to_string().contains("indexeddb"));
    }

    #[tokio::test]
    async fn test_prefix_and_medium_are_used() {
        let kv = MemoryKeyValueStore::new();
        let opts = TokenStoreOptions::new()
            .with_kv(Arc::new(kv.clone()))
            .with_key_prefix("my_");
        let store = create_token_store(TokenStoreType::Mobile, &opts).unwrap();
        store.save_token(&Token::new("acc").with_refresh_token("ref")).await;
        assert_eq!(kv.keys(), vec!["my_access_token", "my_refresh_token"]);
    }

    #[tokio::test]
    async fn test_shared_cell_and_bridge() {
        let cell = TokenCell::new();
        let store = create_token_store(
            TokenStoreType::Memory,
            &TokenStoreOptions::new().with_cell(cell.clone()),
        )
        .unwrap();
        store.save_token(&Token::new("acc")).await;
        assert_eq!(cell.get().unwrap().access_token, "acc");

        let native = create_token_store(
            TokenStoreType::ReactNative,
            &TokenStoreOptions::new().with_bridge(Arc::new(FakeNativeBridge::new())),
        )
        .unwrap();
        assert_eq!(native.name(), "react-native");
    }

    #[tokio::test]
    async fn test_from_section_uses_file_medium() {
        let dir = tempfile::tempdir().unwrap();
        let section = TokenStoreSection {
            store_type: TokenStoreType::Web,
            dir: Some(dir.path().to_path_buf()),
            key_prefix: None,
        };
        let store =
            create_token_store(section.store_type, &TokenStoreOptions::from_section(&section)).unwrap();
        store.save_token(&Token::new("acc")).await;
        assert!(dir.path().join("auth_access_token.value").exists());
    }
}
