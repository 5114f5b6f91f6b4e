//! Token store over a persistent key/value medium.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{instrument, warn};

use crate::envelope::ApiResponse;
use crate::error::{AuthError, Result};
use crate::types::{Token, UserInfo};

use super::TokenStore;
use super::kv::KeyValueStore;

const ACCESS_TOKEN: &str = "access_token";
const REFRESH_TOKEN: &str = "refresh_token";
const EXPIRES_AT: &str = "expires_at";
const USER_INFO: &str = "user_info";
const DEVICE_ID: &str = "device_id";

/// How the token is laid out in the medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageLayout {
    /// Browser storage. The refresh token lives in an HTTP-only cookie and
    /// is never written to the medium.
    Web,
    /// Mobile secure storage. The refresh token is persisted alongside the
    /// access token.
    Mobile,
}

impl StorageLayout {
    fn default_prefix(self) -> &'static str {
        match self {
            StorageLayout::Web => "auth_",
            StorageLayout::Mobile => "auth_mobile_",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DurableTokenStore<K> {
    kv: K,
    layout: StorageLayout,
    prefix: String,
}

impl<K: KeyValueStore> DurableTokenStore<K> {
    pub fn new(kv: K, layout: StorageLayout) -> Self {
        Self {
            kv,
            layout,
            prefix: layout.default_prefix().to_string(),
        }
    }

    pub fn web(kv: K) -> Self {
        Self::new(kv, StorageLayout::Web)
    }

    pub fn mobile(kv: K) -> Self {
        Self::new(kv, StorageLayout::Mobile)
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn layout(&self) -> StorageLayout {
        self.layout
    }

    fn key(&self, name: &str) -> String {
        format!("{}{name}", self.prefix)
    }

    /// The access token is written last. If any write fails the access token
    /// is removed, so a failed save never leaves a mix of old and new keys.
    async fn write_token(&self, token: &Token) -> Result<()> {
        let written = self.write_token_keys(token).await;
        if let Err(e) = &written {
            warn!(error = %e, "Token save failed, dropping the stored access token");
            if let Err(cleanup) = self.kv.remove(&self.key(ACCESS_TOKEN)).await {
                warn!(error = %cleanup, "Could not drop the stored access token");
            }
        }
        written
    }

    async fn write_token_keys(&self, token: &Token) -> Result<()> {
        match (self.layout, token.refresh_token()) {
            (StorageLayout::Mobile, Some(refresh)) => {
                self.kv.set(&self.key(REFRESH_TOKEN), refresh).await?
            }
            _ => self.kv.remove(&self.key(REFRESH_TOKEN)).await?,
        }

        match token.expires_at {
            Some(exp) => self.kv.set(&self.key(EXPIRES_AT), &exp.to_string()).await?,
            None => self.kv.remove(&self.key(EXPIRES_AT)).await?,
        }

        self.kv.set(&self.key(ACCESS_TOKEN), &token.access_token).await
    }

    async fn read_token(&self) -> Result<Option<Token>> {
        let Some(access_token) = self.kv.get(&self.key(ACCESS_TOKEN)).await? else {
            return Ok(None);
        };

        let refresh_token = match self.layout {
            StorageLayout::Mobile => self.kv.get(&self.key(REFRESH_TOKEN)).await?,
            StorageLayout::Web => None,
        };

        let expires_at = match self.kv.get(&self.key(EXPIRES_AT)).await? {
            Some(raw) => Some(raw.trim().parse::<i64>().map_err(|e| {
                AuthError::storage(format!("Stored expiry '{raw}' is not a timestamp: {e}"))
            })?),
            None => None,
        };

        Ok(Some(Token {
            access_token,
            // Web tokens keep the cookie-managed placeholder.
            refresh_token: Some(refresh_token.unwrap_or_default()),
            expires_at,
        }))
    }

    async fn read_user_info(&self) -> Result<Option<UserInfo>> {
        match self.kv.get(&self.key(USER_INFO)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn remove_keys(&self, names: &[&str]) -> Result<()> {
        for name in names {
            self.kv.remove(&self.key(name)).await?;
        }
        Ok(())
    }

    /// Persist the signed-in user's profile next to the token.
    pub async fn save_user_info(&self, user: &UserInfo) -> ApiResponse<()> {
        let outcome = async {
            let json = serde_json::to_string(user)?;
            self.kv.set(&self.key(USER_INFO), &json).await
        }
        .await;
        ApiResponse::from_result(outcome, "User information saved")
    }

    pub async fn get_user_info(&self) -> ApiResponse<Option<UserInfo>> {
        ApiResponse::from_result(self.read_user_info().await, "User information loaded")
    }

    pub async fn set_device_id(&self, device_id: &str) -> ApiResponse<()> {
        ApiResponse::from_result(
            self.kv.set(&self.key(DEVICE_ID), device_id).await,
            "Device id saved",
        )
    }

    pub async fn device_id(&self) -> ApiResponse<Option<String>> {
        ApiResponse::from_result(self.kv.get(&self.key(DEVICE_ID)).await, "Device id loaded")
    }
}

#[async_trait]
impl<K: KeyValueStore> TokenStore for DurableTokenStore<K> {
    #[instrument(skip(self, token), fields(medium = self.kv.name()))]
    async fn save_token(&self, token: &Token) -> ApiResponse<()> {
        ApiResponse::from_result(self.write_token(token).await, "Token saved")
    }

    async fn get_token(&self) -> ApiResponse<Option<Token>> {
        ApiResponse::from_result(self.read_token().await, "Token loaded")
    }

    #[instrument(skip(self), fields(medium = self.kv.name()))]
    async fn remove_token(&self) -> ApiResponse<()> {
        ApiResponse::from_result(
            self.remove_keys(&[ACCESS_TOKEN, REFRESH_TOKEN, EXPIRES_AT]).await,
            "Token removed",
        )
    }

    async fn has_token(&self) -> ApiResponse<bool> {
        ApiResponse::from_result(
            self.kv.get(&self.key(ACCESS_TOKEN)).await.map(|v| v.is_some()),
            "",
        )
    }

    async fn is_token_expired(&self) -> ApiResponse<bool> {
        let now = Utc::now().timestamp();
        match self.read_token().await {
            Ok(token) => ApiResponse::success("", token.is_some_and(|t| t.is_expired_at(now))),
            Err(e) => {
                warn!(error = %e, "Could not read stored token expiry");
                e.into()
            }
        }
    }

    #[instrument(skip(self), fields(medium = self.kv.name()))]
    async fn clear(&self) -> ApiResponse<()> {
        ApiResponse::from_result(
            self.remove_keys(&[ACCESS_TOKEN, REFRESH_TOKEN, EXPIRES_AT, USER_INFO, DEVICE_ID])
                .await,
            "Token store cleared",
        )
    }

    fn name(&self) -> &str {
        match self.layout {
            StorageLayout::Web => "web",
            StorageLayout::Mobile => "mobile",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::kv::MemoryKeyValueStore;
    use crate::types::ProviderKind;

    #[tokio::test]
    async fn test_web_layout_never_persists_refresh_token() {
        let kv = MemoryKeyValueStore::new();
        let store = DurableTokenStore::web(kv.clone());
        store
            .save_token(&Token::new("acc").with_refresh_token("secret").with_expires_at(99))
            .await;

        assert_eq!(kv.keys(), vec!["auth_access_token", "auth_expires_at"]);
        let token = store.get_token().await.into_data().unwrap().unwrap();
        assert_eq!(token.access_token, "acc");
        assert_eq!(token.refresh_token.as_deref(), Some(""));
        assert_eq!(token.expires_at, Some(99));
    }

    #[tokio::test]
    async fn test_mobile_layout_round_trips_refresh_token() {
        let kv = MemoryKeyValueStore::new();
        let store = DurableTokenStore::mobile(kv.clone());
        store
            .save_token(&Token::new("acc").with_refresh_token("ref"))
            .await;

        let token = store.get_token().await.into_data().unwrap().unwrap();
        assert_eq!(token.refresh_token.as_deref(), Some("ref"));
        assert_eq!(token.expires_at, None);
        assert_eq!(store.is_token_expired().await.into_data(), Some(false));
    }

    #[tokio::test]
    async fn test_remove_keeps_profile_but_clear_wipes_everything() {
        let kv = MemoryKeyValueStore::new();
        let store = DurableTokenStore::mobile(kv.clone()).with_prefix("app.");
        store.save_token(&Token::new("acc").with_refresh_token("ref")).await;
        store
            .save_user_info(&UserInfo {
                id: "u1".into(),
                email: "a@b.c".into(),
                nickname: None,
                provider: ProviderKind::Email,
            })
            .await;
        store.set_device_id("dev-1").await;

        store.remove_token().await;
        assert_eq!(store.has_token().await.into_data(), Some(false));
        assert_eq!(kv.keys(), vec!["app.device_id", "app.user_info"]);
        assert_eq!(
            store.get_user_info().await.into_data().unwrap().unwrap().id,
            "u1"
        );

        store.clear().await;
        assert!(kv.is_empty());
        assert_eq!(store.device_id().await.into_data(), Some(None));
    }

    #[tokio::test]
    async fn test_corrupt_expiry_is_storage_error() {
        let kv = MemoryKeyValueStore::new();
        kv.set("auth_access_token", "acc").await.unwrap();
        kv.set("auth_expires_at", "tomorrow").await.unwrap();
        let store = DurableTokenStore::web(kv);

        assert_eq!(store.get_token().await.error_code(), Some("STORAGE_ERROR"));
        assert_eq!(store.is_token_expired().await.error_code(), Some("STORAGE_ERROR"));
    }

    /// Medium that refuses writes to one key.
    #[derive(Debug, Clone)]
    struct FailingKey {
        inner: MemoryKeyValueStore,
        key: &'static str,
    }

    #[async_trait]
    impl KeyValueStore for FailingKey {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<()> {
            if key == self.key {
                return Err(AuthError::storage("disk full"));
            }
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<()> {
            self.inner.remove(key).await
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_failed_save_never_leaves_a_mixed_token() {
        let inner = MemoryKeyValueStore::new();
        let old = DurableTokenStore::mobile(inner.clone());
        old.save_token(&Token::new("old-acc").with_refresh_token("old-ref").with_expires_at(10))
            .await;

        let store = DurableTokenStore::mobile(FailingKey {
            inner: inner.clone(),
            key: "auth_mobile_expires_at",
        });
        let resp = store
            .save_token(&Token::new("new-acc").with_refresh_token("new-ref").with_expires_at(20))
            .await;

        assert_eq!(resp.error_code(), Some("STORAGE_ERROR"));
        assert_eq!(store.get_token().await.into_data(), Some(None));
        assert_eq!(store.has_token().await.into_data(), Some(false));
    }
}
