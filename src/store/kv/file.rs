//! File-backed key/value medium.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::instrument;

use crate::error::{AuthError, Result};

use super::KeyValueStore;

/// File permissions for value files (Unix only): owner read/write.
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

/// Directory permissions (Unix only): owner read/write/execute.
#[cfg(unix)]
const DIR_MODE: u32 = 0o700;

/// Stores each key as `{dir}/{key}.value`.
///
/// # Security
/// - Value files are created 0600 on Unix, the directory 0700
/// - Writes go to a temp file that is renamed into place
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() {
            return Err(AuthError::storage("Key cannot be empty"));
        }

        if key.contains('/') || key.contains('\\') || key.contains("..") || key.starts_with('.') {
            return Err(AuthError::storage(format!(
                "Invalid key '{key}': potential path traversal"
            )));
        }

        if !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(AuthError::storage(format!(
                "Invalid key '{key}': contains invalid characters"
            )));
        }

        Ok(self.dir.join(format!("{key}.value")))
    }

    async fn ensure_dir(&self) -> Result<()> {
        if tokio::fs::try_exists(&self.dir).await.unwrap_or(false) {
            return Ok(());
        }
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            AuthError::storage(format!(
                "Failed to create directory '{}': {e}",
                self.dir.display()
            ))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(DIR_MODE);
            tokio::fs::set_permissions(&self.dir, perms).await.map_err(|e| {
                AuthError::storage(format!(
                    "Failed to set directory permissions on '{}': {e}",
                    self.dir.display()
                ))
            })?;
        }
        Ok(())
    }

    async fn write_atomic(&self, path: &Path, content: &str) -> Result<()> {
        let temp_path = path.with_extension("tmp");

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(FILE_MODE);

        let written = async {
            let mut file = options.open(&temp_path).await?;
            file.write_all(content.as_bytes()).await?;
            file.sync_all().await
        }
        .await;
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(AuthError::storage(format!(
                "Failed to write temp file '{}': {e}",
                temp_path.display()
            )));
        }

        if let Err(e) = tokio::fs::rename(&temp_path, path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(AuthError::storage(format!(
                "Failed to rename '{}' to '{}': {e}",
                temp_path.display(),
                path.display()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.key_path(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AuthError::storage(format!(
                "Failed to read '{}': {e}",
                path.display()
            ))),
        }
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.key_path(key)?;
        self.ensure_dir().await?;
        self.write_atomic(&path, value).await
    }

    #[instrument(skip(self))]
    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.key_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AuthError::storage(format!(
                "Failed to remove '{}': {e}",
                path.display()
            ))),
        }
    }

    fn name(&self) -> &str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_set_get_remove() {
        let dir = tempfile::tempdir().unwrap();
        let kv = FileKeyValueStore::new(dir.path().join("auth"));

        assert!(kv.get("auth_access_token").await.unwrap().is_none());
        kv.set("auth_access_token", "acc").await.unwrap();
        assert_eq!(
            kv.get("auth_access_token").await.unwrap().as_deref(),
            Some("acc")
        );

        kv.remove("auth_access_token").await.unwrap();
        kv.remove("auth_access_token").await.unwrap();
        assert!(kv.get("auth_access_token").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_overwrite_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let kv = FileKeyValueStore::new(dir.path());
        kv.set("k", "one").await.unwrap();
        kv.set("k", "two").await.unwrap();

        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some("two"));
        assert!(!dir.path().join("k.tmp").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("secure");
        let kv = FileKeyValueStore::new(&sub);
        kv.set("secret", "value").await.unwrap();

        let file_mode = std::fs::metadata(sub.join("secret.value"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(file_mode & 0o777, FILE_MODE);

        let dir_mode = std::fs::metadata(&sub).unwrap().permissions().mode();
        assert_eq!(dir_mode & 0o777, DIR_MODE);
    }

    #[tokio::test]
    async fn test_file_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let kv = FileKeyValueStore::new(dir.path());
        for key in ["../escape", "a/b", "..", ".hidden", "sp ace", ""] {
            assert!(kv.set(key, "x").await.is_err(), "key {key:?} should be rejected");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_file_concurrent_keys_from_spawned_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let kv = std::sync::Arc::new(FileKeyValueStore::new(dir.path().join("shared")));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let kv = kv.clone();
                tokio::spawn(async move {
                    let key = format!("key_{i}");
                    kv.set(&key, &format!("value-{i}")).await?;
                    kv.get(&key).await
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            let value = handle.await.unwrap().unwrap();
            assert_eq!(value, Some(format!("value-{i}")));
        }
    }
}
