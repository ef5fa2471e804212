//! Filesystem string store.
//!
//! Each key lives in its own JSON envelope file named after the SHA-256 of
//! the (prefixed) key, so arbitrary keys map to safe file names.

use crate::config::{CacheConfig, StoreBackend};
use crate::error::{CacheError, CacheResult};
use crate::traits::CacheStore;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info};

/// Suffix source for temporary files, unique per write within the process.
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    expires_at: Option<DateTime<Utc>>,
    value: String,
}

/// [`CacheStore`] keeping one file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    config: CacheConfig,
}

impl FileStore {
    /// Open the store described by `config`, creating its directory.
    ///
    /// Fails with [`CacheError::Config`] unless `config` describes a file backend.
    pub async fn new(config: CacheConfig) -> CacheResult<Self> {
        let StoreBackend::File(root) = config.backend.clone() else {
            return Err(CacheError::Config(format!(
                "file store needs a file backend, got {:?}",
                config.backend
            )));
        };

        fs::create_dir_all(&root).await?;
        info!(path = ?root, "Initialized file cache store");

        Ok(Self { root, config })
    }

    /// Convenience constructor from a directory path.
    pub async fn with_path(path: impl Into<PathBuf>) -> CacheResult<Self> {
        Self::new(CacheConfig::file(path)?).await
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn file_stem(&self, key: &str) -> String {
        hex::encode(Sha256::digest(self.config.build_key(key).as_bytes()))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", self.file_stem(key)))
    }

    fn tmp_path_for(&self, key: &str) -> PathBuf {
        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        self.root.join(format!(
            "{}.{}.{}.tmp",
            self.file_stem(key),
            std::process::id(),
            seq
        ))
    }
}

#[async_trait]
impl CacheStore for FileStore {
    async fn get_json(&self, key: &str) -> CacheResult<Option<String>> {
        let path = self.path_for(key);
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let envelope: Envelope = serde_json::from_slice(&raw)?;
        if envelope.expires_at.is_some_and(|exp| Utc::now() >= exp) {
            debug!(path = ?path, "Removing expired cache file");
            self.delete(key).await?;
            return Ok(None);
        }
        Ok(Some(envelope.value))
    }

    async fn set_json(&self, key: &str, value: String, ttl: Option<Duration>) -> CacheResult<()> {
        let expires_at = ttl
            .or(self.config.default_ttl)
            .and_then(|ttl| TimeDelta::from_std(ttl).ok())
            .and_then(|ttl| Utc::now().checked_add_signed(ttl));
        let envelope = Envelope { expires_at, value };
        let bytes = serde_json::to_vec(&envelope)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;

        // Each write stages its own file, then renames it into place, so readers
        // see a whole envelope and concurrent writers of one key do not collide.
        let tmp = self.tmp_path_for(key);
        let written = match fs::write(&tmp, bytes).await {
            Ok(()) => fs::rename(&tmp, self.path_for(key)).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.get_json(key).await.map(|v| v.is_some())
    }

    async fn clear(&self) -> CacheResult<()> {
        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if !path
                .extension()
                .is_some_and(|ext| ext == "json" || ext == "tmp")
            {
                continue;
            }
            match fs::remove_file(&path).await {
                Ok(()) => {}
                // Renamed or removed by a concurrent writer.
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::with_path(dir.path()).await.unwrap();

        store.set_json("entry", "{\"a\":1}".to_string(), None).await.unwrap();
        assert_eq!(
            store.get_json("entry").await.unwrap(),
            Some("{\"a\":1}".to_string())
        );
        assert!(store.exists("entry").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_absent_key_succeeds() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::with_path(dir.path()).await.unwrap();
        store.delete("missing").await.unwrap();
        assert_eq!(store.get_json("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_value_is_removed() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::with_path(dir.path()).await.unwrap();

        store
            .set_json("short", "1".to_string(), Some(Duration::from_millis(20)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(store.get_json("short").await.unwrap(), None);
        assert!(!store.path_for("short").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::with_path(dir.path()).await.unwrap();
        std::fs::write(store.path_for("bad"), b"not json").unwrap();

        let err = store.get_json("bad").await.unwrap_err();
        assert!(matches!(err, CacheError::Deserialization(_)));
    }

    #[tokio::test]
    async fn test_clear_and_prefix() {
        let dir = TempDir::new().unwrap();
        let config = CacheConfig::file(dir.path()).unwrap().with_key_prefix("v1");
        let store = FileStore::new(config).await.unwrap();

        store.set_json("a", "1".to_string(), None).await.unwrap();
        store.set_json("b", "2".to_string(), None).await.unwrap();
        store.clear().await.unwrap();

        assert!(!store.exists("a").await.unwrap());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_clear_removes_leftover_temp_files() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::with_path(dir.path()).await.unwrap();
        std::fs::write(store.tmp_path_for("crashed"), b"{\"expires").unwrap();
        store.set_json("a", "1".to_string(), None).await.unwrap();

        store.clear().await.unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_writers_of_one_key() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::with_path(dir.path()).await.unwrap();

        let mut tasks = Vec::new();
        for i in 0..64 {
            let writer = store.clone();
            tasks.push(tokio::spawn(async move {
                writer
                    .set_json("same", format!("\"value-{i}\""), None)
                    .await
                    .map(|()| None::<String>)
            }));
            let reader = store.clone();
            tasks.push(tokio::spawn(async move { reader.get_json("same").await }));
        }

        for task in tasks {
            match task.await.unwrap() {
                Ok(None) => {}
                Ok(Some(value)) => assert!(value.starts_with("\"value-"), "torn read: {value}"),
                Err(e) => panic!("concurrent access failed: {e}"),
            }
        }

        let last = store.get_json("same").await.unwrap().unwrap();
        assert!(last.starts_with("\"value-"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_rejects_non_file_backend() {
        let err = FileStore::new(CacheConfig::memory()).await.unwrap_err();
        assert!(matches!(err, CacheError::Config(_)));
    }
}
