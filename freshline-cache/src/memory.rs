//! In-process string store.

use crate::config::CacheConfig;
use crate::error::CacheResult;
use crate::traits::CacheStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// [`CacheStore`] backed by a `HashMap`.
#[derive(Clone)]
pub struct InMemoryStore {
    data: Arc<RwLock<HashMap<String, StoredValue>>>,
    config: CacheConfig,
}

#[derive(Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<tokio::time::Instant>,
}

impl StoredValue {
    fn is_expired(&self, now: tokio::time::Instant) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_config(CacheConfig::memory())
    }

    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Number of stored keys. Expired keys count until a read or write evicts them.
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }

    /// Drop expired values.
    pub async fn purge_expired(&self) {
        let now = tokio::time::Instant::now();
        self.data.write().await.retain(|_, v| !v.is_expired(now));
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for InMemoryStore {
    async fn get_json(&self, key: &str) -> CacheResult<Option<String>> {
        let key = self.config.build_key(key);
        {
            let data = self.data.read().await;
            match data.get(&key) {
                None => return Ok(None),
                Some(stored) if !stored.is_expired(tokio::time::Instant::now()) => {
                    return Ok(Some(stored.value.clone()));
                }
                Some(_) => {}
            }
        }

        let mut data = self.data.write().await;
        if data
            .get(&key)
            .is_some_and(|stored| stored.is_expired(tokio::time::Instant::now()))
        {
            data.remove(&key);
        }
        Ok(None)
    }

    async fn set_json(&self, key: &str, value: String, ttl: Option<Duration>) -> CacheResult<()> {
        let key = self.config.build_key(key);
        let now = tokio::time::Instant::now();
        let expires_at = ttl.or(self.config.default_ttl).map(|d| now + d);
        let mut data = self.data.write().await;
        data.retain(|_, v| !v.is_expired(now));
        data.insert(key, StoredValue { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let key = self.config.build_key(key);
        self.data.write().await.remove(&key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.get_json(key).await.map(|v| v.is_some())
    }

    async fn clear(&self) -> CacheResult<()> {
        self.data.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = InMemoryStore::new();
        store.set_json("k", "\"v\"".to_string(), None).await.unwrap();
        assert_eq!(store.get_json("k").await.unwrap(), Some("\"v\"".to_string()));
        assert!(store.exists("k").await.unwrap());

        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.get_json("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry() {
        let store = InMemoryStore::new();
        store
            .set_json("k", "1".to_string(), Some(Duration::from_secs(2)))
            .await
            .unwrap();
        assert!(store.exists("k").await.unwrap());

        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(!store.exists("k").await.unwrap());
        assert!(store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_values_do_not_accumulate() {
        let store = InMemoryStore::new();
        for i in 0..50 {
            store
                .set_json(&format!("k{i}"), "1".to_string(), Some(Duration::from_secs(1)))
                .await
                .unwrap();
        }
        store.set_json("forever", "1".to_string(), None).await.unwrap();
        assert_eq!(store.len().await, 51);

        tokio::time::advance(Duration::from_secs(2)).await;
        store.set_json("next", "2".to_string(), None).await.unwrap();
        assert_eq!(store.len().await, 2);

        store
            .set_json("brief", "3".to_string(), Some(Duration::from_secs(1)))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        store.purge_expired().await;
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_key_prefix_and_clear() {
        let store = InMemoryStore::with_config(CacheConfig::memory().with_key_prefix("http"));
        store.set_json("a", "1".to_string(), None).await.unwrap();
        assert_eq!(store.len().await, 1);
        assert!(store.data.read().await.contains_key("http:a"));

        store.clear().await.unwrap();
        assert!(store.is_empty().await);
    }
}
