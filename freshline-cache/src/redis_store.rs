//! Redis string store.

use crate::config::{CacheConfig, StoreBackend};
use crate::error::{CacheError, CacheResult};
use crate::traits::CacheStore;
use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use std::time::Duration;
use tracing::info;

/// [`CacheStore`] backed by Redis.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    config: CacheConfig,
}

impl RedisStore {
    /// Connect to the server named by `config`.
    ///
    /// ```no_run
    /// use freshline_cache::*;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), CacheError> {
    ///     let config = CacheConfig::redis("redis://localhost:6379")?.with_key_prefix("http");
    ///     let store = RedisStore::new(config).await?;
    ///     let storage = KeyValueStorage::new(store);
    ///     # let _ = storage;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: CacheConfig) -> CacheResult<Self> {
        let StoreBackend::Redis(url) = &config.backend else {
            return Err(CacheError::Config(format!(
                "redis store needs a redis backend, got {:?}",
                config.backend
            )));
        };

        let client = Client::open(url.as_str()).map_err(|e| CacheError::InvalidUrl(e.to_string()))?;
        let connection = tokio::time::timeout(config.connection_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| CacheError::Connection("timed out connecting to redis".to_string()))?
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        info!(url = %url, "Initialized redis cache store");
        Ok(Self { connection, config })
    }

    /// Get the underlying connection manager.
    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get_json(&self, key: &str) -> CacheResult<Option<String>> {
        let key = self.config.build_key(key);
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(&key).await?;
        Ok(value)
    }

    async fn set_json(&self, key: &str, value: String, ttl: Option<Duration>) -> CacheResult<()> {
        let key = self.config.build_key(key);
        let mut conn = self.connection.clone();

        match ttl.or(self.config.default_ttl) {
            Some(ttl) => {
                let _: () = conn.set_ex(&key, value, ttl.as_secs().max(1)).await?;
            }
            None => {
                let _: () = conn.set(&key, value).await?;
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let key = self.config.build_key(key);
        let mut conn = self.connection.clone();
        let _: () = conn.del(&key).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let key = self.config.build_key(key);
        let mut conn = self.connection.clone();
        let exists: bool = conn.exists(&key).await?;
        Ok(exists)
    }

    async fn clear(&self) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        let _: () = redis::cmd("FLUSHDB").query_async(&mut conn).await?;
        Ok(())
    }
}
