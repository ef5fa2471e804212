//! Store backend configuration.

use crate::error::{CacheError, CacheResult};
use std::path::PathBuf;
use std::time::Duration;

/// Store backend type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process-local map
    Memory,
    /// One JSON file per key under a directory
    File(PathBuf),
    /// Redis server
    Redis(String),
}

/// Configuration shared by the [`CacheStore`](crate::traits::CacheStore) backends.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Backend type
    pub backend: StoreBackend,

    /// Key prefix for all cache keys
    pub key_prefix: Option<String>,

    /// TTL applied when a write does not carry one
    pub default_ttl: Option<Duration>,

    /// Connection timeout (network backends)
    pub connection_timeout: Duration,
}

impl CacheConfig {
    /// Configuration for the in-process store.
    pub fn memory() -> Self {
        Self::with_backend(StoreBackend::Memory)
    }

    /// Configuration for the file store rooted at `path`.
    ///
    /// # Examples
    ///
    /// ```
    /// use freshline_cache::CacheConfig;
    ///
    /// let config = CacheConfig::file("/var/cache/freshline").unwrap();
    /// assert_eq!(config.build_key("abc"), "abc");
    /// ```
    pub fn file(path: impl Into<PathBuf>) -> CacheResult<Self> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(CacheError::Config(
                "file store requires a directory path".to_string(),
            ));
        }
        Ok(Self::with_backend(StoreBackend::File(path)))
    }

    /// Configuration for a Redis store.
    ///
    /// # Arguments
    ///
    /// * `url` - Redis connection URL (e.g., "redis://localhost:6379")
    ///
    /// # Examples
    ///
    /// ```
    /// use freshline_cache::CacheConfig;
    ///
    /// let config = CacheConfig::redis("redis://localhost:6379").unwrap();
    /// assert!(CacheConfig::redis("http://localhost").is_err());
    /// ```
    pub fn redis(url: impl Into<String>) -> CacheResult<Self> {
        let url = url.into();
        if !(url.starts_with("redis://")
            || url.starts_with("rediss://")
            || url.starts_with("redis+unix://"))
        {
            return Err(CacheError::InvalidUrl(url));
        }
        Ok(Self::with_backend(StoreBackend::Redis(url)))
    }

    fn with_backend(backend: StoreBackend) -> Self {
        Self {
            backend,
            key_prefix: None,
            default_ttl: None,
            connection_timeout: Duration::from_secs(5),
        }
    }

    /// Set the key prefix.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Set the default TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Set the connection timeout.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Build the full key with prefix.
    pub fn build_key(&self, key: &str) -> String {
        match &self.key_prefix {
            Some(prefix) => format!("{}:{}", prefix, key),
            None => key.to_string(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::memory()
    }
}
