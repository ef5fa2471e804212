//! Byte-level store trait.

use crate::error::CacheResult;
use async_trait::async_trait;
use std::time::Duration;

/// Key/value backend holding serialized cache entries.
///
/// Implementations only move strings around; [`KeyValueStorage`](crate::storage::KeyValueStorage)
/// handles serialization and turns errors into misses.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get a JSON value from the store.
    ///
    /// # Returns
    ///
    /// Returns `Ok(Some(value))` if the key exists and has not expired,
    /// `Ok(None)` otherwise.
    async fn get_json(&self, key: &str) -> CacheResult<Option<String>>;

    /// Set a JSON value.
    ///
    /// # Arguments
    ///
    /// * `key` - The cache key
    /// * `value` - The JSON string value
    /// * `ttl` - Optional time-to-live; `None` keeps the value until deleted
    async fn set_json(&self, key: &str, value: String, ttl: Option<Duration>) -> CacheResult<()>;

    /// Delete a key. Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Check if a key exists.
    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Remove every key.
    async fn clear(&self) -> CacheResult<()>;
}
