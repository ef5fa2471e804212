//! Entry persistence contract and its implementations.
//!
//! Storage never fails a request: every backend error is logged and read as
//! a miss (`None`) or an unsuccessful write (`false`).

use crate::entry::{CacheEntry, StoreLifetime};
use crate::traits::CacheStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Key to [`CacheEntry`] persistence.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Entry stored under `key`. Missing, expired or unreadable entries are `None`.
    async fn fetch(&self, key: &str) -> Option<CacheEntry>;

    /// Store `entry` under `key` for [`CacheEntry::lifetime`].
    async fn save(&self, key: &str, entry: CacheEntry) -> bool;

    /// Remove `key`. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> bool;
}

#[async_trait]
impl<T: CacheStorage + ?Sized> CacheStorage for Arc<T> {
    async fn fetch(&self, key: &str) -> Option<CacheEntry> {
        (**self).fetch(key).await
    }

    async fn save(&self, key: &str, entry: CacheEntry) -> bool {
        (**self).save(key, entry).await
    }

    async fn delete(&self, key: &str) -> bool {
        (**self).delete(key).await
    }
}

struct Slot {
    entry: CacheEntry,
    expires_at: Option<tokio::time::Instant>,
}

impl Slot {
    fn is_expired(&self, now: tokio::time::Instant) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }
}

/// Entries kept in process memory for the lifetime of the value.
#[derive(Clone, Default)]
pub struct VolatileStorage {
    entries: Arc<RwLock<HashMap<String, Slot>>>,
}

impl VolatileStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStorage for VolatileStorage {
    async fn fetch(&self, key: &str) -> Option<CacheEntry> {
        {
            let entries = self.entries.read().await;
            let slot = entries.get(key)?;
            if !slot.is_expired(tokio::time::Instant::now()) {
                return Some(slot.entry.clone());
            }
        }

        // Another writer may have replaced the slot between the two locks.
        let mut entries = self.entries.write().await;
        if entries
            .get(key)
            .is_some_and(|slot| slot.is_expired(tokio::time::Instant::now()))
        {
            entries.remove(key);
        }
        None
    }

    async fn save(&self, key: &str, entry: CacheEntry) -> bool {
        let now = tokio::time::Instant::now();
        let expires_at = match entry.lifetime() {
            StoreLifetime::Discard => return false,
            StoreLifetime::Indefinite => None,
            StoreLifetime::For(ttl) => Some(now + ttl),
        };
        let mut entries = self.entries.write().await;
        entries.retain(|_, slot| !slot.is_expired(now));
        entries.insert(key.to_string(), Slot { entry, expires_at });
        true
    }

    async fn delete(&self, key: &str) -> bool {
        self.entries.write().await.remove(key);
        true
    }
}

/// Serializes entries as JSON into any [`CacheStore`].
///
/// Entries without expiry are written with no TTL, so a store configured
/// with a default TTL applies it to them.
pub struct KeyValueStorage<S> {
    store: Arc<S>,
}

impl<S> Clone for KeyValueStorage<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: CacheStore> KeyValueStorage<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    pub fn from_arc(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[async_trait]
impl<S: CacheStore + 'static> CacheStorage for KeyValueStorage<S> {
    async fn fetch(&self, key: &str) -> Option<CacheEntry> {
        let raw = match self.store.get_json(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache store read failed");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding unreadable cache entry");
                None
            }
        }
    }

    async fn save(&self, key: &str, entry: CacheEntry) -> bool {
        let ttl = match entry.lifetime() {
            StoreLifetime::Discard => {
                debug!(key = %key, "Entry has no remaining lifetime, not storing");
                return false;
            }
            StoreLifetime::Indefinite => None,
            StoreLifetime::For(ttl) => Some(ttl),
        };

        let json = match serde_json::to_string(&entry) {
            Ok(json) => json,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to serialize cache entry");
                return false;
            }
        };

        match self.store.set_json(key, json, ttl).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache store write failed");
                false
            }
        }
    }

    async fn delete(&self, key: &str) -> bool {
        match self.store.delete(key).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache store delete failed");
                false
            }
        }
    }
}
