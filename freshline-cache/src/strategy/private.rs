//! RFC 7234 rules for a cache serving a single client.

use super::{CacheStrategy, parse_expires};
use crate::directives::Directives;
use crate::entry::{CacheEntry, add_seconds};
use crate::freshness::RequestCacheControl;
use crate::key::{CacheKey, RFC_NAMESPACE};
use crate::policy::CachePolicy;
use crate::storage::{CacheStorage, VolatileStorage};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::header::{CACHE_CONTROL, VARY};
use http::{Request, Response};
use std::sync::Arc;
use tracing::debug;

/// Private cache strategy.
///
/// ```
/// use freshline_cache::prelude::*;
///
/// let strategy = PrivateCacheStrategy::new(VolatileStorage::new());
/// assert!(!strategy.policy().is_shared());
/// ```
#[derive(Clone)]
pub struct PrivateCacheStrategy {
    storage: Arc<dyn CacheStorage>,
    policy: CachePolicy,
    keys: CacheKey,
}

impl PrivateCacheStrategy {
    pub fn new(storage: impl CacheStorage + 'static) -> Self {
        Self::with_policy(Arc::new(storage), CachePolicy::private())
    }

    pub fn with_policy(storage: Arc<dyn CacheStorage>, policy: CachePolicy) -> Self {
        let keys = CacheKey::new(RFC_NAMESPACE).with_vary_headers(policy.vary_headers());
        Self {
            storage,
            policy,
            keys,
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    pub fn key_for(&self, request: &Request<Bytes>) -> String {
        self.keys.derive(request)
    }

    /// Build the entry to store, or `None` when the response is not cacheable.
    ///
    /// A returned entry may still have a negative TTL; see [`CacheEntry::ttl`].
    pub fn build_entry_at(
        &self,
        request: &Request<Bytes>,
        response: &Response<Bytes>,
        now: DateTime<Utc>,
    ) -> Option<CacheEntry> {
        if !self.policy.is_cacheable_status(response.status()) {
            debug!(status = %response.status(), "Status not cacheable");
            return None;
        }

        let vary = Directives::from_headers(response.headers(), VARY);
        if vary.has("*") {
            debug!("Response varies on *, never matchable");
            return None;
        }

        let cache_control = Directives::from_headers(response.headers(), CACHE_CONTROL);
        if cache_control.has("no-store") {
            debug!("Response forbids storing");
            return None;
        }

        if cache_control.has("no-cache") {
            let entry = CacheEntry::new_at(request, response, now, now);
            return entry.has_validation_information().then_some(entry);
        }

        let stale_at = self
            .policy
            .age_keys()
            .iter()
            .find_map(|key| cache_control.seconds(key))
            .map(|secs| add_seconds(now, secs))
            .or_else(|| parse_expires(response.headers()))
            .unwrap_or(now);

        Some(CacheEntry::new_at(request, response, stale_at, now))
    }

    pub async fn cache_at(
        &self,
        request: &Request<Bytes>,
        response: &Response<Bytes>,
        now: DateTime<Utc>,
    ) -> bool {
        if Directives::from_headers(request.headers(), CACHE_CONTROL).has("no-store") {
            debug!(uri = %request.uri(), "Request forbids storing");
            return false;
        }

        let Some(entry) = self.build_entry_at(request, response, now) else {
            return false;
        };

        let ttl = entry.ttl_at(now);
        if ttl < 0 {
            debug!(uri = %request.uri(), "Entry has no usable lifetime, not storing");
            return false;
        }

        let key = self.key_for(request);
        let saved = self.storage.save(&key, entry).await;
        debug!(
            uri = %request.uri(),
            key = %key,
            ttl,
            shared = self.policy.is_shared(),
            saved,
            "Cached response"
        );
        saved
    }

    pub async fn fetch_at(&self, request: &Request<Bytes>, now: DateTime<Utc>) -> Option<CacheEntry> {
        let cache_control = RequestCacheControl::from_headers(request.headers());
        if cache_control.no_cache {
            debug!(uri = %request.uri(), "Request forces a miss");
            return None;
        }

        let entry = self.storage.fetch(&self.key_for(request)).await?;

        if cache_control.exceeds_max_age(&entry, now) {
            debug!(uri = %request.uri(), age = entry.age_at(now), "Entry older than request max-age");
            return None;
        }

        if !entry.vary_matches(request) {
            debug!(uri = %request.uri(), "Vary mismatch");
            return None;
        }

        Some(entry)
    }
}

impl Default for PrivateCacheStrategy {
    fn default() -> Self {
        Self::new(VolatileStorage::new())
    }
}

#[async_trait]
impl CacheStrategy for PrivateCacheStrategy {
    async fn fetch(&self, request: &Request<Bytes>) -> Option<CacheEntry> {
        self.fetch_at(request, Utc::now()).await
    }

    async fn cache(&self, request: &Request<Bytes>, response: &Response<Bytes>) -> bool {
        self.cache_at(request, response, Utc::now()).await
    }

    async fn delete(&self, request: &Request<Bytes>) -> bool {
        self.storage.delete(&self.key_for(request)).await
    }
}
