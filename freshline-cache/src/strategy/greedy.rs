//! Cache everything with an accepted status, whatever the headers say.

use super::CacheStrategy;
use crate::entry::{CacheEntry, add_seconds};
use crate::key::{CacheKey, GREEDY_NAMESPACE};
use crate::policy::CachePolicy;
use crate::storage::CacheStorage;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::header::WARNING;
use http::{HeaderValue, Request, Response};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Request header overriding the TTL for one request. Negative disables caching.
pub const GREEDY_TTL_HEADER: &str = "x-freshline-greedy-ttl";

/// Text of the `Warning` added to greedily cached responses.
pub const GREEDY_WARNING: &str = "Cached although the response headers indicate not to do it!";

/// Greedy cache strategy.
///
/// Ignores `Cache-Control`, `Pragma` and `Vary` on the response; only the
/// status allow-list applies. Entries live for a fixed TTL and the stored
/// response gains a `Warning: 299` header. Use
/// [`with_vary_headers`](Self::with_vary_headers) to keep per-user responses
/// apart (for example by `Authorization`).
#[derive(Clone)]
pub struct GreedyCacheStrategy {
    storage: Arc<dyn CacheStorage>,
    default_ttl: i64,
    policy: CachePolicy,
    keys: CacheKey,
}

impl GreedyCacheStrategy {
    pub fn new(storage: impl CacheStorage + 'static, default_ttl: Duration) -> Self {
        Self::with_storage(Arc::new(storage), default_ttl)
    }

    pub fn with_storage(storage: Arc<dyn CacheStorage>, default_ttl: Duration) -> Self {
        Self {
            storage,
            default_ttl: i64::try_from(default_ttl.as_secs()).unwrap_or(i64::MAX),
            policy: CachePolicy::private(),
            keys: CacheKey::new(GREEDY_NAMESPACE),
        }
    }

    /// Add request headers to the cache key.
    pub fn with_vary_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.keys = self.keys.with_vary_headers(headers);
        self
    }

    /// Replace the status allow-list.
    pub fn with_statuses<I: IntoIterator<Item = u16>>(mut self, statuses: I) -> Self {
        self.policy = self.policy.with_statuses(statuses);
        self
    }

    pub fn key_for(&self, request: &Request<Bytes>) -> String {
        self.keys.derive(request)
    }

    /// TTL for `request`: the override header when it parses, else the default.
    pub fn ttl_for(&self, request: &Request<Bytes>) -> i64 {
        request
            .headers()
            .get(GREEDY_TTL_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(self.default_ttl)
    }

    pub async fn cache_at(
        &self,
        request: &Request<Bytes>,
        response: &Response<Bytes>,
        now: DateTime<Utc>,
    ) -> bool {
        let ttl = self.ttl_for(request);
        if ttl < 0 {
            debug!(uri = %request.uri(), ttl, "Greedy caching disabled for request");
            return false;
        }

        if !self.policy.is_cacheable_status(response.status()) {
            debug!(status = %response.status(), "Status not cacheable");
            return false;
        }

        let mut stored = response.clone();
        match warning_value(now) {
            Ok(value) => {
                stored.headers_mut().append(WARNING, value);
            }
            Err(e) => warn!(error = %e, "Could not build Warning header"),
        }

        let entry = CacheEntry::new_at(request, &stored, add_seconds(now, ttl as u64), now);
        if entry.ttl_at(now) < 0 {
            return false;
        }

        let key = self.key_for(request);
        let saved = self.storage.save(&key, entry).await;
        debug!(uri = %request.uri(), key = %key, ttl, saved, "Greedily cached response");
        saved
    }
}

fn warning_value(now: DateTime<Utc>) -> Result<HeaderValue, http::header::InvalidHeaderValue> {
    HeaderValue::from_str(&format!(
        "299 - \"{}\" \"{}\"",
        GREEDY_WARNING,
        now.format("%a, %d %b %Y %H:%M:%S GMT")
    ))
}

#[async_trait]
impl CacheStrategy for GreedyCacheStrategy {
    async fn fetch(&self, request: &Request<Bytes>) -> Option<CacheEntry> {
        self.storage.fetch(&self.key_for(request)).await
    }

    async fn cache(&self, request: &Request<Bytes>, response: &Response<Bytes>) -> bool {
        self.cache_at(request, response, Utc::now()).await
    }

    async fn delete(&self, request: &Request<Bytes>) -> bool {
        self.storage.delete(&self.key_for(request)).await
    }
}
