//! Shared cache rules.

use super::{CacheStrategy, PrivateCacheStrategy};
use crate::directives::Directives;
use crate::entry::CacheEntry;
use crate::policy::CachePolicy;
use crate::storage::{CacheStorage, VolatileStorage};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::header::{AUTHORIZATION, CACHE_CONTROL};
use http::{Request, Response};
use std::sync::Arc;
use tracing::debug;

/// Cache shared between clients.
///
/// Applies the private rules with `s-maxage` taking priority over
/// `max-age`, and refuses responses a shared cache must not hold:
/// anything marked `private`, and responses to credentialed requests
/// unless they are explicitly `public`, `must-revalidate` or carry
/// `s-maxage`.
#[derive(Clone)]
pub struct PublicCacheStrategy {
    inner: PrivateCacheStrategy,
}

impl PublicCacheStrategy {
    pub fn new(storage: impl CacheStorage + 'static) -> Self {
        Self::with_policy(Arc::new(storage), CachePolicy::shared())
    }

    pub fn with_policy(storage: Arc<dyn CacheStorage>, policy: CachePolicy) -> Self {
        Self {
            inner: PrivateCacheStrategy::with_policy(storage, policy),
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        self.inner.policy()
    }

    pub fn key_for(&self, request: &Request<Bytes>) -> String {
        self.inner.key_for(request)
    }

    /// Whether a shared cache may hold `response` for `request` at all.
    pub fn allows(request: &Request<Bytes>, response: &Response<Bytes>) -> bool {
        let cache_control = Directives::from_headers(response.headers(), CACHE_CONTROL);
        if cache_control.has("private") {
            debug!(uri = %request.uri(), "Private response refused by shared cache");
            return false;
        }

        if request.headers().contains_key(AUTHORIZATION)
            && !(cache_control.has("public")
                || cache_control.has("must-revalidate")
                || cache_control.has("s-maxage"))
        {
            debug!(uri = %request.uri(), "Credentialed response not explicitly shareable");
            return false;
        }

        true
    }

    pub async fn cache_at(
        &self,
        request: &Request<Bytes>,
        response: &Response<Bytes>,
        now: DateTime<Utc>,
    ) -> bool {
        Self::allows(request, response) && self.inner.cache_at(request, response, now).await
    }
}

impl Default for PublicCacheStrategy {
    fn default() -> Self {
        Self::new(VolatileStorage::new())
    }
}

#[async_trait]
impl CacheStrategy for PublicCacheStrategy {
    async fn fetch(&self, request: &Request<Bytes>) -> Option<CacheEntry> {
        self.inner.fetch(request).await
    }

    async fn cache(&self, request: &Request<Bytes>, response: &Response<Bytes>) -> bool {
        self.cache_at(request, response, Utc::now()).await
    }

    async fn delete(&self, request: &Request<Bytes>) -> bool {
        self.inner.delete(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_support::{get, response};
    use chrono::TimeDelta;

    const URI: &str = "https://api.example.com/shared";

    #[tokio::test]
    async fn test_private_response_refused() {
        let public = PublicCacheStrategy::default();
        let private = PrivateCacheStrategy::default();
        let req = get(URI, &[]);
        let resp = response(200, &[("cache-control", "private, max-age=60")], "");

        assert!(!public.cache(&req, &resp).await);
        assert!(private.cache(&req, &resp).await);
    }

    #[tokio::test]
    async fn test_s_maxage_takes_priority() {
        let public = PublicCacheStrategy::default();
        let now = Utc::now();
        let req = get(URI, &[]);
        let resp = response(200, &[("cache-control", "max-age=10, s-maxage=100")], "");

        assert!(public.cache_at(&req, &resp, now).await);
        let entry = public.fetch(&req).await.unwrap();
        assert_eq!(entry.stale_at(), now + TimeDelta::seconds(100));
    }

    #[tokio::test]
    async fn test_authorization_rules() {
        let public = PublicCacheStrategy::default();
        let req = get(URI, &[("authorization", "Bearer t")]);

        assert!(!public.cache(&req, &response(200, &[("cache-control", "max-age=60")], "")).await);
        assert!(
            public
                .cache(&req, &response(200, &[("cache-control", "public, max-age=60")], ""))
                .await
        );
        assert!(
            public
                .cache(&req, &response(200, &[("cache-control", "must-revalidate, max-age=60")], ""))
                .await
        );
        assert!(public.cache(&req, &response(200, &[("cache-control", "s-maxage=60")], "")).await);
    }

    #[tokio::test]
    async fn test_inherits_private_rules() {
        let public = PublicCacheStrategy::default();
        let req = get(URI, &[]);
        assert!(!public.cache(&req, &response(200, &[("cache-control", "no-store")], "")).await);
        assert!(!public.cache(&req, &response(206, &[("cache-control", "max-age=60")], "")).await);
        assert!(public.policy().is_shared());
    }
}
