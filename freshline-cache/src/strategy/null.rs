//! Strategy that disables caching.

use super::CacheStrategy;
use crate::entry::CacheEntry;
use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};

/// Strategy that never stores or serves anything.
///
/// Handy as the fallback of a [`DelegatingCacheStrategy`](super::DelegatingCacheStrategy)
/// so that only matched requests are cached.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCacheStrategy;

#[async_trait]
impl CacheStrategy for NullCacheStrategy {
    async fn fetch(&self, _request: &Request<Bytes>) -> Option<CacheEntry> {
        None
    }

    async fn cache(&self, _request: &Request<Bytes>, _response: &Response<Bytes>) -> bool {
        false
    }

    async fn delete(&self, _request: &Request<Bytes>) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_support::{get, response};

    #[tokio::test]
    async fn test_null_strategy() {
        let s = NullCacheStrategy;
        let req = get("https://example.com/", &[]);
        assert!(!s.cache(&req, &response(200, &[("cache-control", "max-age=60")], "")).await);
        assert!(s.fetch(&req).await.is_none());
        assert!(s.delete(&req).await);
        assert!(!s.update(&req, &response(200, &[], "")).await);
    }
}
