//! Per-request strategy selection.

use super::CacheStrategy;
use crate::entry::CacheEntry;
use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use std::sync::Arc;
use tracing::trace;

/// Decides whether a request belongs to a strategy.
pub trait RequestMatcher: Send + Sync {
    fn matches(&self, request: &Request<Bytes>) -> bool;
}

impl<F> RequestMatcher for F
where
    F: Fn(&Request<Bytes>) -> bool + Send + Sync,
{
    fn matches(&self, request: &Request<Bytes>) -> bool {
        self(request)
    }
}

/// Routes each request to the first registered strategy whose matcher
/// accepts it, or to the default strategy.
///
/// ```
/// use freshline_cache::prelude::*;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let greedy = GreedyCacheStrategy::new(VolatileStorage::new(), Duration::from_secs(300));
/// let strategy = DelegatingCacheStrategy::new(Arc::new(NullCacheStrategy))
///     .register(
///         |req: &http::Request<bytes::Bytes>| req.uri().host() == Some("static.example.com"),
///         Arc::new(greedy),
///     );
/// # let _ = strategy;
/// ```
#[derive(Clone)]
pub struct DelegatingCacheStrategy {
    default: Arc<dyn CacheStrategy>,
    routes: Vec<(Arc<dyn RequestMatcher>, Arc<dyn CacheStrategy>)>,
}

impl DelegatingCacheStrategy {
    pub fn new(default: Arc<dyn CacheStrategy>) -> Self {
        Self {
            default,
            routes: Vec::new(),
        }
    }

    /// Add a route. Routes are tried in registration order.
    pub fn register(
        mut self,
        matcher: impl RequestMatcher + 'static,
        strategy: Arc<dyn CacheStrategy>,
    ) -> Self {
        self.routes.push((Arc::new(matcher), strategy));
        self
    }

    /// Replace the fallback strategy.
    pub fn set_default(&mut self, default: Arc<dyn CacheStrategy>) {
        self.default = default;
    }

    fn select(&self, request: &Request<Bytes>) -> &Arc<dyn CacheStrategy> {
        for (index, (matcher, strategy)) in self.routes.iter().enumerate() {
            if matcher.matches(request) {
                trace!(uri = %request.uri(), route = index, "Delegating to matched strategy");
                return strategy;
            }
        }
        &self.default
    }
}

#[async_trait]
impl CacheStrategy for DelegatingCacheStrategy {
    async fn fetch(&self, request: &Request<Bytes>) -> Option<CacheEntry> {
        self.select(request).fetch(request).await
    }

    async fn cache(&self, request: &Request<Bytes>, response: &Response<Bytes>) -> bool {
        self.select(request).cache(request, response).await
    }

    async fn update(&self, request: &Request<Bytes>, response: &Response<Bytes>) -> bool {
        self.select(request).update(request, response).await
    }

    async fn delete(&self, request: &Request<Bytes>) -> bool {
        self.select(request).delete(request).await
    }
}
