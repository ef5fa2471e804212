//! Cache strategies.
//!
//! A strategy owns the decisions: which key a request maps to, whether a
//! response may be stored and for how long, and whether a stored entry may
//! answer a request. Storage only persists what the strategy hands it.
//!
//! | Strategy | Stores |
//! |----------|--------|
//! | [`PrivateCacheStrategy`] | RFC 7234 private cache rules |
//! | [`PublicCacheStrategy`] | private rules plus shared-cache restrictions |
//! | [`GreedyCacheStrategy`] | anything with an accepted status, for a fixed TTL |
//! | [`NullCacheStrategy`] | nothing |
//! | [`DelegatingCacheStrategy`] | whatever the strategy selected for the request stores |

mod delegate;
mod greedy;
mod null;
mod private;
mod public;

pub use delegate::{DelegatingCacheStrategy, RequestMatcher};
pub use greedy::{GREEDY_TTL_HEADER, GREEDY_WARNING, GreedyCacheStrategy};
pub use null::NullCacheStrategy;
pub use private::PrivateCacheStrategy;
pub use public::PublicCacheStrategy;

use crate::entry::CacheEntry;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::header::EXPIRES;
use http::{HeaderMap, Request, Response};
use std::sync::Arc;

/// Decision engine consulted by the cache middleware.
#[async_trait]
pub trait CacheStrategy: Send + Sync {
    /// Stored entry usable for `request`, if any.
    ///
    /// The caller classifies the entry (fresh, stale, revalidatable) from
    /// its timestamps.
    async fn fetch(&self, request: &Request<Bytes>) -> Option<CacheEntry>;

    /// Store `response` for `request` if the strategy allows it.
    async fn cache(&self, request: &Request<Bytes>, response: &Response<Bytes>) -> bool;

    /// Store a response refreshed by revalidation.
    async fn update(&self, request: &Request<Bytes>, response: &Response<Bytes>) -> bool {
        self.cache(request, response).await
    }

    /// Forget the entry `request` maps to.
    async fn delete(&self, request: &Request<Bytes>) -> bool;
}

#[async_trait]
impl<T: CacheStrategy + ?Sized> CacheStrategy for Arc<T> {
    async fn fetch(&self, request: &Request<Bytes>) -> Option<CacheEntry> {
        (**self).fetch(request).await
    }

    async fn cache(&self, request: &Request<Bytes>, response: &Response<Bytes>) -> bool {
        (**self).cache(request, response).await
    }

    async fn update(&self, request: &Request<Bytes>, response: &Response<Bytes>) -> bool {
        (**self).update(request, response).await
    }

    async fn delete(&self, request: &Request<Bytes>) -> bool {
        (**self).delete(request).await
    }
}

/// `Expires` as an instant. Unparseable dates read as absent.
pub(crate) fn parse_expires(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    let raw = headers.get(EXPIRES)?.to_str().ok()?;
    DateTime::parse_from_rfc2822(raw.trim())
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

#[cfg(test)]
pub(crate) mod test_support {
    use bytes::Bytes;
    use http::{Request, Response};

    pub fn get(uri: &str, headers: &[(&str, &str)]) -> Request<Bytes> {
        let mut builder = Request::get(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Bytes::new()).unwrap()
    }

    pub fn response(status: u16, headers: &[(&str, &str)], body: &'static str) -> Response<Bytes> {
        let mut builder = Response::builder().status(status);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Bytes::from_static(body.as_bytes())).unwrap()
    }
}
