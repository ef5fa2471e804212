//! HTTP caching middleware.
//!
//! [`CacheMiddleware`] sits in the client's middleware chain and answers
//! requests from a [`CacheStrategy`] when the stored response allows it:
//!
//! - fresh entries are served without touching the network (`HIT`)
//! - stale entries inside their `stale-while-revalidate` window are served
//!   at once while a tracked background task revalidates them (`STALE`)
//! - other stale entries with validators turn the request into a
//!   conditional one; a `304` refreshes the entry (`REVALIDATED`)
//! - when the origin fails, entries inside their `stale-if-error` window
//!   stand in for the error (`STALE`)
//! - everything else goes upstream and is offered to the strategy (`MISS`)
//!
//! Unsafe methods invalidate stored responses for the same URI once the
//! origin accepts them.

use crate::middleware::{Middleware, MiddlewareChain};
use crate::revalidation::{DrainReport, RevalidationTracker};
use crate::{Response, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use freshline_cache::{CacheEntry, CacheStrategy, PrivateCacheStrategy, RequestCacheControl};
use futures::future::join_all;
use http::header::{AGE, CONTENT_LENGTH, IF_MODIFIED_SINCE, IF_NONE_MATCH};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use reqwest::Request;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};
use url::Url;

/// Default name of the header reporting the cache outcome.
pub const DEFAULT_STATUS_HEADER: &str = "x-freshline-cache";

/// Request header that makes the middleware step aside for one request.
pub const REVALIDATION_HEADER: &str = "x-freshline-revalidation";

/// Response header set when an unsafe request invalidated stored responses.
pub const INVALIDATION_HEADER: &str = "x-freshline-invalidation";

/// How a response was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheStatus {
    /// Served from cache.
    Hit,
    /// Fetched from the origin.
    Miss,
    /// Served from cache past its freshness lifetime.
    Stale,
    /// Stored response confirmed by the origin with `304 Not Modified`.
    Revalidated,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
            Self::Stale => "STALE",
            Self::Revalidated => "REVALIDATED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "HIT" => Some(Self::Hit),
            "MISS" => Some(Self::Miss),
            "STALE" => Some(Self::Stale),
            "REVALIDATED" => Some(Self::Revalidated),
            _ => None,
        }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache middleware configuration.
#[derive(Debug, Clone)]
pub struct CacheMiddlewareConfig {
    /// Methods answered from cache.
    pub methods: Vec<Method>,
    /// Header carrying the [`CacheStatus`].
    pub status_header: HeaderName,
    /// Add `Age` to responses served from cache.
    pub add_age_header: bool,
    /// Serve stale-while-revalidate entries and refresh them in the
    /// background. When off, such entries are revalidated inline.
    pub background_revalidation: bool,
}

impl Default for CacheMiddlewareConfig {
    fn default() -> Self {
        Self {
            methods: vec![Method::GET],
            status_header: HeaderName::from_static(DEFAULT_STATUS_HEADER),
            add_age_header: true,
            background_revalidation: true,
        }
    }
}

impl CacheMiddlewareConfig {
    pub fn with_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }

    pub fn with_status_header(mut self, name: HeaderName) -> Self {
        self.status_header = name;
        self
    }

    pub fn with_age_header(mut self, enabled: bool) -> Self {
        self.add_age_header = enabled;
        self
    }

    pub fn with_background_revalidation(mut self, enabled: bool) -> Self {
        self.background_revalidation = enabled;
        self
    }
}

/// Caching middleware for [`HttpClient`](crate::HttpClient).
///
/// Clones share the strategy and the revalidation tracker.
#[derive(Clone)]
pub struct CacheMiddleware {
    strategy: Arc<dyn CacheStrategy>,
    config: Arc<CacheMiddlewareConfig>,
    revalidations: Arc<RevalidationTracker>,
}

impl CacheMiddleware {
    /// Cache with `strategy` and the default configuration.
    pub fn new(strategy: impl CacheStrategy + 'static) -> Self {
        Self::with_strategy(Arc::new(strategy))
    }

    pub fn with_strategy(strategy: Arc<dyn CacheStrategy>) -> Self {
        Self {
            strategy,
            config: Arc::new(CacheMiddlewareConfig::default()),
            revalidations: Arc::new(RevalidationTracker::new()),
        }
    }

    pub fn with_config(mut self, config: CacheMiddlewareConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn strategy(&self) -> &Arc<dyn CacheStrategy> {
        &self.strategy
    }

    pub fn config(&self) -> &CacheMiddlewareConfig {
        &self.config
    }

    pub fn revalidations(&self) -> &RevalidationTracker {
        &self.revalidations
    }

    /// Wait for background revalidations. Call before shutdown.
    pub async fn drain(&self) -> DrainReport {
        self.revalidations.drain().await
    }

    fn tag(&self, response: &mut Response, status: CacheStatus) {
        response
            .headers_mut()
            .insert(self.config.status_header.clone(), HeaderValue::from_static(status.as_str()));
    }

    fn serve(&self, entry: &CacheEntry, url: &Url, status: CacheStatus, now: DateTime<Utc>) -> Response {
        let mut response = Response::from_http(entry.response(), url.clone());
        if self.config.add_age_header {
            response
                .headers_mut()
                .insert(AGE, HeaderValue::from(entry.age_at(now)));
        }
        self.tag(&mut response, status);
        response
    }

    fn serve_stale_on_error(&self, entry: Option<&CacheEntry>, url: &Url) -> Option<Response> {
        let now = Utc::now();
        let entry = entry.filter(|entry| entry.serve_stale_if_error_at(now))?;
        debug!(%url, stale_age = entry.stale_age_at(now), "Origin failed, serving stale response");
        Some(self.serve(entry, url, CacheStatus::Stale, now))
    }

    fn gateway_timeout(&self, url: &Url) -> Response {
        let mut response =
            Response::from_parts(StatusCode::GATEWAY_TIMEOUT, HeaderMap::new(), Bytes::new(), url.clone());
        self.tag(&mut response, CacheStatus::Miss);
        response
    }

    /// Methods outside the cacheable set. Unsafe ones invalidate on success.
    async fn forward_uncached(&self, request: Request, next: &MiddlewareChain) -> Result<Response> {
        let targets = if is_unsafe(request.method()) {
            self.config
                .methods
                .iter()
                .filter_map(|method| {
                    to_http_request(method.clone(), request.url(), request.headers(), Bytes::new())
                })
                .collect()
        } else {
            Vec::new()
        };

        let mut response = next.next(request).await?;
        let status = response.status();
        if !targets.is_empty() && (status.is_success() || status.is_redirection()) {
            let deleted = join_all(targets.iter().map(|target| self.strategy.delete(target))).await;
            debug!(
                url = %response.url(),
                %status,
                deleted = deleted.into_iter().filter(|d| *d).count(),
                "Invalidated stored responses"
            );
            response
                .headers_mut()
                .insert(INVALIDATION_HEADER, HeaderValue::from_static("1"));
        }
        self.tag(&mut response, CacheStatus::Miss);
        Ok(response)
    }

    fn revalidate_in_background(
        &self,
        request: Request,
        snapshot: http::Request<Bytes>,
        entry: CacheEntry,
        next: &MiddlewareChain,
    ) {
        let strategy = self.strategy.clone();
        let next = next.clone();
        self.revalidations.spawn(async move {
            let response = next.next(request).await?;
            let stored = if response.status() == StatusCode::NOT_MODIFIED {
                strategy
                    .update(&snapshot, &merge_not_modified(&entry, response.headers()))
                    .await
            } else {
                strategy.cache(&snapshot, &response.to_http()).await
            };
            debug!(
                url = %response.url(),
                status = %response.status(),
                stored,
                "Background revalidation finished"
            );
            Ok(stored)
        });
    }

    async fn complete(
        &self,
        snapshot: &http::Request<Bytes>,
        entry: Option<CacheEntry>,
        mut response: Response,
    ) -> Result<Response> {
        if response.status() == StatusCode::NOT_MODIFIED
            && let Some(entry) = entry
        {
            let merged = merge_not_modified(&entry, response.headers());
            let updated = self.strategy.update(snapshot, &merged).await;
            debug!(url = %response.url(), updated, "Stored response revalidated");

            let mut revalidated = Response::from_http(merged, response.url().clone());
            self.tag(&mut revalidated, CacheStatus::Revalidated);
            return Ok(revalidated);
        }

        let stored = self.strategy.cache(snapshot, &response.to_http()).await;
        debug!(url = %response.url(), status = %response.status(), stored, "Cache miss");
        self.tag(&mut response, CacheStatus::Miss);
        Ok(response)
    }
}

impl Default for CacheMiddleware {
    fn default() -> Self {
        Self::new(PrivateCacheStrategy::default())
    }
}

impl fmt::Debug for CacheMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheMiddleware")
            .field("config", &self.config)
            .field("revalidations", &self.revalidations)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Middleware for CacheMiddleware {
    async fn handle(&self, mut request: Request, next: &MiddlewareChain) -> Result<Response> {
        if request.headers_mut().remove(REVALIDATION_HEADER).is_some() {
            trace!(url = %request.url(), "Revalidation marker present, bypassing cache");
            return next.next(request).await;
        }

        if !self.config.methods.contains(request.method()) {
            return self.forward_uncached(request, next).await;
        }

        let url = request.url().clone();
        let Some(snapshot) = snapshot(&request) else {
            debug!(%url, "Request body cannot be replayed, bypassing cache");
            let mut response = next.next(request).await?;
            self.tag(&mut response, CacheStatus::Miss);
            return Ok(response);
        };

        let control = RequestCacheControl::from_headers(snapshot.headers());
        let entry = self.strategy.fetch(&snapshot).await;
        let now = Utc::now();

        if let Some(entry) = &entry
            && control.accepts(entry, now)
        {
            debug!(%url, age = entry.age_at(now), "Cache hit");
            return Ok(self.serve(entry, &url, CacheStatus::Hit, now));
        }

        if control.only_if_cached {
            debug!(%url, "No acceptable stored response for only-if-cached request");
            return Ok(self.gateway_timeout(&url));
        }

        if let Some(entry) = &entry {
            add_conditional_headers(request.headers_mut(), entry);

            if self.config.background_revalidation
                && entry.is_stale_at(now)
                && entry.stale_while_revalidate_at(now)
            {
                debug!(%url, stale_age = entry.stale_age_at(now), "Serving stale response while revalidating");
                self.revalidate_in_background(request, snapshot, entry.clone(), next);
                return Ok(self.serve(entry, &url, CacheStatus::Stale, now));
            }
        }

        let response = match next.next(request).await {
            Ok(response) if response.is_server_error() => {
                match self.serve_stale_on_error(entry.as_ref(), &url) {
                    Some(stale) => return Ok(stale),
                    None => response,
                }
            }
            Ok(response) => response,
            Err(error) if error.is_transport() => {
                return self
                    .serve_stale_on_error(entry.as_ref(), &url)
                    .ok_or(error);
            }
            Err(error) => return Err(error),
        };

        self.complete(&snapshot, entry, response).await
    }
}

fn is_unsafe(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::DELETE | Method::PATCH)
}

/// `http` copy of a request as the cache sees it. `None` when the body is
/// a stream that cannot be read without consuming it.
fn snapshot(request: &Request) -> Option<http::Request<Bytes>> {
    let body = match request.body() {
        Some(body) => Bytes::copy_from_slice(body.as_bytes()?),
        None => Bytes::new(),
    };
    to_http_request(request.method().clone(), request.url(), request.headers(), body)
}

fn to_http_request(
    method: Method,
    url: &Url,
    headers: &HeaderMap,
    body: Bytes,
) -> Option<http::Request<Bytes>> {
    let uri: http::Uri = url.as_str().parse().ok()?;
    let mut request = http::Request::new(body);
    *request.method_mut() = method;
    *request.uri_mut() = uri;
    *request.headers_mut() = headers.clone();
    Some(request)
}

fn add_conditional_headers(headers: &mut HeaderMap, entry: &CacheEntry) {
    if let Some(last_modified) = entry.last_modified().and_then(|v| HeaderValue::from_str(v).ok()) {
        headers.insert(IF_MODIFIED_SINCE, last_modified);
    }
    if let Some(etag) = entry.etag().and_then(|v| HeaderValue::from_str(v).ok()) {
        headers.insert(IF_NONE_MATCH, etag);
    }
}

/// Stored response refreshed by a `304`: status and body from the entry,
/// headers from the entry overridden by the ones the `304` carries.
/// `Content-Length` always describes the stored body.
fn merge_not_modified(entry: &CacheEntry, not_modified: &HeaderMap) -> http::Response<Bytes> {
    let mut response = entry.response();
    let headers = response.headers_mut();
    for name in not_modified.keys().filter(|name| *name != CONTENT_LENGTH) {
        headers.remove(name);
        for value in not_modified.get_all(name) {
            headers.append(name.clone(), value.clone());
        }
    }
    response
}
