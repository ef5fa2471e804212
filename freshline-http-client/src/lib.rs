//! # Freshline HTTP Client
//!
//! An HTTP client built around a middleware chain, with an RFC 7234 /
//! RFC 9111 caching middleware that supports the RFC 5861
//! `stale-while-revalidate` and `stale-if-error` extensions.
//!
//! ## Features
//!
//! - **Response caching**: private, shared, greedy or custom strategies from
//!   [`freshline_cache`]
//! - **Background revalidation**: stale responses are served at once and
//!   refreshed on tracked Tokio tasks
//! - **Middleware**: request/response processing in a composable chain
//! - **Connection Pooling**: Efficient connection reuse
//! - **Compression**: Automatic gzip/brotli support
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use freshline_http_client::{CacheMiddleware, HttpClient, HttpClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cache = CacheMiddleware::default();
//!     let client = HttpClient::new(HttpClientConfig::default())?.with_cache(cache.clone());
//!
//!     let response = client
//!         .get("https://api.example.com/users")
//!         .send()
//!         .await?;
//!
//!     println!("Status: {} ({:?})", response.status(), response.cache_status());
//!
//!     cache.drain().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Shared cache on disk
//!
//! ```rust,no_run
//! use freshline_cache::{FileStore, KeyValueStorage, PublicCacheStrategy};
//! use freshline_http_client::{CacheMiddleware, HttpClient, HttpClientConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = FileStore::with_path("/var/cache/freshline").await?;
//!     let cache = CacheMiddleware::new(PublicCacheStrategy::new(KeyValueStorage::new(store)));
//!
//!     let config = HttpClientConfig::builder()
//!         .base_url("https://api.example.com")
//!         .timeout(Duration::from_secs(30))
//!         .build();
//!     let client = HttpClient::new(config)?.with_cache(cache);
//!
//!     let response = client.get("/catalog").cache_control("max-stale=60").send().await?;
//!     println!("{}", response.text()?);
//!     Ok(())
//! }
//! ```

mod cache;
mod client;
mod config;
mod error;
mod middleware;
mod request;
mod response;
mod revalidation;

pub use cache::{
    CacheMiddleware, CacheMiddlewareConfig, CacheStatus, DEFAULT_STATUS_HEADER,
    INVALIDATION_HEADER, REVALIDATION_HEADER,
};
pub use client::HttpClient;
pub use config::{HttpClientConfig, HttpClientConfigBuilder};
pub use error::{HttpClientError, Result};
pub use middleware::{Middleware, MiddlewareChain};
pub use request::RequestBuilder;
pub use response::Response;
pub use revalidation::{DrainReport, RevalidationTracker};

// Re-export common types
pub use bytes::Bytes;
pub use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
pub use url::Url;

/// Prelude for common imports.
///
/// ```
/// use freshline_http_client::prelude::*;
/// ```
pub mod prelude {
    pub use crate::cache::{CacheMiddleware, CacheMiddlewareConfig, CacheStatus};
    pub use crate::client::HttpClient;
    pub use crate::config::{HttpClientConfig, HttpClientConfigBuilder};
    pub use crate::error::{HttpClientError, Result};
    pub use crate::middleware::{Middleware, MiddlewareChain};
    pub use crate::request::RequestBuilder;
    pub use crate::response::Response;
    pub use crate::revalidation::DrainReport;
    pub use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
}
