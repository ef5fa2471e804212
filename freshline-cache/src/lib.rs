//! HTTP response caching engine for Freshline.
//!
//! This crate holds everything that decides *what* an HTTP cache does,
//! independently of the client it is plugged into:
//!
//! - [`Directives`] - structured header values (`Cache-Control`, `Pragma`, `Vary`)
//! - [`CacheEntry`] - immutable snapshot of a cached exchange and its freshness windows
//! - [`CacheKey`] - deterministic request keys
//! - [`RequestCacheControl`] - request-side freshness constraints
//! - [`CacheStrategy`] - private, public, greedy, null and delegating strategies
//! - [`CacheStorage`] - entry persistence, with in-memory, file and Redis backends
//!
//! # Features
//!
//! - `redis` - Enable the Redis store
//!
//! # Examples
//!
//! ```
//! use freshline_cache::prelude::*;
//! use bytes::Bytes;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let strategy = PrivateCacheStrategy::new(VolatileStorage::new());
//!
//! let request = http::Request::get("https://example.com/items")
//!     .body(Bytes::new())
//!     .unwrap();
//! let response = http::Response::builder()
//!     .header("cache-control", "max-age=60")
//!     .body(Bytes::from_static(b"[]"))
//!     .unwrap();
//!
//! assert!(strategy.cache(&request, &response).await);
//! let entry = strategy.fetch(&request).await.unwrap();
//! assert!(entry.is_fresh());
//! # }
//! ```
//!
//! ## Persistent storage
//!
//! ```no_run
//! use freshline_cache::prelude::*;
//!
//! # async fn example() -> Result<(), CacheError> {
//! let store = FileStore::new(CacheConfig::file("/var/cache/freshline")?).await?;
//! let strategy = PublicCacheStrategy::new(KeyValueStorage::new(store));
//! # let _ = strategy;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod directives;
pub mod entry;
pub mod error;
pub mod file_store;
pub mod freshness;
pub mod key;
pub mod memory;
pub mod policy;
pub mod storage;
pub mod strategy;
pub mod traits;

#[cfg(feature = "redis")]
pub mod redis_store;

pub use config::{CacheConfig, StoreBackend};
pub use directives::{DirectiveValue, Directives};
pub use entry::{CacheEntry, RequestSnapshot, ResponseSnapshot, StoreLifetime, VaryFingerprint};
pub use error::{CacheError, CacheResult};
pub use file_store::FileStore;
pub use freshness::{MaxStale, RequestCacheControl};
pub use key::CacheKey;
pub use memory::InMemoryStore;
pub use policy::CachePolicy;
pub use storage::{CacheStorage, KeyValueStorage, VolatileStorage};
pub use strategy::{
    CacheStrategy, DelegatingCacheStrategy, GreedyCacheStrategy, NullCacheStrategy,
    PrivateCacheStrategy, PublicCacheStrategy, RequestMatcher,
};
pub use traits::CacheStore;

#[cfg(feature = "redis")]
pub use redis_store::RedisStore;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::CacheConfig;
    pub use crate::directives::Directives;
    pub use crate::entry::{CacheEntry, StoreLifetime};
    pub use crate::error::{CacheError, CacheResult};
    pub use crate::file_store::FileStore;
    pub use crate::freshness::RequestCacheControl;
    pub use crate::memory::InMemoryStore;
    pub use crate::policy::CachePolicy;
    pub use crate::storage::{CacheStorage, KeyValueStorage, VolatileStorage};
    pub use crate::strategy::{
        CacheStrategy, DelegatingCacheStrategy, GreedyCacheStrategy, NullCacheStrategy,
        PrivateCacheStrategy, PublicCacheStrategy, RequestMatcher,
    };
    pub use crate::traits::CacheStore;

    #[cfg(feature = "redis")]
    pub use crate::redis_store::RedisStore;
}
