// Freshline - RFC 7234 / RFC 9111 HTTP response caching for Rust HTTP clients
//
// The cache engine (strategies, entries, storage) lives in `freshline-cache`;
// the client and its caching middleware live in `freshline-http-client`.

// Re-export the cache engine
pub use freshline_cache::*;

// Re-export the client
#[cfg(feature = "client")]
pub use freshline_http_client as client;

#[cfg(feature = "client")]
pub use freshline_http_client::{
    CacheMiddleware, CacheMiddlewareConfig, CacheStatus, DrainReport, HttpClient,
    HttpClientConfig, HttpClientError, Middleware, MiddlewareChain, Response,
};

// Prelude for common imports
pub mod prelude {
    pub use freshline_cache::prelude::*;

    #[cfg(feature = "client")]
    pub use freshline_http_client::prelude::*;
}
