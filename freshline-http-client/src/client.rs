//! HTTP client implementation.

use http::Method;
use reqwest::Request;
use std::sync::Arc;
use tracing::debug;

use crate::{
    CacheMiddleware, HttpClientConfig, HttpClientError, Middleware, MiddlewareChain,
    RequestBuilder, Response, Result,
};

/// HTTP client that sends every request through its middleware chain.
#[derive(Clone)]
pub struct HttpClient {
    chain: MiddlewareChain,
    config: Arc<HttpClientConfig>,
}

impl HttpClient {
    /// Create a client. Invalid configuration is rejected here rather than
    /// on the first request.
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        config.validate()?;

        let builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent)
            .gzip(config.compression)
            .brotli(config.compression)
            .redirect(match config.max_redirects {
                Some(max) => reqwest::redirect::Policy::limited(max),
                None => reqwest::redirect::Policy::none(),
            });

        let inner = builder
            .build()
            .map_err(|e| HttpClientError::Config(e.to_string()))?;

        debug!(
            base_url = config.base_url.as_deref().unwrap_or(""),
            timeout = ?config.timeout,
            "HTTP client created"
        );

        Ok(Self {
            chain: MiddlewareChain::new(inner),
            config: Arc::new(config),
        })
    }

    /// Create a client with the default configuration.
    pub fn default_client() -> Result<Self> {
        Self::new(HttpClientConfig::default())
    }

    /// Append a middleware. Middlewares run in the order they are added.
    pub fn with_middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.chain = self.chain.with_middleware(middleware);
        self
    }

    /// Answer requests from `cache`.
    ///
    /// Keep a clone of the middleware to [`drain`](CacheMiddleware::drain)
    /// background revalidations before shutdown.
    pub fn with_cache(self, cache: CacheMiddleware) -> Self {
        self.with_middleware(cache)
    }

    /// Get the underlying reqwest client.
    pub fn inner(&self) -> &reqwest::Client {
        self.chain.client()
    }

    /// Get the client configuration.
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Create a GET request builder.
    pub fn get(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::GET, url.into())
    }

    /// Create a POST request builder.
    pub fn post(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::POST, url.into())
    }

    /// Create a PUT request builder.
    pub fn put(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::PUT, url.into())
    }

    /// Create a PATCH request builder.
    pub fn patch(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::PATCH, url.into())
    }

    /// Create a DELETE request builder.
    pub fn delete(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::DELETE, url.into())
    }

    /// Create a HEAD request builder.
    pub fn head(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::HEAD, url.into())
    }

    /// Create a request builder with a custom method.
    pub fn request(&self, method: Method, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, method, url.into())
    }

    /// Send a prepared request through the middleware chain.
    pub async fn execute(&self, request: Request) -> Result<Response> {
        self.chain.execute(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_client_creation() {
        let client = HttpClient::default_client().unwrap();
        assert!(client.config().compression);
        assert_eq!(client.config().max_redirects, Some(10));
    }

    #[test]
    fn test_client_with_config() {
        let config = HttpClientConfig::builder()
            .timeout(Duration::from_secs(60))
            .base_url("https://api.example.com")
            .build();

        let client = HttpClient::new(config).unwrap();
        assert_eq!(client.config().timeout, Duration::from_secs(60));
        assert_eq!(
            client.config().base_url.as_deref(),
            Some("https://api.example.com")
        );
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let config = HttpClientConfig::builder().base_url("relative/path").build();
        assert!(matches!(
            HttpClient::new(config),
            Err(HttpClientError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_with_cache_appends_middleware() {
        let client = HttpClient::default_client()
            .unwrap()
            .with_cache(CacheMiddleware::default());
        assert_eq!(client.chain.len(), 1);
    }
}
