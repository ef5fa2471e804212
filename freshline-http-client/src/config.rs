//! HTTP client configuration.

use crate::{HttpClientError, Result};
use std::time::Duration;

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL that relative request paths are joined onto.
    pub base_url: Option<String>,
    /// Whole-request timeout.
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// How long an idle pooled connection is kept.
    pub pool_idle_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    /// Headers added to every request.
    pub default_headers: Vec<(String, String)>,
    pub user_agent: String,
    /// Negotiate gzip and brotli response bodies.
    pub compression: bool,
    /// Redirects to follow; `None` disables following.
    pub max_redirects: Option<usize>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 32,
            default_headers: Vec::new(),
            user_agent: format!("freshline/{}", env!("CARGO_PKG_VERSION")),
            compression: true,
            max_redirects: Some(10),
        }
    }
}

impl HttpClientConfig {
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }

    /// Reject settings that would only fail once a request is sent.
    pub fn validate(&self) -> Result<()> {
        if let Some(base) = &self.base_url {
            url::Url::parse(base)
                .map_err(|e| HttpClientError::InvalidUrl(format!("{base}: {e}")))?;
        }

        for (name, value) in &self.default_headers {
            let invalid = |e: &dyn std::fmt::Display| {
                HttpClientError::Config(format!("default header {name:?}: {e}"))
            };
            http::HeaderName::try_from(name.as_str()).map_err(|e| invalid(&e))?;
            http::HeaderValue::try_from(value.as_str()).map_err(|e| invalid(&e))?;
        }

        if self.timeout.is_zero() {
            return Err(HttpClientError::Config("timeout must be non-zero".into()));
        }
        Ok(())
    }
}

/// Builder for [`HttpClientConfig`].
#[derive(Debug, Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Connection pool sizing.
    pub fn pool(mut self, idle_timeout: Duration, max_idle_per_host: usize) -> Self {
        self.config.pool_idle_timeout = idle_timeout;
        self.config.pool_max_idle_per_host = max_idle_per_host;
        self
    }

    /// Send `name: value` with every request.
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.push((name.into(), value.into()));
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn compression(mut self, enabled: bool) -> Self {
        self.config.compression = enabled;
        self
    }

    /// Follow at most `max` redirects, or none.
    pub fn redirects(mut self, max: Option<usize>) -> Self {
        self.config.max_redirects = max;
        self
    }

    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}
