//! Cacheability rules shared by the RFC strategies.

use http::StatusCode;

/// Status codes cacheable by default.
pub const DEFAULT_CACHEABLE_STATUSES: [u16; 11] =
    [200, 203, 204, 300, 301, 404, 405, 410, 414, 418, 501];

/// Rules a strategy applies when deciding whether to store a response.
///
/// ```
/// use freshline_cache::CachePolicy;
///
/// let policy = CachePolicy::shared().with_vary_header("Authorization");
/// assert!(policy.is_shared());
/// assert_eq!(policy.age_keys(), ["s-maxage", "max-age"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    statuses: Vec<u16>,
    age_keys: Vec<String>,
    shared: bool,
    vary_headers: Vec<String>,
}

impl CachePolicy {
    /// Rules for a cache serving a single client.
    pub fn private() -> Self {
        Self {
            statuses: DEFAULT_CACHEABLE_STATUSES.to_vec(),
            age_keys: vec!["max-age".to_string()],
            shared: false,
            vary_headers: Vec::new(),
        }
    }

    /// Rules for a cache shared between clients.
    pub fn shared() -> Self {
        Self {
            age_keys: vec!["s-maxage".to_string(), "max-age".to_string()],
            shared: true,
            ..Self::private()
        }
    }

    /// Replace the status allow-list.
    pub fn with_statuses<I: IntoIterator<Item = u16>>(mut self, statuses: I) -> Self {
        self.statuses = statuses.into_iter().collect();
        self
    }

    /// Add one status to the allow-list.
    pub fn with_status(mut self, status: u16) -> Self {
        if !self.statuses.contains(&status) {
            self.statuses.push(status);
        }
        self
    }

    /// Replace the age directives, in priority order.
    pub fn with_age_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.age_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Force a request header into every cache key.
    pub fn with_vary_header(mut self, name: impl Into<String>) -> Self {
        self.vary_headers.push(name.into());
        self
    }

    pub fn is_cacheable_status(&self, status: StatusCode) -> bool {
        self.statuses.contains(&status.as_u16())
    }

    pub fn statuses(&self) -> &[u16] {
        &self.statuses
    }

    pub fn age_keys(&self) -> &[String] {
        &self.age_keys
    }

    pub fn is_shared(&self) -> bool {
        self.shared
    }

    pub fn vary_headers(&self) -> &[String] {
        &self.vary_headers
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::private()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_allow_list() {
        let policy = CachePolicy::default();
        assert!(policy.is_cacheable_status(StatusCode::OK));
        assert!(policy.is_cacheable_status(StatusCode::IM_A_TEAPOT));
        assert!(!policy.is_cacheable_status(StatusCode::PARTIAL_CONTENT));
        assert!(!policy.is_cacheable_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!policy.is_shared());
        assert_eq!(policy.age_keys(), ["max-age"]);
    }

    #[test]
    fn test_builders() {
        let policy = CachePolicy::private()
            .with_status(206)
            .with_age_keys(["x-max-age"])
            .with_vary_header("Accept-Language");
        assert!(policy.is_cacheable_status(StatusCode::PARTIAL_CONTENT));
        assert_eq!(policy.age_keys(), ["x-max-age"]);
        assert_eq!(policy.vary_headers(), ["Accept-Language"]);

        let only_ok = CachePolicy::shared().with_statuses([200]);
        assert_eq!(only_ok.statuses(), [200]);
    }
}
