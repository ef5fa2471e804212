//! Error types for cache operations.

use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-specific errors.
///
/// These surface from store backends and configuration. The HTTP-facing
/// [`CacheStorage`](crate::storage::CacheStorage) contract converts them to
/// misses, so a caller of the middleware never sees one.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Redis-specific error
    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Filesystem error from the file store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Generic error
    #[error("Cache error: {0}")]
    Other(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            CacheError::Deserialization(err.to_string())
        } else {
            CacheError::Serialization(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_syntax_error_maps_to_deserialization() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: CacheError = err.into();
        assert!(matches!(err, CacheError::Deserialization(_)));
    }

    #[test]
    fn test_display() {
        let err = CacheError::Config("missing path".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing path");
    }
}
