//! HTTP Client error types.

use thiserror::Error;

/// Result type for HTTP client operations.
pub type Result<T> = std::result::Result<T, HttpClientError>;

#[derive(Debug, Error)]
pub enum HttpClientError {
    /// The origin could not be reached.
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid client or middleware configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to build request: {0}")]
    RequestBuild(String),

    /// Error status returned by [`Response::error_for_status`](crate::Response::error_for_status).
    #[error("Response error: {status} - {message}")]
    Response { status: u16, message: String },

    /// Body could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Transport error from reqwest.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl HttpClientError {
    /// Whether the exchange failed below HTTP, so no usable response arrived.
    /// These are the failures a cache may answer with a stale entry.
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::Http(e) => {
                e.is_connect() || e.is_timeout() || e.is_request() || e.is_body() || e.is_decode()
            }
            _ => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Http(e) if e.is_timeout())
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_)) || matches!(self, Self::Http(e) if e.is_connect())
    }

    /// HTTP status carried by the error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Response { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification() {
        assert!(HttpClientError::Connection("refused".into()).is_transport());
        assert!(HttpClientError::Connection("refused".into()).is_connection());
        assert!(!HttpClientError::InvalidUrl("::".into()).is_transport());
        assert!(!HttpClientError::Decode("not utf-8".into()).is_transport());
        assert!(
            !HttpClientError::Response {
                status: 503,
                message: "unavailable".into()
            }
            .is_transport()
        );
    }

    #[test]
    fn test_status_code() {
        let err = HttpClientError::Response {
            status: 404,
            message: "missing".into(),
        };
        assert_eq!(err.status_code(), Some(404));
        assert_eq!(HttpClientError::Config("x".into()).status_code(), None);
    }
}
