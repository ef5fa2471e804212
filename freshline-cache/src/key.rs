//! Cache key derivation.
//!
//! Every strategy derives keys the same way: SHA-256 over the namespace,
//! method, full URI, the SHA-256 of the request body and, for each forced
//! vary header, its lower-cased name and the request's value. Each field is
//! length-prefixed so that no two field splits produce the same input.

use crate::entry::joined_header_value;
use http::Request;
use sha2::{Digest, Sha256};
use tracing::trace;

/// Namespace used by the RFC strategies.
pub const RFC_NAMESPACE: &str = "";

/// Namespace used by the greedy strategy.
pub const GREEDY_NAMESPACE: &str = "greedy";

/// Derives cache keys from requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheKey {
    namespace: String,
    vary_headers: Vec<String>,
}

impl CacheKey {
    /// Key scheme for `namespace` without forced vary headers.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            vary_headers: Vec::new(),
        }
    }

    /// Add forced vary headers, kept in the given order.
    pub fn with_vary_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in headers {
            let name = name.as_ref().to_ascii_lowercase();
            if !self.vary_headers.contains(&name) {
                self.vary_headers.push(name);
            }
        }
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn vary_headers(&self) -> &[String] {
        &self.vary_headers
    }

    /// Lowercase hex key for `request`.
    pub fn derive<B: AsRef<[u8]>>(&self, request: &Request<B>) -> String {
        let mut hasher = Sha256::new();
        write_field(&mut hasher, self.namespace.as_bytes());
        write_field(&mut hasher, request.method().as_str().as_bytes());
        write_field(&mut hasher, request.uri().to_string().as_bytes());
        write_field(&mut hasher, body_digest(request.body().as_ref()).as_bytes());

        for name in &self.vary_headers {
            write_field(&mut hasher, name.as_bytes());
            match joined_header_value(request.headers(), name) {
                Some(value) => {
                    hasher.update([1u8]);
                    write_field(&mut hasher, value.as_bytes());
                }
                None => hasher.update([0u8]),
            }
        }

        let key = hex::encode(hasher.finalize());
        trace!(method = %request.method(), uri = %request.uri(), key = %key, "Derived cache key");
        key
    }
}

fn write_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

/// Hex SHA-256 of a request body. The empty body hashes the empty string.
pub fn body_digest(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn get(uri: &str) -> Request<Bytes> {
        Request::get(uri).body(Bytes::new()).unwrap()
    }

    #[test]
    fn test_key_is_stable_hex() {
        let scheme = CacheKey::new(RFC_NAMESPACE);
        let a = scheme.derive(&get("https://example.com/a"));
        let b = scheme.derive(&get("https://example.com/a"));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_key_covers_method_uri_and_namespace() {
        let rfc = CacheKey::new(RFC_NAMESPACE);
        let greedy = CacheKey::new(GREEDY_NAMESPACE);
        let base = rfc.derive(&get("https://example.com/a"));

        assert_ne!(base, rfc.derive(&get("https://example.com/b")));
        assert_ne!(base, rfc.derive(&get("https://example.com/a?x=1")));
        assert_ne!(base, greedy.derive(&get("https://example.com/a")));

        let head = Request::head("https://example.com/a").body(Bytes::new()).unwrap();
        assert_ne!(base, rfc.derive(&head));
    }

    #[test]
    fn test_key_covers_body() {
        let scheme = CacheKey::new(RFC_NAMESPACE);
        let post = |body: &'static str| {
            Request::post("https://example.com/search")
                .body(Bytes::from_static(body.as_bytes()))
                .unwrap()
        };
        assert_eq!(scheme.derive(&post("q=1")), scheme.derive(&post("q=1")));
        assert_ne!(scheme.derive(&post("q=1")), scheme.derive(&post("q=2")));
    }

    #[test]
    fn test_forced_vary_headers() {
        let scheme = CacheKey::new(GREEDY_NAMESPACE).with_vary_headers(["Authorization"]);
        assert_eq!(scheme.vary_headers(), ["authorization".to_string()]);

        let with = |token: &str| {
            Request::get("https://example.com/me")
                .header("authorization", token)
                .body(Bytes::new())
                .unwrap()
        };
        let alice = scheme.derive(&with("Bearer alice"));
        assert_eq!(alice, scheme.derive(&with("Bearer alice")));
        assert_ne!(alice, scheme.derive(&with("Bearer bob")));
        assert_ne!(alice, scheme.derive(&get("https://example.com/me")));
        assert_ne!(
            scheme.derive(&with("")),
            scheme.derive(&get("https://example.com/me"))
        );
    }

    #[test]
    fn test_unforced_headers_do_not_change_key() {
        let scheme = CacheKey::new(RFC_NAMESPACE);
        let req = Request::get("https://example.com/a")
            .header("user-agent", "test")
            .body(Bytes::new())
            .unwrap();
        assert_eq!(scheme.derive(&req), scheme.derive(&get("https://example.com/a")));
    }

    #[test]
    fn test_body_digest_of_empty_body() {
        assert_eq!(
            body_digest(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
