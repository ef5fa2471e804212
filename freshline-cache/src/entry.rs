//! Cached exchanges.
//!
//! A [`CacheEntry`] is an immutable snapshot of one request/response pair
//! together with the timestamps that decide how it may be served. All
//! timestamps are derived once, when the entry is built; revalidation builds a
//! new entry instead of touching an old one.
//!
//! Every time-dependent accessor has an `*_at(now)` twin so decisions can be
//! evaluated against a fixed clock.

use crate::directives::Directives;
use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};
use http::header::{CACHE_CONTROL, ETAG, LAST_MODIFIED, VARY};
use http::{HeaderMap, Method, Request, Response, StatusCode, Uri};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The request that produced a cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSnapshot {
    #[serde(with = "wire::method")]
    pub method: Method,
    #[serde(with = "wire::uri")]
    pub uri: Uri,
    #[serde(with = "wire::headers")]
    pub headers: HeaderMap,
    #[serde(with = "wire::body")]
    pub body: Bytes,
}

impl RequestSnapshot {
    /// Snapshot a request. The body is shared, not copied.
    pub fn from_request(request: &Request<Bytes>) -> Self {
        Self {
            method: request.method().clone(),
            uri: request.uri().clone(),
            headers: request.headers().clone(),
            body: request.body().clone(),
        }
    }
}

/// The stored response of a cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    #[serde(with = "wire::status")]
    pub status: StatusCode,
    #[serde(with = "wire::headers")]
    pub headers: HeaderMap,
    #[serde(with = "wire::body")]
    pub body: Bytes,
}

impl ResponseSnapshot {
    pub fn from_response(response: &Response<Bytes>) -> Self {
        Self {
            status: response.status(),
            headers: response.headers().clone(),
            body: response.body().clone(),
        }
    }
}

/// Request header values captured for each name in the response's `Vary` list.
///
/// Names are lower-cased. Repeated request headers are joined with `", "`;
/// a header the original request did not send is recorded as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaryFingerprint {
    headers: Vec<(String, Option<String>)>,
}

impl VaryFingerprint {
    /// Build the fingerprint of `request` for the `Vary` list of `response_headers`.
    pub fn capture(response_headers: &HeaderMap, request_headers: &HeaderMap) -> Self {
        let vary = Directives::from_headers(response_headers, VARY);
        let mut headers: Vec<(String, Option<String>)> = Vec::with_capacity(vary.len());
        for name in vary.names() {
            let name = name.to_ascii_lowercase();
            if name == "*" || headers.iter().any(|(n, _)| *n == name) {
                continue;
            }
            let value = joined_header_value(request_headers, &name);
            headers.push((name, value));
        }
        Self { headers }
    }

    /// Whether `request_headers` presents the same values.
    ///
    /// Names match case-insensitively, values exactly.
    pub fn matches(&self, request_headers: &HeaderMap) -> bool {
        self.headers
            .iter()
            .all(|(name, value)| joined_header_value(request_headers, name) == *value)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.headers.iter().map(|(n, _)| n.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

/// All values of `name` joined with `", "`, or `None` when absent.
pub(crate) fn joined_header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let values: Vec<String> = headers
        .get_all(name)
        .iter()
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.join(", "))
    }
}

/// How long a storage backend should keep an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreLifetime {
    /// No expiry; the entry carries validators and is revalidated when stale.
    Indefinite,
    /// Expire after the given duration.
    For(Duration),
    /// Do not store.
    Discard,
}

/// A cached request/response pair and its freshness windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    request: RequestSnapshot,
    response: ResponseSnapshot,
    created_at: DateTime<Utc>,
    stale_at: DateTime<Utc>,
    stale_if_error_to: Option<DateTime<Utc>>,
    stale_while_revalidate_to: Option<DateTime<Utc>>,
    vary: VaryFingerprint,
}

impl CacheEntry {
    /// Build an entry created now that becomes stale at `stale_at`.
    pub fn new(request: &Request<Bytes>, response: &Response<Bytes>, stale_at: DateTime<Utc>) -> Self {
        Self::new_at(request, response, stale_at, Utc::now())
    }

    /// Build an entry created at `now`.
    ///
    /// `stale-if-error=N` and `stale-while-revalidate=N` on the response open
    /// windows of `N` seconds starting at `stale_at`. `must-revalidate`
    /// closes the stale-if-error window only.
    pub fn new_at(
        request: &Request<Bytes>,
        response: &Response<Bytes>,
        stale_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        let cache_control = Directives::from_headers(response.headers(), CACHE_CONTROL);

        let stale_if_error_to = if cache_control.has("must-revalidate") {
            None
        } else {
            cache_control
                .seconds("stale-if-error")
                .map(|secs| add_seconds(stale_at, secs))
        };
        let stale_while_revalidate_to = cache_control
            .seconds("stale-while-revalidate")
            .map(|secs| add_seconds(stale_at, secs));

        Self {
            request: RequestSnapshot::from_request(request),
            response: ResponseSnapshot::from_response(response),
            created_at: now,
            stale_at,
            stale_if_error_to,
            stale_while_revalidate_to,
            vary: VaryFingerprint::capture(response.headers(), request.headers()),
        }
    }

    /// Rebuild the stored response. The body is a cheap clone.
    pub fn response(&self) -> Response<Bytes> {
        let mut response = Response::new(self.response.body.clone());
        *response.status_mut() = self.response.status;
        *response.headers_mut() = self.response.headers.clone();
        response
    }

    /// Rebuild the stored request.
    pub fn request(&self) -> Request<Bytes> {
        let mut request = Request::new(self.request.body.clone());
        *request.method_mut() = self.request.method.clone();
        *request.uri_mut() = self.request.uri.clone();
        *request.headers_mut() = self.request.headers.clone();
        request
    }

    pub fn request_snapshot(&self) -> &RequestSnapshot {
        &self.request
    }

    pub fn response_snapshot(&self) -> &ResponseSnapshot {
        &self.response
    }

    pub fn status(&self) -> StatusCode {
        self.response.status
    }

    pub fn response_headers(&self) -> &HeaderMap {
        &self.response.headers
    }

    pub fn body(&self) -> Bytes {
        self.response.body.clone()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn stale_at(&self) -> DateTime<Utc> {
        self.stale_at
    }

    pub fn stale_if_error_to(&self) -> Option<DateTime<Utc>> {
        self.stale_if_error_to
    }

    pub fn stale_while_revalidate_to(&self) -> Option<DateTime<Utc>> {
        self.stale_while_revalidate_to
    }

    pub fn vary(&self) -> &VaryFingerprint {
        &self.vary
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }

    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now < self.stale_at
    }

    pub fn is_stale(&self) -> bool {
        self.is_stale_at(Utc::now())
    }

    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_fresh_at(now)
    }

    /// Whole seconds since the entry was created.
    pub fn age(&self) -> u64 {
        self.age_at(Utc::now())
    }

    pub fn age_at(&self, now: DateTime<Utc>) -> u64 {
        (now - self.created_at).num_seconds().max(0) as u64
    }

    /// Whole seconds past the freshness boundary, `0` while fresh.
    pub fn stale_age(&self) -> u64 {
        self.stale_age_at(Utc::now())
    }

    pub fn stale_age_at(&self, now: DateTime<Utc>) -> u64 {
        (now - self.stale_at).num_seconds().max(0) as u64
    }

    /// Seconds of freshness left, `0` once stale.
    pub fn remaining_freshness_at(&self, now: DateTime<Utc>) -> u64 {
        (self.stale_at - now).num_seconds().max(0) as u64
    }

    /// Whether the entry may replace an upstream failure.
    pub fn serve_stale_if_error(&self) -> bool {
        self.serve_stale_if_error_at(Utc::now())
    }

    pub fn serve_stale_if_error_at(&self, now: DateTime<Utc>) -> bool {
        self.stale_if_error_to.is_some_and(|to| now <= to)
    }

    /// Whether the entry may be served while a revalidation runs.
    pub fn stale_while_revalidate(&self) -> bool {
        self.stale_while_revalidate_at(Utc::now())
    }

    pub fn stale_while_revalidate_at(&self, now: DateTime<Utc>) -> bool {
        self.stale_while_revalidate_to.is_some_and(|to| now <= to)
    }

    pub fn has_validation_information(&self) -> bool {
        self.etag().is_some() || self.last_modified().is_some()
    }

    pub fn etag(&self) -> Option<&str> {
        self.response.headers.get(ETAG).and_then(|v| v.to_str().ok())
    }

    pub fn last_modified(&self) -> Option<&str> {
        self.response
            .headers
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
    }

    pub fn must_revalidate(&self) -> bool {
        Directives::from_headers(&self.response.headers, CACHE_CONTROL).has("must-revalidate")
    }

    /// Whether `request` presents the header values this entry varies on.
    pub fn vary_matches<B>(&self, request: &Request<B>) -> bool {
        self.vary.matches(request.headers())
    }

    /// Storage TTL in seconds.
    ///
    /// `0` means keep without expiry (the response has validators), a
    /// positive value is the time until the last window closes, and `-1`
    /// means the entry must not be stored.
    pub fn ttl(&self) -> i64 {
        self.ttl_at(Utc::now())
    }

    pub fn ttl_at(&self, now: DateTime<Utc>) -> i64 {
        if self.has_validation_information() {
            return 0;
        }

        let end = [
            Some(self.stale_at),
            self.stale_if_error_to,
            self.stale_while_revalidate_to,
        ]
        .into_iter()
        .flatten()
        .max()
        .unwrap_or(self.stale_at);

        let remaining_ms = (end - now).num_milliseconds();
        if remaining_ms > 0 {
            (remaining_ms + 999) / 1000
        } else {
            -1
        }
    }

    pub fn lifetime(&self) -> StoreLifetime {
        self.lifetime_at(Utc::now())
    }

    pub fn lifetime_at(&self, now: DateTime<Utc>) -> StoreLifetime {
        match self.ttl_at(now) {
            0 => StoreLifetime::Indefinite,
            ttl if ttl > 0 => StoreLifetime::For(Duration::from_secs(ttl as u64)),
            _ => StoreLifetime::Discard,
        }
    }
}

/// `time + secs`, saturating at the largest representable instant.
pub(crate) fn add_seconds(time: DateTime<Utc>, secs: u64) -> DateTime<Utc> {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|delta| time.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Serde adapters for the `http` types held by snapshots.
mod wire {
    pub mod method {
        use http::Method;
        use serde::{Deserialize, Deserializer, Serializer, de::Error};

        pub fn serialize<S: Serializer>(method: &Method, s: S) -> Result<S::Ok, S::Error> {
            s.serialize_str(method.as_str())
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Method, D::Error> {
            let raw = String::deserialize(d)?;
            Method::from_bytes(raw.as_bytes()).map_err(D::Error::custom)
        }
    }

    pub mod uri {
        use http::Uri;
        use serde::{Deserialize, Deserializer, Serializer, de::Error};

        pub fn serialize<S: Serializer>(uri: &Uri, s: S) -> Result<S::Ok, S::Error> {
            s.collect_str(uri)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Uri, D::Error> {
            let raw = String::deserialize(d)?;
            raw.parse::<Uri>().map_err(D::Error::custom)
        }
    }

    pub mod status {
        use http::StatusCode;
        use serde::{Deserialize, Deserializer, Serializer, de::Error};

        pub fn serialize<S: Serializer>(status: &StatusCode, s: S) -> Result<S::Ok, S::Error> {
            s.serialize_u16(status.as_u16())
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<StatusCode, D::Error> {
            let raw = u16::deserialize(d)?;
            StatusCode::from_u16(raw).map_err(D::Error::custom)
        }
    }

    /// Ordered `[name, value]` pairs; repeated headers stay separate.
    pub mod headers {
        use http::{HeaderMap, HeaderName, HeaderValue};
        use serde::{Deserialize, Deserializer, Serializer, de::Error, ser::SerializeSeq};

        pub fn serialize<S: Serializer>(headers: &HeaderMap, s: S) -> Result<S::Ok, S::Error> {
            let mut seq = s.serialize_seq(Some(headers.len()))?;
            for (name, value) in headers {
                let value = String::from_utf8_lossy(value.as_bytes());
                seq.serialize_element(&(name.as_str(), value.as_ref()))?;
            }
            seq.end()
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<HeaderMap, D::Error> {
            let pairs = Vec::<(String, String)>::deserialize(d)?;
            let mut headers = HeaderMap::with_capacity(pairs.len());
            for (name, value) in pairs {
                let name = HeaderName::from_bytes(name.as_bytes()).map_err(D::Error::custom)?;
                let value = HeaderValue::from_str(&value).map_err(D::Error::custom)?;
                headers.append(name, value);
            }
            Ok(headers)
        }
    }

    /// Bodies are base64 so binary payloads survive text formats.
    pub mod body {
        use base64::Engine;
        use base64::engine::general_purpose::STANDARD;
        use bytes::Bytes;
        use serde::{Deserialize, Deserializer, Serializer, de::Error};

        pub fn serialize<S: Serializer>(body: &Bytes, s: S) -> Result<S::Ok, S::Error> {
            s.serialize_str(&STANDARD.encode(body))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Bytes, D::Error> {
            let raw = String::deserialize(d)?;
            STANDARD
                .decode(raw.as_bytes())
                .map(Bytes::from)
                .map_err(D::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(headers: &[(&str, &str)]) -> Request<Bytes> {
        let mut builder = Request::get("https://api.example.com/resource");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Bytes::new()).unwrap()
    }

    fn response(headers: &[(&str, &str)], body: &'static [u8]) -> Response<Bytes> {
        let mut builder = Response::builder().status(200);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Bytes::from_static(body)).unwrap()
    }

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn secs(n: i64) -> TimeDelta {
        TimeDelta::seconds(n)
    }

    #[test]
    fn test_ttl_decreases_with_max_age() {
        let now = t0();
        let entry = CacheEntry::new_at(
            &request(&[]),
            &response(&[("cache-control", "max-age=10")], b"ok"),
            now + secs(10),
            now,
        );

        assert_eq!(entry.ttl_at(now), 10);
        assert_eq!(entry.ttl_at(now + secs(4)), 6);
        assert_eq!(entry.ttl_at(now + secs(10)), -1);
        assert_eq!(entry.lifetime_at(now), StoreLifetime::For(Duration::from_secs(10)));
        assert_eq!(entry.lifetime_at(now + secs(11)), StoreLifetime::Discard);
    }

    #[test]
    fn test_ttl_rounds_partial_seconds_up() {
        let now = t0();
        let entry = CacheEntry::new_at(
            &request(&[]),
            &response(&[], b""),
            now + TimeDelta::milliseconds(1500),
            now,
        );
        assert_eq!(entry.ttl_at(now), 2);
    }

    #[test]
    fn test_ttl_is_zero_with_validators() {
        let now = t0();
        let entry = CacheEntry::new_at(
            &request(&[]),
            &response(&[("etag", "\"v1\"")], b"ok"),
            now,
            now,
        );
        assert!(entry.has_validation_information());
        assert_eq!(entry.ttl_at(now + secs(3600)), 0);
        assert_eq!(entry.lifetime_at(now), StoreLifetime::Indefinite);
    }

    #[test]
    fn test_zero_freshness_without_validators_is_discarded() {
        let now = t0();
        let entry = CacheEntry::new_at(&request(&[]), &response(&[], b""), now, now);
        assert!(entry.is_stale_at(now));
        assert_eq!(entry.ttl_at(now), -1);
    }

    #[test]
    fn test_stale_if_error_window() {
        let now = t0();
        let entry = CacheEntry::new_at(
            &request(&[]),
            &response(&[("cache-control", "max-age=10, stale-if-error=30")], b"ok"),
            now + secs(10),
            now,
        );

        assert!(entry.is_fresh_at(now + secs(9)));
        assert!(entry.is_stale_at(now + secs(11)));
        assert!(entry.serve_stale_if_error_at(now + secs(11)));
        assert!(entry.serve_stale_if_error_at(now + secs(40)));
        assert!(!entry.serve_stale_if_error_at(now + secs(41)));
        assert_eq!(entry.ttl_at(now), 40);
    }

    #[test]
    fn test_must_revalidate_suppresses_stale_if_error_only() {
        let now = t0();
        let entry = CacheEntry::new_at(
            &request(&[]),
            &response(
                &[(
                    "cache-control",
                    "max-age=5, must-revalidate, stale-if-error=60, stale-while-revalidate=20",
                )],
                b"ok",
            ),
            now + secs(5),
            now,
        );

        assert!(entry.must_revalidate());
        assert_eq!(entry.stale_if_error_to(), None);
        assert!(!entry.serve_stale_if_error_at(now + secs(6)));
        assert!(entry.stale_while_revalidate_at(now + secs(25)));
        assert!(!entry.stale_while_revalidate_at(now + secs(26)));
    }

    #[test]
    fn test_age_and_stale_age() {
        let now = t0();
        let entry = CacheEntry::new_at(&request(&[]), &response(&[], b""), now + secs(5), now);
        assert_eq!(entry.age_at(now + secs(7)), 7);
        assert_eq!(entry.stale_age_at(now + secs(7)), 2);
        assert_eq!(entry.stale_age_at(now + secs(1)), 0);
        assert_eq!(entry.remaining_freshness_at(now + secs(1)), 4);
    }

    #[test]
    fn test_vary_fingerprint_matching() {
        let now = t0();
        let entry = CacheEntry::new_at(
            &request(&[("accept-language", "en"), ("user-agent", "a")]),
            &response(&[("vary", "Accept-Language, Accept-Encoding")], b""),
            now + secs(60),
            now,
        );

        let names: Vec<_> = entry.vary().names().collect();
        assert_eq!(names, vec!["accept-language", "accept-encoding"]);

        assert!(entry.vary_matches(&request(&[("Accept-Language", "en"), ("user-agent", "b")])));
        assert!(!entry.vary_matches(&request(&[("accept-language", "fr")])));
        assert!(!entry.vary_matches(&request(&[
            ("accept-language", "en"),
            ("accept-encoding", "gzip"),
        ])));
    }

    #[test]
    fn test_response_rebuild_shares_body() {
        let now = t0();
        let entry = CacheEntry::new_at(
            &request(&[]),
            &response(&[("content-type", "text/plain")], b"payload"),
            now,
            now,
        );
        let first = entry.response();
        let second = entry.response();
        assert_eq!(first.body(), second.body());
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers()["content-type"], "text/plain");
        assert_eq!(entry.request().uri(), "https://api.example.com/resource");
    }

    #[test]
    fn test_serde_round_trip() {
        let now = t0();
        let req = Request::post("https://api.example.com/search?q=1")
            .header("accept", "application/json")
            .body(Bytes::from_static(b"{\"q\":1}"))
            .unwrap();
        let resp = Response::builder()
            .status(203)
            .header("cache-control", "max-age=10, stale-while-revalidate=5")
            .header("set-cookie", "a=1")
            .header("set-cookie", "b=2")
            .body(Bytes::from(vec![0u8, 159, 146, 150, 255]))
            .unwrap();
        let entry = CacheEntry::new_at(&req, &resp, now + TimeDelta::milliseconds(10_250), now);

        let json = serde_json::to_string(&entry).unwrap();
        let back: CacheEntry = serde_json::from_str(&json).unwrap();

        assert_eq!(back, entry);
        assert_eq!(back.body(), entry.body());
        assert_eq!(back.request_snapshot().body, Bytes::from_static(b"{\"q\":1}"));
        assert_eq!(back.stale_at(), entry.stale_at());
        assert_eq!(back.created_at(), entry.created_at());
        assert_eq!(back.stale_while_revalidate_to(), entry.stale_while_revalidate_to());
        assert_eq!(back.response_headers().get_all("set-cookie").iter().count(), 2);
    }

    #[test]
    fn test_corrupt_document_fails_to_deserialize() {
        assert!(serde_json::from_str::<CacheEntry>("{\"request\":42}").is_err());
    }

    #[test]
    fn test_add_seconds_saturates() {
        assert_eq!(add_seconds(t0(), u64::MAX), DateTime::<Utc>::MAX_UTC);
        assert_eq!(add_seconds(t0(), 1), t0() + secs(1));
    }
}
