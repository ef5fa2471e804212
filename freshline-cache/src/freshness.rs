//! Request-side freshness constraints.
//!
//! Clients narrow what a cache may serve with request `Cache-Control`
//! directives. `Pragma: no-cache` is honoured only when the request carries
//! no `Cache-Control` header at all.

use crate::directives::Directives;
use crate::entry::CacheEntry;
use chrono::{DateTime, Utc};
use http::HeaderMap;
use http::header::{CACHE_CONTROL, PRAGMA};

/// Staleness a request is willing to accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxStale {
    /// Bare `max-stale`: any staleness.
    Any,
    /// `max-stale=N`.
    Seconds(u64),
}

/// Parsed request `Cache-Control` (with `Pragma` fallback).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestCacheControl {
    pub no_cache: bool,
    pub no_store: bool,
    pub max_age: Option<u64>,
    pub max_stale: Option<MaxStale>,
    pub min_fresh: Option<u64>,
    pub only_if_cached: bool,
}

impl RequestCacheControl {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        if !headers.contains_key(CACHE_CONTROL) {
            let pragma = Directives::from_headers(headers, PRAGMA);
            return Self {
                no_cache: pragma.has("no-cache"),
                ..Self::default()
            };
        }

        let cc = Directives::from_headers(headers, CACHE_CONTROL);
        let max_stale = if cc.has("max-stale") {
            match cc.get("max-stale") {
                Some("") => Some(MaxStale::Any),
                _ => cc.seconds("max-stale").map(MaxStale::Seconds),
            }
        } else {
            None
        };

        Self {
            no_cache: cc.has("no-cache"),
            no_store: cc.has("no-store"),
            max_age: cc.seconds("max-age"),
            max_stale,
            min_fresh: cc.seconds("min-fresh"),
            only_if_cached: cc.has("only-if-cached"),
        }
    }

    /// Whether the stored entry is too old for `max-age`.
    pub fn exceeds_max_age(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        self.max_age.is_some_and(|max_age| entry.age_at(now) > max_age)
    }

    /// Whether `entry` may be served without contacting the origin.
    ///
    /// A fresh entry must still be fresh `min-fresh` seconds from now. A
    /// stale entry is acceptable only within `max-stale`, and never when the
    /// stored response demands `must-revalidate`.
    pub fn accepts(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        if self.exceeds_max_age(entry, now) {
            return false;
        }

        if entry.is_fresh_at(now) {
            return self
                .min_fresh
                .is_none_or(|min_fresh| entry.remaining_freshness_at(now) >= min_fresh);
        }

        match self.max_stale {
            None => false,
            Some(_) if entry.must_revalidate() => false,
            Some(MaxStale::Any) => true,
            Some(MaxStale::Seconds(limit)) => entry.stale_age_at(now) <= limit,
        }
    }
}
