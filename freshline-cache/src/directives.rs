//! Structured header value parsing.
//!
//! `Cache-Control`, `Pragma` and `Vary` all share the same shape: a list of
//! comma separated tokens, each either bare (`no-store`) or assigned
//! (`max-age=60`, `ext="a, b"`). A header may also appear more than once.
//! [`Directives`] folds all of that into one ordered, case-sensitive map.
//!
//! ```
//! use freshline_cache::Directives;
//!
//! let cc = Directives::parse(["max-age=60, private", "community=\"UCI\""]);
//! assert_eq!(cc.seconds("max-age"), Some(60));
//! assert!(cc.has("private"));
//! assert_eq!(cc.get("community"), Some("UCI"));
//! assert_eq!(cc.get_or("s-maxage", "none"), "none");
//! ```

use http::HeaderMap;
use http::header::AsHeaderName;
use tracing::trace;

/// The value stored for a directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveValue {
    /// Bare token without `=`.
    Present,
    /// `name=value`, already unquoted. May be empty.
    Value(String),
}

impl DirectiveValue {
    /// String view. Bare tokens read as the empty string.
    pub fn as_str(&self) -> &str {
        match self {
            DirectiveValue::Present => "",
            DirectiveValue::Value(v) => v.as_str(),
        }
    }
}

/// Ordered directive set parsed from one or more header values.
///
/// Lookups are case-sensitive on the directive name as written by the
/// producer. Duplicates overwrite earlier values but keep their first position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directives {
    entries: Vec<(String, DirectiveValue)>,
}

impl Directives {
    /// Create an empty directive set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse raw header values, left to right.
    pub fn parse<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut directives = Self::new();
        for value in values {
            for token in split_top_level(value.as_ref()) {
                directives.insert_token(token);
            }
        }
        trace!(count = directives.len(), "Parsed header directives");
        directives
    }

    /// Parse every instance of `name` in `headers`.
    ///
    /// Values that are not visible ASCII are skipped.
    pub fn from_headers<K: AsHeaderName>(headers: &HeaderMap, name: K) -> Self {
        Self::parse(headers.get_all(name).iter().filter_map(|v| v.to_str().ok()))
    }

    /// Insert or overwrite a directive.
    pub fn insert(&mut self, name: impl Into<String>, value: DirectiveValue) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Whether `name` was stored, regardless of its value.
    pub fn has(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Stored value of `name`. Bare tokens read as `""`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Stored value of `name` or `default`.
    pub fn get_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.get(name).unwrap_or(default)
    }

    /// The raw [`DirectiveValue`] for `name`.
    pub fn value(&self, name: &str) -> Option<&DirectiveValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Value of `name` as a number of seconds.
    ///
    /// Malformed or negative values read as absent.
    pub fn seconds(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(|v| v.trim().parse::<u64>().ok())
    }

    /// Directive names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DirectiveValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn insert_token(&mut self, token: &str) {
        let token = token.trim();
        if token.is_empty() {
            return;
        }
        match token.split_once('=') {
            Some((name, value)) => {
                let name = name.trim();
                if name.is_empty() {
                    return;
                }
                self.insert(name, DirectiveValue::Value(unquote(value.trim())));
            }
            None => self.insert(token, DirectiveValue::Present),
        }
    }
}

/// Split on commas that are not inside a quoted string.
fn split_top_level(value: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in value.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                tokens.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    tokens.push(&value[start..]);
    tokens
}

fn unquote(value: &str) -> String {
    let Some(inner) = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
    else {
        return value.to_string();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}
