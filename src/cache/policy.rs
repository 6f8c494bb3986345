//! Cache decision policy: which requests take part in caching, and under
//! which key.

use std::{fmt, sync::Arc};

use crate::Request;

/// Derives the cache key for a request.
pub type CacheKeyFn = Arc<dyn Fn(&Request) -> String + Send + Sync + 'static>;

/// Decides per request whether caching is bypassed entirely.
pub type SkipFn = Arc<dyn Fn(&Request) -> bool + Send + Sync + 'static>;

/// A skip predicate that ignores the request and answers `flag`.
pub fn skip_constant(flag: bool) -> SkipFn {
    Arc::new(move |_: &Request| flag)
}

/// Key derivation plus the skip predicate.
///
/// Both functions must be pure: the same request always yields the same key
/// and the same decision. The key is computed once per request and used for
/// the read and the write alike.
///
/// # Examples
///
/// ```
/// use outputcache::{Request, cache::CachePolicy};
///
/// let policy = CachePolicy::new("outputcache");
/// let (request, _) = Request::parse(b"GET /widgets?page=2 HTTP/1.1\r\nHost: a\r\n\r\n").unwrap();
///
/// assert!(!policy.should_skip(&request));
/// assert_eq!(policy.cache_key(&request), "outputcache/widgets?page=2");
/// ```
#[derive(Clone)]
pub struct CachePolicy {
    prefix: String,
    key_fn: Option<CacheKeyFn>,
    skip: SkipFn,
}

impl CachePolicy {
    /// A policy that never skips and keys requests as `prefix + full path`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            key_fn: None,
            skip: skip_constant(false),
        }
    }

    /// Replaces the default key derivation. The prefix is not applied to
    /// custom keys.
    #[must_use]
    pub fn with_key_fn(mut self, key_fn: CacheKeyFn) -> Self {
        self.key_fn = Some(key_fn);
        self
    }

    #[must_use]
    pub fn with_skip(mut self, skip: SkipFn) -> Self {
        self.skip = skip;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns `true` when the request must bypass caching: no store access,
    /// no capture.
    pub fn should_skip(&self, request: &Request) -> bool {
        (self.skip)(request)
    }

    pub fn cache_key(&self, request: &Request) -> String {
        match &self.key_fn {
            Some(key_fn) => key_fn(request),
            None => format!("{}{}", self.prefix, request.full_path()),
        }
    }
}

impl fmt::Debug for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachePolicy")
            .field("prefix", &self.prefix)
            .field("custom_key", &self.key_fn.is_some())
            .finish_non_exhaustive()
    }
}
