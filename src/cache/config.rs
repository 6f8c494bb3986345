//! Construction-time configuration for [`OutputCache`](super::OutputCache).

use std::{fmt, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

use crate::Request;

use super::{
    events::CacheObserver,
    policy::{CacheKeyFn, SkipFn, skip_constant},
    store::CacheStore,
};

/// Key prefix used unless configured otherwise.
pub const DEFAULT_PREFIX: &str = "outputcache";

/// Entry lifetime used unless configured otherwise.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Builder for an [`OutputCache`](super::OutputCache).
///
/// | Setting      | Default                                   |
/// |--------------|-------------------------------------------|
/// | `prefix`     | `"outputcache"` (also used for an empty prefix) |
/// | `ttl`        | 60 seconds                                |
/// | `cache_key`  | `prefix + path + ?query`                  |
/// | skip         | never                                     |
/// | `store`      | in-memory store, with a warning           |
/// | observers    | none (events are still logged)            |
///
/// A bare number of seconds converts into options with that TTL:
///
/// ```
/// use std::time::Duration;
/// use outputcache::cache::CacheOptions;
///
/// let options = CacheOptions::from(120_u64);
/// assert_eq!(options.ttl_value(), Duration::from_secs(120));
/// ```
pub struct CacheOptions {
    pub(crate) prefix: String,
    pub(crate) ttl: Duration,
    pub(crate) cache_key: Option<CacheKeyFn>,
    pub(crate) skip: SkipFn,
    pub(crate) store: Option<Arc<dyn CacheStore>>,
    pub(crate) observers: Vec<Arc<dyn CacheObserver>>,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheOptions {
    pub fn new() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_owned(),
            ttl: DEFAULT_TTL,
            cache_key: None,
            skip: skip_constant(false),
            store: None,
            observers: Vec::new(),
        }
    }

    /// Prefix prepended to the request target by the default key function.
    /// An empty prefix means [`DEFAULT_PREFIX`].
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.prefix = if prefix.is_empty() {
            DEFAULT_PREFIX.to_owned()
        } else {
            prefix
        };
        self
    }

    /// Lifetime of stored entries, truncated to whole seconds. A TTL under
    /// one second falls back to [`DEFAULT_TTL`].
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = match ttl.as_secs() {
            0 => DEFAULT_TTL,
            secs => Duration::from_secs(secs),
        };
        self
    }

    pub fn ttl_value(&self) -> Duration {
        self.ttl
    }

    /// Replaces the default key function.
    #[must_use]
    pub fn cache_key<F>(mut self, key_fn: F) -> Self
    where
        F: Fn(&Request) -> String + Send + Sync + 'static,
    {
        self.cache_key = Some(Arc::new(key_fn));
        self
    }

    /// Bypass caching for every request (`true`) or for none (`false`).
    #[must_use]
    pub fn skip_cache(mut self, skip: bool) -> Self {
        self.skip = skip_constant(skip);
        self
    }

    /// Bypass caching for requests matching `predicate`.
    #[must_use]
    pub fn skip_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        self.skip = Arc::new(predicate);
        self
    }

    #[must_use]
    pub fn store<S>(mut self, store: S) -> Self
    where
        S: CacheStore + 'static,
    {
        self.store = Some(Arc::new(store));
        self
    }

    /// Uses a store that is also held elsewhere.
    #[must_use]
    pub fn shared_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Registers an observer for [`CacheEvent`](super::CacheEvent)s.
    #[must_use]
    pub fn observe<O>(mut self, observer: O) -> Self
    where
        O: CacheObserver + 'static,
    {
        self.observers.push(Arc::new(observer));
        self
    }
}

impl From<u64> for CacheOptions {
    fn from(ttl_secs: u64) -> Self {
        Self::new().ttl(Duration::from_secs(ttl_secs))
    }
}

impl fmt::Debug for CacheOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheOptions")
            .field("prefix", &self.prefix)
            .field("ttl", &self.ttl)
            .field("custom_key", &self.cache_key.is_some())
            .field("store", &self.store.is_some())
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

/// The serializable subset of [`CacheOptions`], for loading from config files.
///
/// Missing fields take their defaults:
///
/// ```
/// use outputcache::cache::CacheSettings;
///
/// let settings = CacheSettings::from_json(r#"{ "ttl": 300 }"#).unwrap();
/// assert_eq!(settings.prefix, "outputcache");
/// assert_eq!(settings.ttl, 300);
/// assert!(!settings.skip_cache);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheSettings {
    pub prefix: String,
    /// Seconds; `0` means the default.
    pub ttl: u64,
    pub skip_cache: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_owned(),
            ttl: DEFAULT_TTL.as_secs(),
            skip_cache: false,
        }
    }
}

impl CacheSettings {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl From<CacheSettings> for CacheOptions {
    fn from(settings: CacheSettings) -> Self {
        CacheOptions::new()
            .prefix(settings.prefix)
            .ttl(Duration::from_secs(settings.ttl))
            .skip_cache(settings.skip_cache)
    }
}
