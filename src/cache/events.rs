//! Diagnostic signals emitted by the output cache.
//!
//! Every signal is logged through `tracing` and handed to each
//! [`CacheObserver`] registered on the [`CacheOptions`](super::CacheOptions).
//! Observers only watch; they cannot change what the cache does.

use std::{fmt, sync::Arc};

use tracing::{debug, error, warn};

use crate::{Method, StatusCode};

/// Something the cache did, or failed to do, for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// The skip predicate bypassed caching for this request.
    Skip { method: Method, path: String },
    /// A valid entry was replayed.
    Hit { key: String },
    /// No usable entry; the handler runs and its response is captured.
    Miss { key: String },
    /// An entry was written and given its TTL.
    Save { key: String, status: StatusCode },
    /// A corrupted entry is being removed.
    Delete { key: String },
    Warning { message: String },
    /// A store operation failed.
    CacheError { key: String, message: String },
}

impl CacheEvent {
    /// Short name of the signal, e.g. `"hit"` or `"cacheError"`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Skip { .. } => "skip",
            Self::Hit { .. } => "hit",
            Self::Miss { .. } => "miss",
            Self::Save { .. } => "save",
            Self::Delete { .. } => "delete",
            Self::Warning { .. } => "warning",
            Self::CacheError { .. } => "cacheError",
        }
    }
}

/// Receives every [`CacheEvent`].
///
/// Closures taking `&CacheEvent` are observers:
///
/// ```
/// use outputcache::cache::{CacheEvent, CacheOptions};
///
/// let options = CacheOptions::new().observe(|event: &CacheEvent| {
///     if let CacheEvent::Hit { key } = event {
///         println!("served {key} from cache");
///     }
/// });
/// ```
pub trait CacheObserver: Send + Sync {
    fn on_event(&self, event: &CacheEvent);
}

impl<F> CacheObserver for F
where
    F: Fn(&CacheEvent) + Send + Sync,
{
    fn on_event(&self, event: &CacheEvent) {
        self(event)
    }
}

/// Fans events out to the log and to registered observers.
#[derive(Clone, Default)]
pub(crate) struct Diagnostics {
    observers: Vec<Arc<dyn CacheObserver>>,
}

impl Diagnostics {
    pub(crate) fn new(observers: Vec<Arc<dyn CacheObserver>>) -> Self {
        Self { observers }
    }

    pub(crate) fn emit(&self, event: CacheEvent) {
        match &event {
            CacheEvent::Skip { method, path } => {
                debug!(method = %method, path = %path, "output cache skipped")
            }
            CacheEvent::Hit { key } => debug!(key = %key, "output cache hit"),
            CacheEvent::Miss { key } => debug!(key = %key, "output cache miss"),
            CacheEvent::Save { key, status } => {
                debug!(key = %key, status = status.as_u16(), "output cache entry saved")
            }
            CacheEvent::Delete { key } => warn!(key = %key, "deleting corrupted cache entry"),
            CacheEvent::Warning { message } => warn!(message = %message, "output cache warning"),
            CacheEvent::CacheError { key, message } => {
                error!(key = %key, error = %message, "output cache store error")
            }
        }

        for observer in &self.observers {
            observer.on_event(&event);
        }
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("observers", &self.observers.len())
            .finish()
    }
}
