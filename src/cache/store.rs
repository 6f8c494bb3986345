//! The key/value store the output cache reads from and writes to.

use std::{future::Future, pin::Pin, time::Duration};

use thiserror::Error;

use crate::middleware::BoxError;

/// Errors reported by a [`CacheStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to connect to cache store: {source}")]
    Connection {
        #[source]
        source: BoxError,
    },

    #[error("cache store `{op}` failed: {source}")]
    Operation {
        op: &'static str,
        #[source]
        source: BoxError,
    },
}

impl StoreError {
    /// Wraps a backend error raised by the operation named `op`.
    pub fn operation(op: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Operation {
            op,
            source: source.into(),
        }
    }
}

/// Boxed future returned by every [`CacheStore`] operation.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// A key/value store with per-key expiry.
///
/// The output cache needs exactly four operations. Implementations are shared
/// across requests behind an `Arc`, so they must be `Send + Sync`.
///
/// # Contract
///
/// - `get` returns `Ok(None)` for absent and expired keys.
/// - `set` stores the value with no expiry, dropping any earlier deadline.
/// - `delete` on an absent key succeeds.
/// - `expire` gives an existing key a deadline `ttl` from now; on an absent
///   key it does nothing.
pub trait CacheStore: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Vec<u8>>>;

    fn set<'a>(&'a self, key: &'a str, value: Vec<u8>) -> StoreFuture<'a, ()>;

    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;

    fn expire<'a>(&'a self, key: &'a str, ttl: Duration) -> StoreFuture<'a, ()>;
}
