//! Redis-backed [`CacheStore`] (cargo feature `redis`).

use std::time::Duration;

use redis::{AsyncCommands, aio::MultiplexedConnection};

use super::store::{CacheStore, StoreError, StoreFuture};

/// A [`CacheStore`] over a multiplexed Redis connection.
///
/// Maps the four store operations onto `GET`, `SET`, `DEL` and `EXPIRE`.
/// The connection is cheap to clone, so each operation works on its own handle.
///
/// # Examples
///
/// ```rust,no_run
/// use outputcache::cache::{CacheOptions, OutputCache, RedisStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = RedisStore::connect("redis://127.0.0.1:6379").await?;
/// let cache = OutputCache::new(CacheOptions::new().store(store));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl RedisStore {
    /// Opens a multiplexed connection to the server at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the URL is invalid or the server
    /// cannot be reached.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(|e| StoreError::Connection {
            source: Box::new(e),
        })?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Connection {
                source: Box::new(e),
            })?;
        tracing::debug!("connected to redis cache store");
        Ok(Self { conn })
    }

    /// Wraps an already established connection.
    pub fn from_connection(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }
}

impl CacheStore for RedisStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            conn.get::<_, Option<Vec<u8>>>(key)
                .await
                .map_err(|e| StoreError::operation("get", e))
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: Vec<u8>) -> StoreFuture<'a, ()> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            conn.set::<_, _, ()>(key, value)
                .await
                .map_err(|e| StoreError::operation("set", e))
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            conn.del::<_, ()>(key)
                .await
                .map_err(|e| StoreError::operation("delete", e))
        })
    }

    fn expire<'a>(&'a self, key: &'a str, ttl: Duration) -> StoreFuture<'a, ()> {
        let mut conn = self.conn.clone();
        let seconds = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        Box::pin(async move {
            conn.expire::<_, ()>(key, seconds)
                .await
                .map_err(|e| StoreError::operation("expire", e))
        })
    }
}
