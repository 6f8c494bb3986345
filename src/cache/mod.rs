//! Output caching for the middleware pipeline.
//!
//! [`OutputCache`] sits in a [`Pipeline`](crate::middleware::Pipeline) in
//! front of an endpoint. For each request it either replays a stored response
//! or runs the endpoint, captures the response on its way out and stores it
//! for a configurable TTL.
//!
//! ## Pieces
//!
//! - [`CachePolicy`]: skip predicate and key derivation.
//! - [`CapturingWriter`]: records headers, body and status while forwarding them.
//! - [`CacheEntry`]: the stored snapshot and its JSON form.
//! - [`CacheStore`]: the `get`/`set`/`delete`/`expire` backend, with
//!   [`MemoryStore`] built in and `RedisStore` behind the `redis` feature.
//! - [`CacheEvent`] / [`CacheObserver`]: diagnostic signals.
//!
//! Only responses with a status below 400 and a non-empty body are stored.
//! A store that fails on read sends the request down the pipeline's error
//! path; a stored entry that no longer decodes is deleted and the request is
//! served fresh.

mod capture;
mod config;
mod entry;
mod error;
mod events;
mod memory;
mod middleware;
mod policy;
#[cfg(feature = "redis")]
mod redis;
mod store;

pub use capture::CapturingWriter;
pub use config::{CacheOptions, CacheSettings, DEFAULT_PREFIX, DEFAULT_TTL};
pub use entry::{CacheEntry, CachedHeaders, EntryError};
pub use error::CacheError;
pub use events::{CacheEvent, CacheObserver};
pub use memory::MemoryStore;
pub use middleware::OutputCache;
pub use policy::{CacheKeyFn, CachePolicy, SkipFn, skip_constant};
#[cfg(feature = "redis")]
pub use redis::RedisStore;
pub use store::{CacheStore, StoreError, StoreFuture};
