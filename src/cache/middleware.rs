//! The `OutputCache` middleware.
//!
//! Per request: ask the policy whether to skip, derive the key, look it up,
//! then either replay the stored entry or run the rest of the chain and
//! capture what it produced. Captured entries are written on a spawned task
//! after the response is complete, so the caller never waits on the store.

use std::{fmt, future::Future, pin::Pin, sync::Arc, time::Duration};

use crate::{
    Response, StatusCode,
    context::Context,
    middleware::{Middleware, Next},
};

use super::{
    capture::CapturingWriter,
    config::CacheOptions,
    entry::CacheEntry,
    error::CacheError,
    events::{CacheEvent, Diagnostics},
    memory::MemoryStore,
    policy::CachePolicy,
    store::CacheStore,
};

/// Caches successful responses in a [`CacheStore`] and replays them.
///
/// # Examples
///
/// ```rust
/// use outputcache::{Request, Response, StatusCode, context::Context, middleware::Pipeline};
/// use outputcache::cache::{CacheOptions, MemoryStore, OutputCache};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let pipeline = Pipeline::new()
///     .layer(OutputCache::new(CacheOptions::new().store(MemoryStore::new())))
///     .endpoint(|_ctx: Context| async {
///         Response::new(StatusCode::Ok).body(r#"{"items":[]}"#)
///     });
///
/// let (request, _) = Request::parse(b"GET /widgets HTTP/1.1\r\nHost: a\r\n\r\n").unwrap();
/// let response = pipeline.handle(request).await;
/// assert_eq!(response.payload(), br#"{"items":[]}"#);
/// # }
/// ```
#[derive(Clone)]
pub struct OutputCache {
    shared: Arc<Shared>,
}

struct Shared {
    policy: CachePolicy,
    ttl: Duration,
    store: Arc<dyn CacheStore>,
    diagnostics: Diagnostics,
}

impl OutputCache {
    /// Builds the middleware. Accepts [`CacheOptions`] or a bare TTL in seconds.
    ///
    /// Without a configured store an in-memory one is used and a `warning`
    /// event is emitted.
    pub fn new(options: impl Into<CacheOptions>) -> Self {
        let options = options.into();
        let diagnostics = Diagnostics::new(options.observers);

        let store = match options.store {
            Some(store) => store,
            None => {
                diagnostics.emit(CacheEvent::Warning {
                    message: "no cache store configured, falling back to in-memory store".into(),
                });
                Arc::new(MemoryStore::new()) as Arc<dyn CacheStore>
            }
        };

        let mut policy = CachePolicy::new(options.prefix).with_skip(options.skip);
        if let Some(key_fn) = options.cache_key {
            policy = policy.with_key_fn(key_fn);
        }

        Self {
            shared: Arc::new(Shared {
                policy,
                ttl: options.ttl,
                store,
                diagnostics,
            }),
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.shared.policy
    }

    pub fn ttl(&self) -> Duration {
        self.shared.ttl
    }
}

impl fmt::Debug for OutputCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputCache")
            .field("policy", &self.shared.policy)
            .field("ttl", &self.shared.ttl)
            .field("diagnostics", &self.shared.diagnostics)
            .finish_non_exhaustive()
    }
}

impl Middleware for OutputCache {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin(serve(Arc::clone(&self.shared), ctx, next))
    }
}

impl Shared {
    fn report(&self, error: &CacheError) {
        self.diagnostics.emit(CacheEvent::CacheError {
            key: error.key().to_owned(),
            message: error.to_string(),
        });
    }
}

async fn serve(shared: Arc<Shared>, ctx: Context, next: Next) -> Response {
    let request = ctx.request();
    if shared.policy.should_skip(request) {
        shared.diagnostics.emit(CacheEvent::Skip {
            method: request.method().clone(),
            path: request.full_path(),
        });
        return next.run(ctx).await;
    }

    let key = shared.policy.cache_key(request);
    // Connection handling follows the client; it is not part of the entry.
    let keep_alive = request.is_keep_alive();

    match shared.store.get(&key).await {
        Err(source) => {
            let error = CacheError::Read { key, source };
            shared.report(&error);
            return next.fail(ctx, Box::new(error)).await;
        }
        Ok(Some(bytes)) => match CacheEntry::decode(&bytes) {
            Ok(entry) => {
                shared.diagnostics.emit(CacheEvent::Hit { key });
                return entry.into_response().keep_alive(keep_alive);
            }
            Err(err) => discard_corrupted(&shared, &key, &err.to_string()).await,
        },
        Ok(None) => {}
    }

    shared.diagnostics.emit(CacheEvent::Miss { key: key.clone() });
    let response = next.run(ctx).await;

    let mut outbound =
        Response::new(StatusCode::Ok).keep_alive(keep_alive && response.is_keep_alive());
    let mut capture = CapturingWriter::new(&mut outbound);
    response.write_to(&mut capture);

    if let Some(entry) = capture.into_entry() {
        tokio::spawn(persist(Arc::clone(&shared), key, entry));
    }
    outbound
}

// The entry is unusable; remove it so the next request repopulates the key.
async fn discard_corrupted(shared: &Shared, key: &str, reason: &str) {
    shared.diagnostics.emit(CacheEvent::Warning {
        message: format!("corrupted cache entry `{key}`: {reason}"),
    });
    shared.diagnostics.emit(CacheEvent::Delete {
        key: key.to_owned(),
    });
    if let Err(source) = shared.store.delete(key).await {
        shared.report(&CacheError::Delete {
            key: key.to_owned(),
            source,
        });
    }
}

async fn persist(shared: Arc<Shared>, key: String, entry: CacheEntry) {
    let status = entry.status_code;
    match write_entry(&shared, &key, &entry).await {
        Ok(()) => shared.diagnostics.emit(CacheEvent::Save { key, status }),
        Err(error) => shared.report(&error),
    }
}

async fn write_entry(shared: &Shared, key: &str, entry: &CacheEntry) -> Result<(), CacheError> {
    let bytes = entry.encode().map_err(|source| CacheError::Encode {
        key: key.to_owned(),
        source,
    })?;
    shared
        .store
        .set(key, bytes)
        .await
        .map_err(|source| CacheError::Write {
            key: key.to_owned(),
            source,
        })?;
    shared
        .store
        .expire(key, shared.ttl)
        .await
        .map_err(|source| CacheError::Expire {
            key: key.to_owned(),
            source,
        })
}
