use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use outputcache::{
    CacheOptions, OutputCache, Request, Response, StatusCode,
    cache::{CacheEntry, CacheEvent, CacheStore, MemoryStore, StoreError, StoreFuture},
    context::Context,
    middleware::Pipeline,
};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Op {
    Get(String),
    Set(String),
    Delete(String),
    Expire(String, Duration),
}

/// A memory store that logs every call and can be told to fail or stall.
#[derive(Default)]
struct RecordingStore {
    inner: MemoryStore,
    ops: Mutex<Vec<Op>>,
    fail_get: AtomicBool,
    fail_set: AtomicBool,
    stall_set: AtomicBool,
}

impl RecordingStore {
    fn ops(&self) -> Vec<Op> {
        self.ops.lock().unwrap().clone()
    }

    fn record(&self, op: Op) {
        self.ops.lock().unwrap().push(op);
    }
}

impl CacheStore for RecordingStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Vec<u8>>> {
        self.record(Op::Get(key.to_owned()));
        if self.fail_get.load(Ordering::SeqCst) {
            return Box::pin(async { Err(StoreError::operation("get", "connection refused")) });
        }
        self.inner.get(key)
    }

    fn set<'a>(&'a self, key: &'a str, value: Vec<u8>) -> StoreFuture<'a, ()> {
        self.record(Op::Set(key.to_owned()));
        if self.fail_set.load(Ordering::SeqCst) {
            return Box::pin(async { Err(StoreError::operation("set", "out of memory")) });
        }
        if self.stall_set.load(Ordering::SeqCst) {
            return Box::pin(std::future::pending());
        }
        self.inner.set(key, value)
    }

    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        self.record(Op::Delete(key.to_owned()));
        self.inner.delete(key)
    }

    fn expire<'a>(&'a self, key: &'a str, ttl: Duration) -> StoreFuture<'a, ()> {
        self.record(Op::Expire(key.to_owned(), ttl));
        self.inner.expire(key, ttl)
    }
}

struct Harness {
    pipeline: Pipeline,
    store: Arc<RecordingStore>,
    events: UnboundedReceiver<CacheEvent>,
    calls: Arc<AtomicUsize>,
}

impl Harness {
    /// `respond` builds the endpoint's response from the call number (1-based).
    fn new<F>(options: CacheOptions, respond: F) -> Self
    where
        F: Fn(usize) -> Response + Send + Sync + 'static,
    {
        let store = Arc::new(RecordingStore::default());
        let (tx, events) = unbounded_channel();
        let options = options
            .shared_store(store.clone())
            .observe(move |event: &CacheEvent| {
                let _ = tx.send(event.clone());
            });

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let pipeline = Pipeline::new()
            .layer(OutputCache::new(options))
            .endpoint(move |_ctx: Context| {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                let response = respond(n);
                async move { response }
            });

        Self {
            pipeline,
            store,
            events,
            calls,
        }
    }

    async fn get(&self, target: &str) -> Response {
        self.send(&format!("GET {target} HTTP/1.1\r\nHost: localhost\r\n\r\n"))
            .await
    }

    async fn send(&self, raw: &str) -> Response {
        let (request, _) = Request::parse(raw.as_bytes()).unwrap();
        self.pipeline.handle(request).await
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Waits for the next event whose name is `name`, returning the names seen
    /// on the way, `name` included.
    async fn events_until(&mut self, name: &str) -> Vec<&'static str> {
        let mut seen = Vec::new();
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), self.events.recv())
                .await
                .expect("timed out waiting for cache event")
                .expect("event channel closed");
            seen.push(event.name());
            if event.name() == name {
                return seen;
            }
        }
    }

    fn drain_events(&mut self) -> Vec<&'static str> {
        let mut seen = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            seen.push(event.name());
        }
        seen
    }
}

fn widgets(n: usize) -> Response {
    Response::new(StatusCode::Ok)
        .header("Content-Type", "application/json")
        .header("X-Render", n.to_string())
        .body(r#"{"items":[]}"#)
}

#[tokio::test]
async fn miss_stores_then_hit_replays() {
    let mut h = Harness::new(CacheOptions::new(), widgets);

    let first = h.get("/widgets?page=2").await;
    assert_eq!(first.status(), StatusCode::Ok);
    assert_eq!(first.payload(), br#"{"items":[]}"#);
    assert_eq!(h.events_until("save").await, ["miss", "save"]);

    let key = "outputcache/widgets?page=2".to_owned();
    assert_eq!(
        h.store.ops(),
        [
            Op::Get(key.clone()),
            Op::Set(key.clone()),
            Op::Expire(key.clone(), Duration::from_secs(60)),
        ]
    );

    let second = h.get("/widgets?page=2").await;
    assert_eq!(h.events_until("hit").await, ["hit"]);
    assert_eq!(h.calls(), 1);
    assert_eq!(second.headers().get("x-render"), Some("1"));
    assert_eq!(second.into_bytes(), first.into_bytes());
}

#[tokio::test]
async fn stored_entry_has_documented_shape() {
    let mut h = Harness::new(CacheOptions::new(), widgets);
    h.get("/widgets").await;
    h.events_until("save").await;

    let bytes = h.store.get("outputcache/widgets").await.unwrap().unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["statusCode"], 200);
    assert_eq!(json["headers"]["Content-Type"], "application/json");
    assert_eq!(json["body"], r#"{"items":[]}"#);
}

#[tokio::test]
async fn not_found_is_never_stored() {
    let mut h = Harness::new(CacheOptions::new(), |_| {
        Response::new(StatusCode::NotFound).body("no such widget")
    });

    let first = h.get("/widgets/9").await;
    assert_eq!(first.status(), StatusCode::NotFound);
    assert_eq!(first.payload(), b"no such widget");

    let second = h.get("/widgets/9").await;
    assert_eq!(second.status(), StatusCode::NotFound);
    assert_eq!(h.calls(), 2);

    tokio::task::yield_now().await;
    assert!(h.store.ops().iter().all(|op| matches!(op, Op::Get(_))));
    assert_eq!(h.drain_events(), ["miss", "miss"]);
}

#[tokio::test]
async fn server_errors_are_never_stored() {
    let h = Harness::new(CacheOptions::new(), |_| {
        Response::new(StatusCode::ServiceUnavailable).body("busy")
    });
    h.get("/a").await;
    h.get("/a").await;
    tokio::task::yield_now().await;
    assert_eq!(h.calls(), 2);
    assert!(!h.store.ops().iter().any(|op| matches!(op, Op::Set(_))));
}

#[tokio::test]
async fn empty_body_is_not_stored() {
    let h = Harness::new(CacheOptions::new(), |_| Response::new(StatusCode::NoContent));
    let response = h.get("/ping").await;
    assert_eq!(response.status(), StatusCode::NoContent);
    h.get("/ping").await;
    tokio::task::yield_now().await;
    assert_eq!(h.calls(), 2);
    assert!(!h.store.ops().iter().any(|op| matches!(op, Op::Set(_))));
}

#[tokio::test]
async fn corrupted_entry_is_deleted_and_served_fresh() {
    let mut h = Harness::new(CacheOptions::new(), widgets);
    let key = "outputcache/widgets";
    h.store.inner.set(key, b"{\"statusCode\":".to_vec()).await.unwrap();

    let response = h.get("/widgets").await;
    assert_eq!(response.status(), StatusCode::Ok);
    assert_eq!(response.headers().get("x-render"), Some("1"));
    assert_eq!(
        h.events_until("save").await,
        ["warning", "delete", "miss", "save"]
    );

    let ops = h.store.ops();
    assert_eq!(ops[0], Op::Get(key.into()));
    assert_eq!(ops[1], Op::Delete(key.into()));
    assert_eq!(ops[2], Op::Set(key.into()));

    let healed = h.store.inner.get(key).await.unwrap().unwrap();
    assert!(CacheEntry::decode(&healed).is_ok());

    h.get("/widgets").await;
    assert_eq!(h.events_until("hit").await, ["hit"]);
    assert_eq!(h.calls(), 1);
}

#[tokio::test]
async fn entry_with_unknown_status_is_treated_as_corrupt() {
    let mut h = Harness::new(CacheOptions::new(), widgets);
    h.store
        .inner
        .set(
            "outputcache/w",
            br#"{"statusCode":299,"headers":{},"body":"x"}"#.to_vec(),
        )
        .await
        .unwrap();

    let response = h.get("/w").await;
    assert_eq!(response.payload(), br#"{"items":[]}"#);
    assert_eq!(h.events_until("delete").await, ["warning", "delete"]);
}

#[tokio::test]
async fn skip_cache_bypasses_the_store() {
    let mut h = Harness::new(CacheOptions::new().skip_cache(true), widgets);
    h.get("/widgets").await;
    h.get("/widgets").await;
    tokio::task::yield_now().await;

    assert_eq!(h.calls(), 2);
    assert!(h.store.ops().is_empty());
    assert_eq!(h.drain_events(), ["skip", "skip"]);
}

#[tokio::test]
async fn skip_predicate_is_evaluated_per_request() {
    let mut h = Harness::new(
        CacheOptions::new().skip_when(|req: &Request| req.path().starts_with("/admin")),
        widgets,
    );

    h.get("/admin/stats").await;
    assert_eq!(h.drain_events(), ["skip"]);
    assert!(h.store.ops().is_empty());

    h.get("/widgets").await;
    assert_eq!(h.events_until("save").await, ["miss", "save"]);
}

#[tokio::test]
async fn store_read_failure_takes_the_error_path() {
    let mut h = Harness::new(CacheOptions::new(), widgets);
    h.store.fail_get.store(true, Ordering::SeqCst);

    let response = h.get("/widgets").await;
    assert_eq!(response.status(), StatusCode::InternalServerError);
    assert_eq!(h.calls(), 0);
    assert_eq!(h.drain_events(), ["cacheError"]);
    assert_eq!(h.store.ops(), [Op::Get("outputcache/widgets".into())]);
}

#[tokio::test]
async fn store_read_failure_reaches_custom_error_handler() {
    let store = Arc::new(RecordingStore::default());
    store.fail_get.store(true, Ordering::SeqCst);
    let seen = Arc::new(Mutex::new(None));
    let seen_in_handler = Arc::clone(&seen);

    let pipeline = Pipeline::new()
        .layer(OutputCache::new(CacheOptions::new().shared_store(store)))
        .endpoint(|_ctx: Context| async { Response::new(StatusCode::Ok).body("fresh") })
        .on_error(move |_ctx, error| {
            *seen_in_handler.lock().unwrap() = Some(error.to_string());
            Response::new(StatusCode::ServiceUnavailable).body("cache unavailable")
        });

    let (request, _) = Request::parse(b"GET /a HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
    let response = pipeline.handle(request).await;

    assert_eq!(response.status(), StatusCode::ServiceUnavailable);
    assert_eq!(response.payload(), b"cache unavailable");
    let message = seen.lock().unwrap().clone().unwrap();
    assert!(message.contains("outputcache/a"));
    assert!(message.contains("connection refused"));
}

#[tokio::test]
async fn write_failure_is_reported_and_not_retried() {
    let mut h = Harness::new(CacheOptions::new(), widgets);
    h.store.fail_set.store(true, Ordering::SeqCst);

    let response = h.get("/widgets").await;
    assert_eq!(response.status(), StatusCode::Ok);
    assert_eq!(response.payload(), br#"{"items":[]}"#);
    assert_eq!(h.events_until("cacheError").await, ["miss", "cacheError"]);

    let ops = h.store.ops();
    assert_eq!(ops.len(), 2);
    assert!(matches!(ops[1], Op::Set(_)));
}

#[tokio::test]
async fn custom_ttl_and_key() {
    let mut h = Harness::new(
        CacheOptions::new()
            .ttl(Duration::from_secs(300))
            .cache_key(|req: &Request| format!("v2:{}", req.path())),
        widgets,
    );

    h.get("/widgets?page=1").await;
    h.events_until("save").await;
    assert_eq!(
        h.store.ops()[2],
        Op::Expire("v2:/widgets".into(), Duration::from_secs(300))
    );

    // Same key despite the different query.
    h.get("/widgets?page=7").await;
    assert_eq!(h.events_until("hit").await, ["hit"]);
    assert_eq!(h.calls(), 1);
}

#[tokio::test]
async fn prefix_is_applied_to_default_key() {
    let mut h = Harness::new(CacheOptions::new().prefix("pages:"), widgets);
    h.get("/about").await;
    h.events_until("save").await;
    assert_eq!(h.store.ops()[0], Op::Get("pages:/about".into()));
}

#[tokio::test(start_paused = true)]
async fn entry_expires_after_ttl() {
    let mut h = Harness::new(CacheOptions::from(10_u64), widgets);

    h.get("/w").await;
    h.events_until("save").await;
    h.get("/w").await;
    h.events_until("hit").await;

    tokio::time::advance(Duration::from_secs(11)).await;
    let response = h.get("/w").await;
    assert_eq!(response.headers().get("x-render"), Some("2"));
    assert_eq!(h.events_until("save").await, ["miss", "save"]);
}

#[tokio::test]
async fn missing_store_falls_back_to_memory() {
    let (tx, mut events) = unbounded_channel();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let pipeline = Pipeline::new()
        .layer(OutputCache::new(CacheOptions::new().observe(
            move |event: &CacheEvent| {
                let _ = tx.send(event.name());
            },
        )))
        .endpoint(move |_ctx: Context| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Response::new(StatusCode::Ok).body("cached") }
        });
    assert_eq!(events.recv().await, Some("warning"));

    for _ in 0..2 {
        let (request, _) = Request::parse(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
        assert_eq!(pipeline.handle(request).await.payload(), b"cached");
        // Let the spawned write land before the next request.
        while let Some(name) = events.recv().await {
            if name == "save" || name == "hit" {
                break;
            }
        }
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn replay_keeps_connection_close() {
    let mut h = Harness::new(CacheOptions::new(), |_| {
        Response::new(StatusCode::Ok).keep_alive(false).body("x")
    });
    let raw = "GET /a HTTP/1.0\r\nHost: localhost\r\n\r\n";

    let first = h.send(raw).await;
    h.events_until("save").await;
    let second = h.send(raw).await;
    assert_eq!(h.events_until("hit").await, ["hit"]);

    let first = first.into_bytes();
    let text = std::str::from_utf8(&first).unwrap();
    assert!(text.contains("Connection: close\r\n"));
    assert_eq!(second.into_bytes(), first);
}

#[tokio::test]
async fn replay_follows_client_connection_preference() {
    let mut h = Harness::new(CacheOptions::new(), widgets);
    let close = "GET /w HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n";
    let keep = "GET /w HTTP/1.1\r\nHost: localhost\r\n\r\n";

    assert!(!h.send(close).await.is_keep_alive());
    h.events_until("save").await;

    assert!(h.send(keep).await.is_keep_alive());
    assert!(!h.send(close).await.is_keep_alive());
    assert_eq!(h.events_until("hit").await, ["hit"]);
    assert_eq!(h.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn stalled_write_does_not_delay_the_response() {
    let mut h = Harness::new(CacheOptions::new(), widgets);
    h.store.stall_set.store(true, Ordering::SeqCst);

    let response = tokio::time::timeout(Duration::from_secs(1), h.get("/widgets"))
        .await
        .expect("response waited on the store write");
    assert_eq!(response.status(), StatusCode::Ok);
    assert_eq!(response.payload(), br#"{"items":[]}"#);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.drain_events(), ["miss"]);
    let ops = h.store.ops();
    assert!(matches!(ops.last(), Some(Op::Set(_))));
    assert!(!ops.iter().any(|op| matches!(op, Op::Expire(..))));

    // The next request is still served, fresh, while the first write hangs.
    let again = h.get("/widgets").await;
    assert_eq!(again.headers().get("x-render"), Some("2"));
}
