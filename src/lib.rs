//! # outputcache
//!
//! Response output caching for a from-scratch async HTTP/1.1 stack.
//!
//! ## Quick Start
//!
//! ```rust
//! use outputcache::{CacheOptions, OutputCache, Request, Response, StatusCode};
//! use outputcache::{cache::MemoryStore, context::Context, middleware::Pipeline};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let pipeline = Pipeline::new()
//!     .layer(OutputCache::new(
//!         CacheOptions::new().store(MemoryStore::new()).prefix("pages:"),
//!     ))
//!     .endpoint(|_ctx: Context| async {
//!         Response::new(StatusCode::Ok)
//!             .header("Content-Type", "application/json")
//!             .body(r#"{"items":[]}"#)
//!     });
//!
//! let (request, _) = Request::parse(b"GET /widgets?page=2 HTTP/1.1\r\nHost: a\r\n\r\n").unwrap();
//! let response = pipeline.handle(request).await;
//! assert_eq!(response.status(), StatusCode::Ok);
//! # }
//! ```

pub mod cache;
pub mod context;
pub mod http;
pub mod middleware;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use cache::{CacheOptions, OutputCache};
pub use http::{Headers, Method, Request, Response, StatusCode};
