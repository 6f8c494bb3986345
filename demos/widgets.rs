//! Serves the same request twice through an `OutputCache`: the first is
//! rendered by the endpoint, the second is replayed from the store.
//!
//! ```text
//! RUST_LOG=outputcache=debug cargo run --example widgets
//! ```

use std::time::Duration;

use outputcache::{
    CacheOptions, OutputCache, Request, Response, StatusCode,
    cache::{CacheEvent, MemoryStore},
    context::Context,
    middleware::Pipeline,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .init();

    let options = CacheOptions::new()
        .prefix("widgets:")
        .ttl(Duration::from_secs(30))
        .store(MemoryStore::new())
        .skip_when(|req: &Request| req.method().as_str() != "GET")
        .observe(|event: &CacheEvent| println!("event: {}", event.name()));

    let pipeline = Pipeline::new()
        .layer(OutputCache::new(options))
        .endpoint(|ctx: Context| async move {
            let page = ctx.request().query_param("page").unwrap_or("1").to_owned();
            Response::new(StatusCode::Ok)
                .header("Content-Type", "application/json")
                .body(format!(r#"{{"page":{page},"items":[]}}"#))
        });

    for round in 1..=2 {
        let (request, _) =
            Request::parse(b"GET /widgets?page=2 HTTP/1.1\r\nHost: localhost\r\n\r\n")?;
        let response = pipeline.handle(request).await;
        println!(
            "round {round}: {} {}",
            response.status(),
            String::from_utf8_lossy(response.payload())
        );
        // Give the background store write a moment to land.
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    Ok(())
}
