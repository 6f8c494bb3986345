//! Middleware pipeline — composable before/after request handler logic.
//!
//! This module defines the core types for building an ordered middleware stack.
//! Each middleware wraps the next layer, enabling request inspection, short-circuit
//! responses, and response decoration without coupling handlers to infrastructure
//! concerns.
//!
//! ## Core types
//!
//! - [`Middleware`] — trait implemented by all middleware.
//! - [`Next`] — cursor into the remaining middleware chain; call [`Next::run`] to
//!   advance to the next layer, or [`Next::fail`] to hand an error to the
//!   pipeline's error handler.
//! - [`MiddlewareHandler`] — type-erased, cheaply-cloneable middleware function.
//! - [`from_middleware`] — converts a [`Middleware`] trait object into a
//!   [`MiddlewareHandler`].
//! - [`Pipeline`] — an ordered stack of middleware in front of an endpoint.

use std::{error::Error, future::Future, pin::Pin, sync::Arc};

use crate::{Request, Response, StatusCode, context::Context};

/// Boxed error type carried down the error path.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Turns an error raised inside the chain into the response the caller sees.
pub type ErrorHandler = Arc<dyn Fn(Context, BoxError) -> Response + Send + Sync + 'static>;

/// A cursor into the remaining middleware chain for a single request.
///
/// `Next` is passed to each middleware's [`Middleware::handle`] implementation.
/// Calling [`Next::run`] advances the cursor by one position and invokes the next
/// middleware (or returns a fallback `500` response when the chain is exhausted
/// without any middleware generating a response).
///
/// `Next` is consumed on each call to [`run`](Self::run) or [`fail`](Self::fail),
/// so it cannot be called more than once per middleware invocation.
///
/// # Examples
///
/// ```rust,no_run
/// use std::pin::Pin;
/// use outputcache::{Response, context::Context, middleware::{Middleware, Next}};
///
/// struct PassThrough;
///
/// impl Middleware for PassThrough {
///     fn handle(
///         &self,
///         ctx: Context,
///         next: Next,
///     ) -> Pin<Box<dyn std::future::Future<Output = Response> + Send>> {
///         Box::pin(async move { next.run(ctx).await })
///     }
/// }
/// ```
pub struct Next {
    middlewares: Vec<MiddlewareHandler>,
    // Tracks which middleware to invoke on the next `run` call.
    index: usize,
    on_error: ErrorHandler,
}

/// A type-erased, reference-counted middleware function.
///
/// Every entry in the middleware stack is stored as a `MiddlewareHandler`.
/// The [`Arc`] wrapper makes handlers cheap to clone so that [`Next`] can
/// advance through the chain without copying closures.
pub type MiddlewareHandler = Arc<
    dyn Fn(Context, Next) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static,
>;

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    Arc::new(move |ctx: Context, next: Next| middleware.handle(ctx, next))
}

/// Conversion trait for async endpoint functions.
///
/// Any `Fn(Context) -> impl Future<Output = Response> + Send` that is also
/// `Send + Sync + 'static` implements this trait automatically via the blanket impl
/// below.
pub trait IntoHandler: Send + Sync + 'static {
    /// Call the handler with the given context, boxing the returned future.
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin((self)(ctx))
    }
}

// Logs the error and answers with a bare 500.
fn internal_error(ctx: Context, error: BoxError) -> Response {
    tracing::error!(
        method = %ctx.request().method(),
        path = %ctx.request().path(),
        error = %error,
        "request failed in middleware chain"
    );
    Response::new(StatusCode::InternalServerError).body("Internal Server Error")
}

impl Next {
    /// Creates a new `Next` positioned at the start of the given middleware stack,
    /// with the default error handler (`500 Internal Server Error`).
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use outputcache::middleware::Next;
    ///
    /// let next = Next::new(vec![]);
    /// ```
    pub fn new(middlewares: Vec<MiddlewareHandler>) -> Self {
        Self {
            middlewares,
            index: 0,
            on_error: Arc::new(internal_error),
        }
    }

    /// Replaces the handler invoked by [`fail`](Self::fail).
    #[must_use]
    pub fn with_error_handler(mut self, on_error: ErrorHandler) -> Self {
        self.on_error = on_error;
        self
    }

    /// Invokes the next middleware in the chain and returns its response.
    ///
    /// Advances the internal cursor by one, clones the handler at the current
    /// position, and awaits it. If no handler remains (i.e. the chain is
    /// exhausted without producing a response), a `500 Internal Server Error`
    /// response is returned as a safe fallback.
    pub async fn run(mut self, ctx: Context) -> Response {
        if self.index < self.middlewares.len() {
            let handler = self.middlewares[self.index].clone();
            self.index += 1;
            handler(ctx, self).await
        } else {
            Response::new(StatusCode::InternalServerError)
                .body("No response generated by middleware pipeline")
        }
    }

    /// Abandons the rest of the chain and lets the error handler answer.
    ///
    /// Downstream middleware and the endpoint are not invoked.
    pub async fn fail(self, ctx: Context, error: BoxError) -> Response {
        (self.on_error)(ctx, error)
    }
}

/// The core trait for all middleware.
///
/// Implementors receive a [`Context`] and a [`Next`] cursor. They may:
///
/// - **Pass through** — call `next.run(ctx).await` without modification.
/// - **Short-circuit** — return a [`Response`] directly without calling `next`.
/// - **Decorate** — call `next.run(ctx).await`, inspect the response, and return
///   a modified copy.
/// - **Fail** — call `next.fail(ctx, error).await` to take the error path.
///
/// # Contract
///
/// - Implementations **must** be `Send + Sync` because middleware is shared across
///   Tokio tasks.
/// - `handle` **must** return a pinned, `Send` future so it can be awaited across
///   `.await` points in multi-threaded runtimes.
/// - Implementations **should not** hold `&mut` references to shared state across
///   an `.await` point.
pub trait Middleware: Send + Sync {
    /// Handle the request and optionally delegate to the next middleware.
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

/// An ordered middleware stack in front of an endpoint.
///
/// Middleware run in the order they were added; the endpoint runs last. The
/// pipeline is cheap to clone and can be shared across tasks.
///
/// # Examples
///
/// ```rust
/// use outputcache::{Request, Response, StatusCode, context::Context, middleware::Pipeline};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let pipeline = Pipeline::new()
///     .endpoint(|_ctx: Context| async { Response::new(StatusCode::Ok).body("hi") });
///
/// let (request, _) = Request::parse(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n").unwrap();
/// let response = pipeline.handle(request).await;
/// assert_eq!(response.payload(), b"hi");
/// # }
/// ```
#[derive(Clone)]
pub struct Pipeline {
    middlewares: Vec<MiddlewareHandler>,
    endpoint: Option<MiddlewareHandler>,
    on_error: ErrorHandler,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// Creates an empty pipeline with the default error handler.
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
            endpoint: None,
            on_error: Arc::new(internal_error),
        }
    }

    /// Appends a middleware to the stack.
    #[must_use]
    pub fn layer<M>(mut self, middleware: M) -> Self
    where
        M: Middleware + 'static,
    {
        self.middlewares.push(from_middleware(Arc::new(middleware)));
        self
    }

    /// Sets the endpoint that produces responses once every middleware has passed.
    #[must_use]
    pub fn endpoint(mut self, handler: impl IntoHandler) -> Self {
        let handler = Arc::new(handler);
        self.endpoint = Some(Arc::new(move |ctx: Context, _next: Next| handler.call(ctx)));
        self
    }

    /// Sets the handler that answers when a middleware takes the error path.
    #[must_use]
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(Context, BoxError) -> Response + Send + Sync + 'static,
    {
        self.on_error = Arc::new(handler);
        self
    }

    /// Runs `request` through the middleware stack and the endpoint.
    pub async fn handle(&self, request: Request) -> Response {
        let mut chain = self.middlewares.clone();
        chain.extend(self.endpoint.clone());
        Next::new(chain)
            .with_error_handler(Arc::clone(&self.on_error))
            .run(Context::new(request))
            .await
    }
}
