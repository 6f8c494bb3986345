//! Per-request context handed down the middleware chain.

use crate::Request;

/// Per-request context. Owns the [`Request`] while it travels through the
/// middleware chain towards the endpoint.
pub struct Context {
    request: Request,
}

impl Context {
    /// Create a new context from a request
    pub fn new(request: Request) -> Self {
        Self { request }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Give the request back, consuming the context.
    pub fn into_request(self) -> Request {
        self.request
    }
}
