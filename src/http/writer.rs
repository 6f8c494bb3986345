//! The response-writing capability.
//!
//! Handlers build a [`Response`](super::Response) value; on its way out that
//! value is *committed* through a [`ResponseWriter`]: status first, then one
//! `set_header` per header name, then `send` with the body, then `end`.
//! Anything that needs to observe a response as it is written (output
//! caching, for one) wraps a writer instead of reaching into the response.

use super::{HeaderValue, StatusCode};

/// Something a response can be written into.
///
/// Implementations must accept calls in commit order; after [`end`](Self::end)
/// the response is finished and further writes have no effect.
pub trait ResponseWriter {
    /// The status committed so far.
    fn status(&self) -> StatusCode;

    fn set_status(&mut self, status: StatusCode);

    /// Sets a header, replacing any earlier value for the same name.
    fn set_header(&mut self, name: &str, value: HeaderValue);

    /// Writes the response payload.
    fn send(&mut self, body: &[u8]);

    /// Finishes the response.
    fn end(&mut self);
}

impl<W: ResponseWriter + ?Sized> ResponseWriter for &mut W {
    fn status(&self) -> StatusCode {
        (**self).status()
    }

    fn set_status(&mut self, status: StatusCode) {
        (**self).set_status(status);
    }

    fn set_header(&mut self, name: &str, value: HeaderValue) {
        (**self).set_header(name, value);
    }

    fn send(&mut self, body: &[u8]) {
        (**self).send(body);
    }

    fn end(&mut self) {
        (**self).end();
    }
}
