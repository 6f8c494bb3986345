//! Response capture: a [`ResponseWriter`] decorator that records what is
//! written through it.
//!
//! Every call is forwarded to the wrapped writer unchanged; capture only
//! observes. What gets recorded:
//!
//! - headers, by name, last write wins;
//! - the payload of the last non-empty `send` made while the status is below 400;
//! - on the first `end`, if the final status is below 400 and a payload was
//!   recorded, a complete [`CacheEntry`].
//!
//! Once `end` has been seen the response is finished: later calls are
//! dropped, and a second `end` does nothing.

use crate::http::{HeaderValue, ResponseWriter, StatusCode};

use super::entry::{CacheEntry, CachedHeaders};

/// Records status, headers and body on their way into `W`.
///
/// # Examples
///
/// ```
/// use outputcache::{Response, StatusCode, cache::CapturingWriter};
///
/// let handler_output = Response::new(StatusCode::Ok)
///     .header("Content-Type", "text/plain")
///     .body("hello");
///
/// let mut outbound = Response::default();
/// let mut capture = CapturingWriter::new(&mut outbound);
/// handler_output.write_to(&mut capture);
///
/// let entry = capture.into_entry().expect("cacheable");
/// assert_eq!(entry.body, b"hello");
/// assert_eq!(outbound.payload(), b"hello");
/// ```
#[derive(Debug)]
pub struct CapturingWriter<W> {
    inner: W,
    headers: CachedHeaders,
    body: Option<Vec<u8>>,
    ended: bool,
    entry: Option<CacheEntry>,
}

impl<W: ResponseWriter> CapturingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            headers: CachedHeaders::new(),
            body: None,
            ended: false,
            entry: None,
        }
    }

    /// Returns `true` once `end` has been forwarded.
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// The entry assembled at `end`, if the response was cacheable.
    pub fn into_entry(self) -> Option<CacheEntry> {
        self.entry
    }
}

impl<W: ResponseWriter> ResponseWriter for CapturingWriter<W> {
    fn status(&self) -> StatusCode {
        self.inner.status()
    }

    fn set_status(&mut self, status: StatusCode) {
        if self.ended {
            tracing::trace!(status = %status, "status after end dropped");
            return;
        }
        self.inner.set_status(status);
    }

    fn set_header(&mut self, name: &str, value: HeaderValue) {
        if self.ended {
            tracing::trace!(header = name, "header after end dropped");
            return;
        }
        self.headers.set(name, value.clone());
        self.inner.set_header(name, value);
    }

    fn send(&mut self, body: &[u8]) {
        if self.ended {
            tracing::trace!("send after end dropped");
            return;
        }
        if !self.inner.status().is_error() {
            self.body = (!body.is_empty()).then(|| body.to_vec());
        }
        self.inner.send(body);
    }

    fn end(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;

        let status = self.inner.status();
        if !status.is_error() {
            if let Some(body) = self.body.take() {
                self.entry = Some(CacheEntry {
                    status_code: status,
                    headers: std::mem::take(&mut self.headers),
                    body,
                });
            }
        }
        self.inner.end();
    }
}
