//! The stored snapshot of a response.
//!
//! Entries are JSON objects with three fields:
//!
//! ```json
//! {"statusCode":200,"headers":{"Content-Type":"application/json"},"body":"{\"items\":[]}"}
//! ```
//!
//! `headers` maps each name to a string, or to an array of strings for names
//! written with several lines. `body` is a string when the payload is UTF-8
//! and an array of bytes otherwise.

use std::fmt;

use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{MapAccess, Visitor},
    ser::SerializeMap,
};
use thiserror::Error;

use crate::http::{HeaderValue, Response, ResponseWriter, StatusCode};

/// Errors produced while converting an entry to or from its stored form.
#[derive(Debug, Error)]
pub enum EntryError {
    #[error("malformed cache entry: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("cache entry could not be serialized: {0}")]
    Encode(#[source] serde_json::Error),
}

/// A captured response: status, headers and body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub status_code: StatusCode,
    pub headers: CachedHeaders,
    #[serde(with = "body_repr")]
    pub body: Vec<u8>,
}

impl CacheEntry {
    /// Parses stored bytes. Anything that is not a well-formed entry with a
    /// known status code is rejected.
    pub fn decode(bytes: &[u8]) -> Result<Self, EntryError> {
        serde_json::from_slice(bytes).map_err(EntryError::Decode)
    }

    pub fn encode(&self) -> Result<Vec<u8>, EntryError> {
        serde_json::to_vec(self).map_err(EntryError::Encode)
    }

    /// Replays the entry into `writer` and ends the response.
    pub fn write_to<W: ResponseWriter + ?Sized>(&self, writer: &mut W) {
        writer.set_status(self.status_code);
        for (name, value) in self.headers.iter() {
            writer.set_header(name, value.clone());
        }
        if !self.body.is_empty() {
            writer.send(&self.body);
        }
        writer.end();
    }

    /// Builds a finished [`Response`] from the entry.
    pub fn into_response(self) -> Response {
        let mut response = Response::default();
        self.write_to(&mut response);
        response
    }
}

/// Header snapshot keyed by name.
///
/// Names compare case-insensitively and keep the position of their first
/// write; the value is always the last one written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachedHeaders {
    entries: Vec<(String, HeaderValue)>,
}

impl CachedHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `value` under `name`, replacing an earlier value for the same name.
    pub fn set(&mut self, name: &str, value: HeaderValue) {
        match self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            Some(entry) => *entry = (name.to_owned(), value),
            None => self.entries.push((name.to_owned(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for CachedHeaders {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

struct HeadersVisitor;

impl<'de> Visitor<'de> for HeadersVisitor {
    type Value = CachedHeaders;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of header names to string values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut headers = CachedHeaders::new();
        while let Some((name, value)) = access.next_entry::<String, HeaderValue>()? {
            headers.set(&name, value);
        }
        Ok(headers)
    }
}

impl<'de> Deserialize<'de> for CachedHeaders {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(HeadersVisitor)
    }
}

mod body_repr {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Binary(Vec<u8>),
    }

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        match std::str::from_utf8(body) {
            Ok(text) => serializer.serialize_str(text),
            Err(_) => serializer.collect_seq(body),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        Ok(match Repr::deserialize(deserializer)? {
            Repr::Text(text) => text.into_bytes(),
            Repr::Binary(bytes) => bytes,
        })
    }
}
