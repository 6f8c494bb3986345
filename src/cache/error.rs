use thiserror::Error;

use super::{entry::EntryError, store::StoreError};

/// A failed cache operation, tagged with the key it concerned.
///
/// Only [`CacheError::Read`] ever reaches the caller, through the pipeline's
/// error handler. The others are reported as `cacheError` events.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("reading cache entry `{key}` failed: {source}")]
    Read {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("writing cache entry `{key}` failed: {source}")]
    Write {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("setting expiry of cache entry `{key}` failed: {source}")]
    Expire {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("deleting cache entry `{key}` failed: {source}")]
    Delete {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("encoding cache entry `{key}` failed: {source}")]
    Encode {
        key: String,
        #[source]
        source: EntryError,
    },
}

impl CacheError {
    pub fn key(&self) -> &str {
        match self {
            Self::Read { key, .. }
            | Self::Write { key, .. }
            | Self::Expire { key, .. }
            | Self::Delete { key, .. }
            | Self::Encode { key, .. } => key,
        }
    }
}
