//! File cache for intercepted fetch calls
//!
//! This module derives deterministic file paths from a call's URL and keyword
//! arguments, and provides the adapter that stores call results under those
//! paths (payload file plus a `metadata.json` sidecar) and serves them back
//! on later calls. There is no expiry and no invalidation: entries live until
//! something outside this crate deletes them.

mod adapter;
pub mod key;
mod payload;

pub use adapter::{CacheEntry, CachedPayload, FileCacheAdapter, HookOutcome};
pub use key::{derive_path, relative_key};
pub use payload::{Cacheable, Payload};

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while deriving cache paths or writing entries
#[derive(Debug, Error)]
pub enum CacheError {
    /// Neither the first argument nor a `url` keyword names a source
    #[error("No URL found in args or kwargs of '{method}' call")]
    UnresolvableSource { method: String },

    /// A positional argument has no JSON form for the metadata file
    #[error("Argument {index} of type {type_name} is not JSON serializable")]
    NonSerializableArgument { index: usize, type_name: String },

    /// JSON encoding of kwargs or metadata failed
    #[error("Failed to encode cache metadata: {0}")]
    Encode(#[from] serde_json::Error),

    /// Reading or writing a cache file failed
    #[error("Cache I/O failed for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
