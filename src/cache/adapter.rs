//! File cache adapter for intercepted calls
//!
//! Provides a `FileCacheAdapter` whose after-hook stores call results as a
//! payload file plus a `metadata.json` sidecar, and whose before-hook serves a
//! stored payload back when the same call is made again.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{json, Value};
use tempfile::NamedTempFile;
use tracing::{debug, error, warn};

use super::key::derive_path;
use super::payload::Cacheable;
use super::CacheError;
use crate::data::{Arg, CallDescriptor, ContentKind, Kwargs};

/// Suffix of the sidecar file describing a cached call
const METADATA_SUFFIX: &str = "metadata.json";

/// Contents of a metadata sidecar file
#[derive(Debug, Serialize)]
struct Metadata<'a> {
    methods: &'a str,
    args: Vec<Value>,
    kwargs: &'a Kwargs,
}

/// Paths of a cache entry written by the after-hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub payload_path: PathBuf,
    pub metadata_path: PathBuf,
}

/// A payload found by the before-hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPayload {
    pub bytes: Vec<u8>,
    pub kind: ContentKind,
    pub path: PathBuf,
}

/// What the after-hook did with a call result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    /// Payload and metadata were written
    Written(CacheEntry),
    /// The method is not in the allow-list; a warning was emitted
    MethodNotAllowed,
    /// The value already came from the cache; nothing was rewritten
    AlreadyCached,
    /// The value had nothing to store; an error diagnostic was emitted
    NoPayload,
}

/// Stores and serves call results under a cache root directory
///
/// Entries are laid out as `<root>/<host>/<key>.<data|csv>` with a sibling
/// `<root>/<host>/<key>.metadata.json`. Writing the same key again overwrites
/// both files.
#[derive(Debug, Clone)]
pub struct FileCacheAdapter {
    /// Directory under which all entries are stored
    cache_dir: PathBuf,
}

impl Default for FileCacheAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl FileCacheAdapter {
    /// Creates an adapter rooted at the system temp directory
    pub fn new() -> Self {
        Self::with_dir(std::env::temp_dir())
    }

    /// Creates an adapter with a custom cache root
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// The cache root directory
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Looks up a stored payload for a call before it is delegated
    ///
    /// # Returns
    /// * `Ok(Some(CachedPayload))` if an entry exists for the call
    /// * `Ok(None)` on a miss, or when the method is not cacheable
    /// * `Err(CacheError)` if no path can be derived or the file cannot be read
    pub fn before_hook(
        &self,
        call: &CallDescriptor,
    ) -> Result<Option<CachedPayload>, CacheError> {
        let Some(method) = call.allowed_method() else {
            return Ok(None);
        };
        let kind = method.content_kind();
        let path = derive_path(&self.cache_dir, call, kind.suffix())?;

        match fs::read(&path) {
            Ok(bytes) => {
                debug!(method = %method, path = %path.display(), "cache hit");
                Ok(Some(CachedPayload { bytes, kind, path }))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }

    /// Stores the result of a completed call
    ///
    /// # Arguments
    /// * `call` - The call that produced `value`
    /// * `value` - The delegated call's result
    /// * `is_new_value` - `false` when `value` was itself served from the cache
    ///
    /// # Returns
    /// * `Ok(HookOutcome)` describing what was done
    /// * `Err(CacheError)` if no path can be derived, an argument cannot be
    ///   recorded as JSON, or a write fails. Nothing is written when argument
    ///   encoding fails.
    pub fn after_hook<V: Cacheable + ?Sized>(
        &self,
        call: &CallDescriptor,
        value: &V,
        is_new_value: bool,
    ) -> Result<HookOutcome, CacheError> {
        if call.allowed_method().is_none() {
            warn!(method = %call.method, "file cache after_hook: method not allowed");
            return Ok(HookOutcome::MethodNotAllowed);
        }
        if !is_new_value {
            return Ok(HookOutcome::AlreadyCached);
        }

        let payload = match value.cacheable_payload() {
            Some(payload) if !payload.bytes.is_empty() => payload,
            _ => {
                error!(
                    value = ?value,
                    type_name = std::any::type_name::<V>(),
                    "no content in value"
                );
                return Ok(HookOutcome::NoPayload);
            }
        };

        let payload_path = derive_path(&self.cache_dir, call, payload.kind.suffix())?;
        let metadata_path = derive_path(&self.cache_dir, call, METADATA_SUFFIX)?;
        let metadata = serde_json::to_vec(&Metadata {
            methods: &call.method,
            args: safe_args(&call.args)?,
            kwargs: &call.kwargs,
        })?;

        // Both files are fully staged before either is moved into place
        let staged_payload = stage(&payload_path, &payload.bytes)?;
        let staged_metadata = stage(&metadata_path, &metadata)?;
        commit(staged_payload, &payload_path)?;
        commit(staged_metadata, &metadata_path)?;

        debug!(
            method = %call.method,
            path = %payload_path.display(),
            bytes = payload.bytes.len(),
            "cached call result"
        );

        Ok(HookOutcome::Written(CacheEntry {
            payload_path,
            metadata_path,
        }))
    }
}

/// Converts positional arguments to their metadata form
///
/// Archive entries are recorded by name only.
fn safe_args(args: &[Arg]) -> Result<Vec<Value>, CacheError> {
    args.iter()
        .enumerate()
        .map(|(index, arg)| match arg {
            Arg::Text(s) => Ok(Value::String(s.clone())),
            Arg::Json(v) => Ok(v.clone()),
            Arg::Archive(entry) => Ok(json!({ "zip": { "name": entry.name() } })),
            Arg::Opaque { type_name } => Err(CacheError::NonSerializableArgument {
                index,
                type_name: type_name.clone(),
            }),
        })
        .collect()
}

/// Writes bytes to a temp file next to `path`, creating parent directories
fn stage(path: &Path, bytes: &[u8]) -> Result<NamedTempFile, CacheError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let io_err = |source: io::Error| CacheError::Io {
        path: path.to_path_buf(),
        source,
    };

    fs::create_dir_all(dir).map_err(io_err)?;
    let mut file = NamedTempFile::new_in(dir).map_err(io_err)?;
    file.write_all(bytes).map_err(io_err)?;
    file.flush().map_err(io_err)?;
    Ok(file)
}

fn commit(staged: NamedTempFile, path: &Path) -> Result<(), CacheError> {
    staged.persist(path).map_err(|e| CacheError::Io {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}
