//! Cache path derivation
//!
//! Maps an intercepted call to a file path inside the cache root. The path is
//! built from the source URL's host, its path and query, and the call's
//! keyword arguments serialized as compact JSON in insertion order. Two calls
//! whose kwargs differ only in key order therefore map to different paths.

use std::path::{Path, PathBuf};

use url::Url;

use super::CacheError;
use crate::data::CallDescriptor;

/// Characters replaced by `_` in the file name part of a key
const REPLACED_CHARS: [char; 10] = ['/', '.', '&', '=', '?', ' ', '{', '}', '"', ':'];

/// Host, path and query of a source identifier
///
/// Path and query borrow the caller's spelling; only the host is normalized.
#[derive(Debug, PartialEq, Eq)]
struct SourceParts<'a> {
    host: String,
    path: &'a str,
    query: Option<&'a str>,
}

/// Derives the full cache path for a call
///
/// # Arguments
/// * `root` - The cache root directory
/// * `call` - The intercepted call
/// * `suffix` - File suffix without the leading dot (e.g. "data", "metadata.json")
///
/// # Returns
/// * `Ok(PathBuf)` inside `root`
/// * `Err(CacheError::UnresolvableSource)` if the call names no URL
///
/// Sources without a host (archive entry names, local paths) are stored
/// directly under `root`, not under a `<root>/None/` directory. Such keys are
/// therefore not compatible with caches that use the `None` layout.
pub fn derive_path(
    root: &Path,
    call: &CallDescriptor,
    suffix: &str,
) -> Result<PathBuf, CacheError> {
    let (host, file_name) = key_parts(call, suffix)?;

    let mut path = root.to_path_buf();
    if !host.is_empty() {
        path.push(host);
    }
    path.push(file_name);
    Ok(path)
}

/// Derives the root-relative key `/<host>/<file name>` for a call
pub fn relative_key(call: &CallDescriptor, suffix: &str) -> Result<String, CacheError> {
    let (host, file_name) = key_parts(call, suffix)?;
    Ok(format!("/{host}/{file_name}").replace("//", "/"))
}

fn key_parts(call: &CallDescriptor, suffix: &str) -> Result<(String, String), CacheError> {
    let source = call.source().ok_or_else(|| CacheError::UnresolvableSource {
        method: call.method.clone(),
    })?;
    let parts = split_source(source);

    let mut key = parts.path.to_string();
    if let Some(query) = parts.query.filter(|q| !q.is_empty()) {
        key.push('?');
        key.push_str(query);
    }
    if !call.kwargs.is_empty() {
        key.push('?');
        key.push_str(&serde_json::to_string(&call.kwargs)?);
    }

    Ok((parts.host, format!("{}.{suffix}", sanitize(&key))))
}

/// Splits a source into host, path and query per generic URL syntax.
///
/// The URL parser is only trusted for the host. Path and query are sliced out
/// of the raw string so that percent-encoding and dot-segment removal never
/// change the key.
fn split_source(source: &str) -> SourceParts<'_> {
    let without_fragment = source.split('#').next().unwrap_or_default();
    let (before_query, query) = match without_fragment.split_once('?') {
        Some((before, query)) => (before, Some(query)),
        None => (without_fragment, None),
    };

    match Url::parse(source) {
        Ok(url) if !url.cannot_be_a_base() => {
            let after_scheme = before_query
                .split_once(':')
                .map_or(before_query, |(_, rest)| rest);
            let path = match after_scheme.strip_prefix("//") {
                Some(authority_and_path) => authority_and_path
                    .find('/')
                    .map_or("", |start| &authority_and_path[start..]),
                None => after_scheme,
            };
            SourceParts {
                host: url.host_str().unwrap_or_default().to_string(),
                path,
                query,
            }
        }
        // Relative names (archive entries, local files) have no host
        _ => SourceParts {
            host: String::new(),
            path: before_query,
            query,
        },
    }
}

fn sanitize(key: &str) -> String {
    key.chars()
        .map(|c| if REPLACED_CHARS.contains(&c) { '_' } else { c })
        .collect::<String>()
        .to_lowercase()
}
