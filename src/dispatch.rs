//! Cache-aware fetch dispatch
//!
//! `HttpioClient` wraps a reqwest client and a `FileCacheAdapter`. Every call
//! is described as a `CallDescriptor`; the adapter's before-hook may answer it
//! from disk, otherwise the call is delegated and its result handed to the
//! after-hook.

use std::path::Path;
use std::time::Duration;

use reqwest::{Client, ClientBuilder, RequestBuilder};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::cache::{CacheError, FileCacheAdapter};
use crate::data::{
    ArchiveEntry, ArchiveError, Arg, CallDescriptor, FetchedResponse, Kwargs, Method, Table,
    TableError,
};

/// Errors that can occur when dispatching a fetch call
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Cache lookup or population failed
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// A local file source could not be read
    #[error("Failed to read {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// An archive source could not be read
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// CSV content could not be parsed
    #[error("Failed to parse CSV: {0}")]
    Table(#[from] TableError),

    /// A keyword argument has an unusable value
    #[error("Invalid keyword argument '{name}': {reason}")]
    InvalidKwarg { name: String, reason: String },
}

/// Fetch client that consults and populates a file cache
#[derive(Debug, Clone)]
pub struct HttpioClient {
    client: Client,
    cache: FileCacheAdapter,
}

impl HttpioClient {
    /// Creates a client using the given cache adapter
    pub fn new(cache: FileCacheAdapter) -> Self {
        Self::with_client(Client::new(), cache)
    }

    /// Creates a client with a custom HTTP client
    ///
    /// The client is used for `get`, `post` and `read_csv` only. Sessions
    /// need a cookie store, which cannot be added to a built client, so
    /// `session()` starts from default settings; use `session_with` to give a
    /// session its own timeouts, TLS or proxy configuration.
    pub fn with_client(client: Client, cache: FileCacheAdapter) -> Self {
        Self { client, cache }
    }

    /// The cache adapter shared by this client and its sessions
    pub fn cache(&self) -> &FileCacheAdapter {
        &self.cache
    }

    /// Issues a GET request, or serves it from the cache
    ///
    /// # Arguments
    /// * `url` - The URL to fetch
    /// * `kwargs` - Request options: `params`, `headers`, `json`, `data`, `timeout`
    pub async fn get(&self, url: &str, kwargs: Kwargs) -> Result<FetchedResponse, FetchError> {
        let call = CallDescriptor::new(Method::Get.as_str(), vec![Arg::from(url)], kwargs);
        send_cached(&self.client, &self.cache, reqwest::Method::GET, call).await
    }

    /// Issues a POST request, or serves it from the cache
    pub async fn post(&self, url: &str, kwargs: Kwargs) -> Result<FetchedResponse, FetchError> {
        let call = CallDescriptor::new(Method::Post.as_str(), vec![Arg::from(url)], kwargs);
        send_cached(&self.client, &self.cache, reqwest::Method::POST, call).await
    }

    /// Opens a session with default client settings that keeps cookies
    /// between requests
    pub fn session(&self) -> Result<Session, FetchError> {
        self.session_with(Client::builder())
    }

    /// Opens a session from a caller-configured builder
    ///
    /// The cookie store is switched on; every other setting of `builder`
    /// (timeouts, TLS, proxies, default headers) is kept.
    pub fn session_with(&self, builder: ClientBuilder) -> Result<Session, FetchError> {
        let client = builder.cookie_store(true).build()?;
        Ok(Session {
            client,
            cache: self.cache.clone(),
        })
    }

    /// Reads CSV from a URL, a local path or an archive entry into a table
    ///
    /// # Arguments
    /// * `source` - URL or path as `Arg::Text`, or an `Arg::Archive` entry
    /// * `kwargs` - `sep` (single-character delimiter), `skiprows` (lines to drop)
    ///
    /// # Returns
    /// * `Ok(Table)` parsed from the cached or freshly read content
    /// * `Err(FetchError)` if the source cannot be read or parsed
    pub async fn read_csv(
        &self,
        source: impl Into<Arg>,
        kwargs: Kwargs,
    ) -> Result<Table, FetchError> {
        let options = CsvOptions::from_kwargs(&kwargs)?;
        let call = CallDescriptor::new(Method::ReadCsv.as_str(), vec![source.into()], kwargs);

        if let Some(cached) = self.cache.before_hook(&call)? {
            // Cached tables are always written comma-separated with the rows already skipped
            let table = Table::from_csv(&String::from_utf8_lossy(&cached.bytes), ',')?;
            self.cache.after_hook(&call, &table, false)?;
            return Ok(table);
        }

        let raw = match call.args.first() {
            Some(Arg::Archive(entry)) => entry.contents().to_vec(),
            _ => {
                let source = call.source().ok_or_else(|| CacheError::UnresolvableSource {
                    method: call.method.clone(),
                })?;
                self.read_source(source).await?
            }
        };
        let text = String::from_utf8_lossy(&raw);
        let table = Table::from_csv(skip_lines(&text, options.skiprows), options.sep)?;

        self.cache.after_hook(&call, &table, true)?;
        Ok(table)
    }

    /// Reads a CSV entry out of a zip archive and parses it through the cache
    pub async fn read_csv_from_archive(
        &self,
        archive_path: &Path,
        entry_name: &str,
        kwargs: Kwargs,
    ) -> Result<Table, FetchError> {
        let entry = ArchiveEntry::open(archive_path, entry_name)?;
        self.read_csv(entry, kwargs).await
    }

    async fn read_source(&self, source: &str) -> Result<Vec<u8>, FetchError> {
        if source.starts_with("http://") || source.starts_with("https://") {
            let response = self.client.get(source).send().await?.error_for_status()?;
            return Ok(response.bytes().await?.to_vec());
        }

        std::fs::read(source).map_err(|source_err| FetchError::ReadFailed {
            path: source.to_string(),
            source: source_err,
        })
    }
}

/// A cookie-keeping client whose calls are cached as `session.get`/`session.post`
#[derive(Debug, Clone)]
pub struct Session {
    client: Client,
    cache: FileCacheAdapter,
}

impl Session {
    /// Issues a GET request within the session, or serves it from the cache
    pub async fn get(&self, url: &str, kwargs: Kwargs) -> Result<FetchedResponse, FetchError> {
        let call = CallDescriptor::new(Method::SessionGet.as_str(), vec![Arg::from(url)], kwargs);
        send_cached(&self.client, &self.cache, reqwest::Method::GET, call).await
    }

    /// Issues a POST request within the session, or serves it from the cache
    pub async fn post(&self, url: &str, kwargs: Kwargs) -> Result<FetchedResponse, FetchError> {
        let call = CallDescriptor::new(Method::SessionPost.as_str(), vec![Arg::from(url)], kwargs);
        send_cached(&self.client, &self.cache, reqwest::Method::POST, call).await
    }
}

async fn send_cached(
    client: &Client,
    cache: &FileCacheAdapter,
    method: reqwest::Method,
    call: CallDescriptor,
) -> Result<FetchedResponse, FetchError> {
    let url = call
        .source()
        .ok_or_else(|| CacheError::UnresolvableSource {
            method: call.method.clone(),
        })?
        .to_string();

    if let Some(cached) = cache.before_hook(&call)? {
        let response = FetchedResponse::from_cache(url, cached.bytes);
        cache.after_hook(&call, &response, false)?;
        return Ok(response);
    }

    debug!(method = %call.method, url = %url, "cache miss, sending request");
    let request = apply_kwargs(client.request(method, &url), &call.kwargs)?;
    let response = FetchedResponse::from_reqwest(request.send().await?).await?;

    cache.after_hook(&call, &response, true)?;
    Ok(response)
}

/// Translates requests-style keyword arguments onto a reqwest builder
fn apply_kwargs(
    mut request: RequestBuilder,
    kwargs: &Kwargs,
) -> Result<RequestBuilder, FetchError> {
    for (name, value) in kwargs {
        request = match name.as_str() {
            "params" => request.query(&string_pairs(name, value)?),
            "headers" => string_pairs(name, value)?
                .into_iter()
                .fold(request, |req, (k, v)| req.header(k, v)),
            "json" => request.json(value),
            "data" => match value {
                Value::String(body) => request.body(body.clone()),
                Value::Object(_) => request.form(&string_pairs(name, value)?),
                _ => return Err(invalid(name, "expected a string or an object")),
            },
            "timeout" => {
                let secs = value
                    .as_f64()
                    .filter(|s| s.is_finite() && *s >= 0.0)
                    .ok_or_else(|| invalid(name, "expected a non-negative number of seconds"))?;
                request.timeout(Duration::from_secs_f64(secs))
            }
            "url" => request,
            other => {
                debug!(kwarg = other, "ignoring unsupported request option");
                request
            }
        };
    }
    Ok(request)
}

/// Flattens a JSON object into (key, value) string pairs
fn string_pairs(name: &str, value: &Value) -> Result<Vec<(String, String)>, FetchError> {
    let object = value
        .as_object()
        .ok_or_else(|| invalid(name, "expected an object"))?;

    Ok(object
        .iter()
        .map(|(k, v)| {
            let v = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), v)
        })
        .collect())
}

fn invalid(name: &str, reason: &str) -> FetchError {
    FetchError::InvalidKwarg {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

/// Parsing options taken from `read_csv` keyword arguments
#[derive(Debug, Clone, Copy, PartialEq)]
struct CsvOptions {
    sep: char,
    skiprows: usize,
}

impl CsvOptions {
    fn from_kwargs(kwargs: &Kwargs) -> Result<Self, FetchError> {
        let sep = match kwargs.get("sep") {
            None => ',',
            Some(Value::String(s)) if s.chars().count() == 1 => s.chars().next().unwrap_or(','),
            Some(_) => return Err(invalid("sep", "expected a single character")),
        };
        let skiprows = match kwargs.get("skiprows") {
            None => 0,
            Some(v) => v
                .as_u64()
                .ok_or_else(|| invalid("skiprows", "expected a non-negative integer"))?
                as usize,
        };
        Ok(Self { sep, skiprows })
    }
}

fn skip_lines(text: &str, count: usize) -> &str {
    let mut rest = text;
    for _ in 0..count {
        match rest.split_once('\n') {
            Some((_, tail)) => rest = tail,
            None => return "",
        }
    }
    rest
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::TempDir;

    fn kwargs(value: Value) -> Kwargs {
        match value {
            Value::Object(map) => map,
            _ => panic!("kwargs must be an object"),
        }
    }

    fn create_test_client() -> (HttpioClient, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let cache = FileCacheAdapter::with_dir(temp_dir.path().join("cache"));
        (HttpioClient::new(cache), temp_dir)
    }

    #[tokio::test]
    async fn test_get_is_served_from_cache_without_network() {
        let (client, _temp_dir) = create_test_client();
        // Port 9 on localhost is never expected to answer
        let url = "http://127.0.0.1:9/prices?day=1";
        let call = CallDescriptor::new("get", vec![Arg::from(url)], Kwargs::new());
        client.cache().after_hook(&call, "cached body", true).unwrap();

        let response = client.get(url, Kwargs::new()).await.expect("Cache hit should succeed");

        assert!(response.from_cache);
        assert_eq!(response.text(), "cached body");
        assert_eq!(response.url, url);
    }

    #[tokio::test]
    async fn test_session_calls_use_their_own_method_name() {
        let (client, _temp_dir) = create_test_client();
        let url = "http://127.0.0.1:9/login";
        let call = CallDescriptor::new(
            "session.post",
            vec![Arg::from(url)],
            kwargs(json!({"data": "u=1"})),
        );
        client.cache().after_hook(&call, "ok", true).unwrap();

        let session = client.session().expect("Session should build");
        let response = session
            .post(url, kwargs(json!({"data": "u=1"})))
            .await
            .expect("Cache hit should succeed");

        assert_eq!(response.text(), "ok");
    }

    #[tokio::test]
    async fn test_session_with_keeps_caller_builder_settings() {
        let (client, _temp_dir) = create_test_client();
        let url = "http://127.0.0.1:9/session";
        let call = CallDescriptor::new("session.get", vec![Arg::from(url)], Kwargs::new());
        client.cache().after_hook(&call, "from session", true).unwrap();

        let builder = Client::builder()
            .timeout(Duration::from_secs(2))
            .user_agent("httpio-test");
        let session = client.session_with(builder).expect("Session should build");
        let response = session.get(url, Kwargs::new()).await.unwrap();

        assert!(response.from_cache);
        assert_eq!(response.text(), "from session");
    }

    #[tokio::test]
    async fn test_read_csv_from_local_file_populates_cache() {
        let (client, temp_dir) = create_test_client();
        let path = temp_dir.path().join("prices.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "# generated").unwrap();
        writeln!(file, "hour;price").unwrap();
        writeln!(file, "1;20.5").unwrap();
        let source = path.to_string_lossy().to_string();

        let table = client
            .read_csv(source.as_str(), kwargs(json!({"sep": ";", "skiprows": 1})))
            .await
            .expect("Local CSV should parse");
        assert_eq!(table.column("price"), Some(vec!["20.5"]));

        std::fs::remove_file(&path).unwrap();
        let cached = client
            .read_csv(source.as_str(), kwargs(json!({"sep": ";", "skiprows": 1})))
            .await
            .expect("Second read should come from the cache");
        assert_eq!(cached, table);
    }

    #[tokio::test]
    async fn test_read_csv_from_archive_entry() {
        let (client, _temp_dir) = create_test_client();
        let entry = ArchiveEntry::new("day.csv", b"a,b\n1,2\n".to_vec());

        let table = client.read_csv(entry, Kwargs::new()).await.unwrap();

        assert_eq!(table.rows, vec![vec!["1".to_string(), "2".to_string()]]);
        assert!(client.cache().cache_dir().join("day_csv.csv").exists());
    }

    #[tokio::test]
    async fn test_read_csv_missing_file_is_an_error() {
        let (client, temp_dir) = create_test_client();
        let missing = temp_dir.path().join("missing.csv");

        let result = client
            .read_csv(missing.to_string_lossy().to_string(), Kwargs::new())
            .await;

        assert!(matches!(result, Err(FetchError::ReadFailed { .. })));
    }

    #[test]
    fn test_csv_options_validate_kwargs() {
        assert_eq!(
            CsvOptions::from_kwargs(&Kwargs::new()).unwrap(),
            CsvOptions { sep: ',', skiprows: 0 }
        );
        assert!(CsvOptions::from_kwargs(&kwargs(json!({"sep": ";;"}))).is_err());
        assert!(CsvOptions::from_kwargs(&kwargs(json!({"skiprows": -1}))).is_err());
    }

    #[test]
    fn test_apply_kwargs_builds_query_and_headers() {
        let client = Client::new();
        let request = apply_kwargs(
            client.get("https://h.com/x"),
            &kwargs(json!({
                "params": {"a": 1, "b": "two"},
                "headers": {"X-Key": "k"},
                "url": "ignored"
            })),
        )
        .unwrap()
        .build()
        .unwrap();

        assert_eq!(request.url().as_str(), "https://h.com/x?a=1&b=two");
        assert_eq!(request.headers().get("x-key").unwrap(), "k");
    }

    #[test]
    fn test_apply_kwargs_rejects_bad_values() {
        let client = Client::new();
        let result = apply_kwargs(client.get("https://h.com"), &kwargs(json!({"params": [1]})));
        assert!(matches!(
            result,
            Err(FetchError::InvalidKwarg { ref name, .. }) if name == "params"
        ));

        let result = apply_kwargs(client.get("https://h.com"), &kwargs(json!({"timeout": "soon"})));
        assert!(result.is_err());
    }

    #[test]
    fn test_skip_lines() {
        assert_eq!(skip_lines("a\nb\nc", 2), "c");
        assert_eq!(skip_lines("a", 3), "");
        assert_eq!(skip_lines("a\nb", 0), "a\nb");
    }
}
