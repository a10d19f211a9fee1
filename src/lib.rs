//! httpio - transparent on-disk cache for fetch calls
//!
//! Intercepts HTTP GET/POST and CSV reads, stores their results under a cache
//! root keyed by URL and keyword arguments, and serves repeated calls from
//! disk.
//!
//! ```ignore
//! use httpio::{FileCacheAdapter, HttpioClient, Kwargs};
//!
//! let client = HttpioClient::new(FileCacheAdapter::with_dir("/tmp/httpio".into()));
//! let response = client.get("https://api.example.com/data?x=1", Kwargs::new()).await?;
//! // A second identical call is answered from /tmp/httpio/api.example.com/_data_x_1.data
//! ```

pub mod cache;
pub mod cli;
pub mod data;
pub mod dispatch;

pub use cache::{CacheError, Cacheable, FileCacheAdapter, HookOutcome};
pub use data::{Arg, ArchiveEntry, CallDescriptor, FetchedResponse, Kwargs, Method, Table};
pub use dispatch::{FetchError, HttpioClient, Session};
