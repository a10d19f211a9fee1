//! Core data models for intercepted fetch calls
//!
//! This module contains the types describing one intercepted call (method,
//! positional arguments, keyword arguments) and the values such calls produce:
//! HTTP responses, tables and archive entries.

pub mod archive;
pub mod response;
pub mod table;

pub use archive::{ArchiveEntry, ArchiveError};
pub use response::FetchedResponse;
pub use table::{Table, TableError};

use serde_json::{Map, Value};

/// Keyword arguments of a call, kept in insertion order
pub type Kwargs = Map<String, Value>;

/// Kind of content stored in a payload file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Raw bytes or text
    Data,
    /// Tabular data rendered as CSV
    Csv,
}

impl ContentKind {
    /// File suffix used for payloads of this kind
    pub fn suffix(&self) -> &'static str {
        match self {
            ContentKind::Data => "data",
            ContentKind::Csv => "csv",
        }
    }
}

/// The fetch methods whose results may be cached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    ReadCsv,
    ReadExcel,
    ReadHtml,
    SessionGet,
    SessionPost,
}

impl Method {
    /// Every cacheable method, in allow-list order
    pub const ALL: [Method; 7] = [
        Method::Get,
        Method::Post,
        Method::ReadCsv,
        Method::ReadExcel,
        Method::ReadHtml,
        Method::SessionGet,
        Method::SessionPost,
    ];

    /// Name of the method as it appears in metadata files
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Post => "post",
            Method::ReadCsv => "read_csv",
            Method::ReadExcel => "read_excel",
            Method::ReadHtml => "read_html",
            Method::SessionGet => "session.get",
            Method::SessionPost => "session.post",
        }
    }

    /// Looks up a method by name.
    ///
    /// Returns `None` for names outside the allow-list.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == name)
    }

    /// Content kind a cached result of this method is stored as
    pub fn content_kind(&self) -> ContentKind {
        match self {
            Method::ReadCsv | Method::ReadExcel | Method::ReadHtml => ContentKind::Csv,
            _ => ContentKind::Data,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A positional argument of an intercepted call
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// A string, usually the URL being fetched
    Text(String),
    /// An entry extracted from a zip archive
    Archive(ArchiveEntry),
    /// Any other JSON-representable value
    Json(Value),
    /// A value with no JSON form, identified only by its type name
    Opaque { type_name: String },
}

impl Arg {
    /// Creates an opaque argument for a value that cannot be recorded as JSON
    pub fn opaque<T: ?Sized>() -> Self {
        Arg::Opaque {
            type_name: std::any::type_name::<T>().to_string(),
        }
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Text(s.to_string())
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::Text(s)
    }
}

impl From<ArchiveEntry> for Arg {
    fn from(entry: ArchiveEntry) -> Self {
        Arg::Archive(entry)
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => Arg::Text(s),
            other => Arg::Json(other),
        }
    }
}

/// Everything known about one intercepted call
///
/// The method is kept as a plain name so that calls outside the allow-list
/// can still be described (and rejected) by the cache adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct CallDescriptor {
    /// Name of the intercepted method (e.g. "get", "session.post")
    pub method: String,
    /// Positional arguments, the first one conventionally identifying the source
    pub args: Vec<Arg>,
    /// Keyword arguments in the order they were given
    pub kwargs: Kwargs,
}

impl CallDescriptor {
    /// Creates a new call descriptor
    pub fn new(method: impl Into<String>, args: Vec<Arg>, kwargs: Kwargs) -> Self {
        Self {
            method: method.into(),
            args,
            kwargs,
        }
    }

    /// The allow-listed method this call targets, if any
    pub fn allowed_method(&self) -> Option<Method> {
        Method::from_name(&self.method)
    }

    /// Returns the string identifying the fetched source.
    ///
    /// The first positional argument wins when it is a string or an archive
    /// entry; otherwise a string `url` keyword argument is used.
    pub fn source(&self) -> Option<&str> {
        match self.args.first() {
            Some(Arg::Text(url)) => Some(url),
            Some(Arg::Archive(entry)) => Some(entry.name()),
            _ => self.kwargs.get("url").and_then(Value::as_str),
        }
    }
}
