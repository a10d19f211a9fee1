//! Command-line interface parsing for httpio
//!
//! This module handles parsing of CLI arguments using clap and turns
//! `KEY=VALUE` options into the keyword arguments of a fetch call.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;
use thiserror::Error;

use crate::data::Kwargs;

/// Error types for CLI argument handling
#[derive(Debug, Error)]
pub enum CliError {
    /// A `KEY=VALUE` option had no `=`
    #[error("Invalid pair: '{0}'. Expected KEY=VALUE")]
    InvalidPair(String),

    /// The `--json` body is not valid JSON
    #[error("Invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// httpio - fetch URLs and CSV files through a transparent on-disk cache
#[derive(Parser, Debug)]
#[command(name = "httpio")]
#[command(about = "Fetch URLs and CSV files through a transparent on-disk cache")]
#[command(version)]
pub struct Cli {
    /// Cache root directory (defaults to the system temp directory)
    #[arg(long, global = true, env = "HTTPIO_CACHE_DIR", value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Log cache hits, misses and writes to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send a GET request and print the body
    Get {
        url: String,
        /// Query parameter, repeatable
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
        /// Request header, repeatable
        #[arg(long = "header", value_name = "KEY=VALUE")]
        headers: Vec<String>,
    },
    /// Send a POST request and print the body
    Post {
        url: String,
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
        #[arg(long = "header", value_name = "KEY=VALUE")]
        headers: Vec<String>,
        /// Raw request body
        #[arg(long, conflicts_with = "json")]
        data: Option<String>,
        /// JSON request body
        #[arg(long)]
        json: Option<String>,
    },
    /// Read a CSV file, URL or archive entry and print it as CSV
    ReadCsv {
        /// URL, local path, or entry name when --archive is given
        source: String,
        /// Zip archive containing SOURCE
        #[arg(long, value_name = "ZIP")]
        archive: Option<PathBuf>,
        /// Field delimiter of the input
        #[arg(long, default_value_t = ',')]
        sep: char,
    },
    /// Print the cache path a call would be stored under
    Key {
        /// Method name, e.g. get, post, read_csv, session.get
        method: String,
        url: String,
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
        /// Payload suffix (data, csv, metadata.json)
        #[arg(long, default_value = "data")]
        suffix: String,
    },
}

/// Configuration derived from CLI arguments for application startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupConfig {
    /// Cache root directory
    pub cache_dir: PathBuf,
    /// Whether debug diagnostics are enabled
    pub verbose: bool,
}

impl StartupConfig {
    /// Creates a StartupConfig from parsed CLI arguments.
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            cache_dir: cli.cache_dir.clone().unwrap_or_else(std::env::temp_dir),
            verbose: cli.verbose,
        }
    }
}

/// Parses a `KEY=VALUE` argument.
///
/// # Returns
/// * `Ok((key, value))`, splitting at the first `=`
/// * `Err(CliError::InvalidPair)` if there is no `=`
pub fn parse_pair(s: &str) -> Result<(String, String), CliError> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| CliError::InvalidPair(s.to_string()))
}

/// Builds request kwargs from CLI options.
///
/// Keys are inserted in a fixed order (`params`, `headers`, `data`, `json`)
/// so the same command line always maps to the same cache path.
pub fn build_kwargs(
    params: &[String],
    headers: &[String],
    data: Option<&str>,
    json: Option<&str>,
) -> Result<Kwargs, CliError> {
    let mut kwargs = Kwargs::new();
    if !params.is_empty() {
        kwargs.insert("params".to_string(), pairs_object(params)?);
    }
    if !headers.is_empty() {
        kwargs.insert("headers".to_string(), pairs_object(headers)?);
    }
    if let Some(data) = data {
        kwargs.insert("data".to_string(), Value::String(data.to_string()));
    }
    if let Some(json) = json {
        kwargs.insert("json".to_string(), serde_json::from_str(json)?);
    }
    Ok(kwargs)
}

fn pairs_object(pairs: &[String]) -> Result<Value, CliError> {
    let mut object = serde_json::Map::new();
    for pair in pairs {
        let (k, v) = parse_pair(pair)?;
        object.insert(k, Value::String(v));
    }
    Ok(Value::Object(object))
}
