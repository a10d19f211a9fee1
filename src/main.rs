//! httpio - fetch URLs and CSV files through a transparent on-disk cache

use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use httpio::cache::derive_path;
use httpio::cli::{build_kwargs, Cli, Command, StartupConfig};
use httpio::{Arg, CallDescriptor, FetchedResponse, FileCacheAdapter, HttpioClient, Kwargs};

/// Sets up stderr diagnostics, honouring `RUST_LOG` when present
fn init_tracing(verbose: bool) {
    let log_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .init();
}

fn write_body(response: &FetchedResponse) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(&response.body)?;
    stdout.flush()
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = StartupConfig::from_cli(&cli);
    let cache = FileCacheAdapter::with_dir(config.cache_dir);

    match cli.command {
        Command::Key {
            method,
            url,
            params,
            suffix,
        } => {
            let kwargs = build_kwargs(&params, &[], None, None)?;
            let call = CallDescriptor::new(method, vec![Arg::from(url)], kwargs);
            println!("{}", derive_path(cache.cache_dir(), &call, &suffix)?.display());
        }
        Command::Get { url, params, headers } => {
            let kwargs = build_kwargs(&params, &headers, None, None)?;
            let response = HttpioClient::new(cache).get(&url, kwargs).await?;
            write_body(&response)?;
        }
        Command::Post {
            url,
            params,
            headers,
            data,
            json,
        } => {
            let kwargs = build_kwargs(&params, &headers, data.as_deref(), json.as_deref())?;
            let response = HttpioClient::new(cache).post(&url, kwargs).await?;
            write_body(&response)?;
        }
        Command::ReadCsv {
            source,
            archive,
            sep,
        } => {
            let mut kwargs = Kwargs::new();
            if sep != ',' {
                kwargs.insert("sep".to_string(), sep.to_string().into());
            }
            let client = HttpioClient::new(cache);
            let table = match archive {
                Some(archive) => client.read_csv_from_archive(&archive, &source, kwargs).await?,
                None => client.read_csv(source, kwargs).await?,
            };
            print!("{}", table.to_csv());
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
