//! tlens CLI binary entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use typelens::cli::{run_ingest, run_query, run_stats};
use typelens::output::ErrorResponse;

/// Offline inspector for type-fragment dumps of an instrumented fleet.
#[derive(Parser)]
#[command(name = "tlens")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Fragment dump files (JSON arrays of type fragments)
    #[arg(long = "from", global = true)]
    from: Vec<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay fragment files and report merge totals.
    Ingest,

    /// Query the replayed cache by FQN pattern.
    Query {
        /// FQN or pattern with `*` wildcards
        pattern: String,

        /// Only report initialized types
        #[arg(long)]
        initialized_only: bool,

        /// Kind filter: class, interface, annotation, exception
        #[arg(long)]
        kind: Option<String>,
    },

    /// Report statistics of the replayed cache.
    Stats,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Ingest => run_ingest(&cli.from),
        Commands::Query {
            pattern,
            initialized_only,
            kind,
        } => run_query(&cli.from, &pattern, initialized_only, kind.as_deref()),
        Commands::Stats => run_stats(&cli.from),
    };

    match result {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(err) => {
            let response = ErrorResponse::new(err.error_code(), err.to_string());
            match serde_json::to_string(&response) {
                Ok(json) => eprintln!("{}", json),
                Err(_) => eprintln!("{}", err),
            }
            ExitCode::from(err.error_code().code())
        }
    }
}
