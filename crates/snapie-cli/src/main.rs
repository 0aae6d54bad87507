//! # snapie CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use snapie_cli::cid::{run_cid, run_gateways, CidArgs, GatewaysArgs};
use snapie_cli::fetch::{run_fetch, FetchArgs};
use snapie_cli::records::{run_expired, run_queue, ListArgs};

/// Snapie audio operator tool.
///
/// Gateway settings come from the same `IPFS_*` variables as the API
/// service; `queue` and `expired` read `DATABASE_URL`.
#[derive(Parser, Debug)]
#[command(name = "snapie", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify a content identifier as v0 or v1.
    Cid(CidArgs),

    /// List gateway URLs for a CID in the order they would be tried.
    Gateways(GatewaysArgs),

    /// Fetch a CID through the public gateways and write it to a file.
    Fetch(FetchArgs),

    /// Show records due for migration.
    Queue(ListArgs),

    /// Show ephemeral records whose pin has expired.
    Expired(ListArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Commands::Cid(args) => run_cid(args),
        Commands::Gateways(args) => run_gateways(args),
        Commands::Fetch(args) => run_fetch(args).await,
        Commands::Queue(args) => run_queue(args).await,
        Commands::Expired(args) => run_expired(args).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}
