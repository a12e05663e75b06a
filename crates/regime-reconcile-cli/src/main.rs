//! Regime Reconcile CLI
//!
//! Command-line driver for reconciling the label numbering of independently
//! trained SOM weather-regime maps.
//!
//! # Commands
//!
//! - `run`: compare every pair of run directories, retrying noisy pairs, and
//!   write the tally and JSON report
//! - `match`: match two neuron tables and print the lookup table
//! - `diff`: score two label images under a lookup table
//! - `search`: exhaustive permutation search over two label images
//!
//! Exit codes: 0 success, 1 failure (missing directories, I/O, trainer),
//! 2 invalid input (malformed artifacts, shape mismatches).

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod error;

pub use error::{exit_code_for_error, CliExitCode};

/// Regime Reconcile - SOM label reconciliation and agreement scoring
#[derive(Parser)]
#[command(name = "regime-reconcile")]
#[command(author = "Regime Reconcile Team")]
#[command(version = "0.1.0")]
#[command(about = "Reconcile label numbering across SOM trainings and score their agreement")]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare all run pairs with threshold and retry
    Run(commands::run::RunArgs),
    /// Match two neuron tables into a lookup table
    Match(commands::match_cmd::MatchArgs),
    /// Count differing pixels between two label images
    Diff(commands::diff::DiffArgs),
    /// Exhaustively search the best lookup table between two label images
    Search(commands::search::SearchArgs),
}

fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let exit_code = match cli.command {
        Commands::Run(args) => commands::run::run_command(args),
        Commands::Match(args) => commands::match_cmd::match_command(args),
        Commands::Diff(args) => commands::diff::diff_command(args),
        Commands::Search(args) => commands::search::search_command(args),
    };

    std::process::exit(exit_code);
}
