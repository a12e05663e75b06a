//! `match` command: match two neuron tables.
//!
//! Prints the lookup table as one comma-separated line. Entry `i` is the
//! label of the first table's neuron nearest to the second table's neuron
//! `i`, so applying the table to the second run's labels renumbers them into
//! the first run's numbering.

use std::path::PathBuf;

use clap::Args;
use tracing::{debug, info};

use regime_reconcile_core::matcher::DistanceMetric;
use regime_reconcile_core::{LookupTable, MatchStrategy, NeuronTable, ReconcileResult};

use crate::error::{exit_code_for_error, CliExitCode};

/// Arguments for the `match` command
#[derive(Args, Debug)]
pub struct MatchArgs {
    /// Reference neuron table
    pub reference: PathBuf,

    /// Candidate neuron table, renumbered into the reference's labels
    pub candidate: PathBuf,

    /// Matching strategy
    #[arg(long, default_value = "greedy", value_parser = parse_table_strategy)]
    pub strategy: MatchStrategy,

    /// Also write the lookup table to this file
    #[arg(long)]
    pub write: Option<PathBuf>,
}

/// Strategies that operate on neuron tables.
fn parse_table_strategy(s: &str) -> Result<MatchStrategy, String> {
    match s.parse::<MatchStrategy>()? {
        MatchStrategy::Exhaustive => {
            Err("exhaustive matching works on label images; use the search command".to_string())
        }
        strategy => Ok(strategy),
    }
}

/// Execute the match command.
pub fn match_command(args: MatchArgs) -> i32 {
    debug!("match_command: args={:?}", args);

    match execute(&args) {
        Ok(lut) => {
            println!("{}", lut);
            CliExitCode::Success.into()
        }
        Err(e) => exit_code_for_error("match", &e),
    }
}

fn execute(args: &MatchArgs) -> ReconcileResult<LookupTable> {
    let reference = NeuronTable::from_file(&args.reference)?;
    let candidate = NeuronTable::from_file(&args.candidate)?;

    let lut = args
        .strategy
        .table_matcher(DistanceMetric::Euclidean)
        .match_tables(&reference, &candidate)?;
    info!(
        strategy = args.strategy.as_str(),
        nlabels = lut.len(),
        identity = lut.is_identity(),
        "matched neuron tables"
    );

    if let Some(path) = &args.write {
        lut.write_to(path)?;
        info!(path = %path.display(), "wrote lookup table");
    }
    Ok(lut)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_table_strategy() {
        assert_eq!(parse_table_strategy("greedy"), Ok(MatchStrategy::Greedy));
        assert_eq!(parse_table_strategy("optimal"), Ok(MatchStrategy::Optimal));
        assert!(parse_table_strategy("exhaustive").is_err());
        assert!(parse_table_strategy("nearest").is_err());
    }
}
