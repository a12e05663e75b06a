//! `search` command: exhaustive permutation search.
//!
//! Tries every permutation of `0..nlabels` as the candidate's lookup table
//! and prints the best one followed by its score. Cost is `nlabels!`
//! evaluations; progress is logged at info level.

use std::path::PathBuf;

use clap::Args;
use tracing::{debug, info};

use regime_reconcile_core::permutation::{
    SearchOutcome, DEFAULT_MAX_EXHAUSTIVE_LABELS, DEFAULT_PROGRESS_INTERVAL,
};
use regime_reconcile_core::source::{ArraySource, NpyArraySource};
use regime_reconcile_core::{CancelToken, DiffResult, PermutationSearcher, ReconcileResult};

use crate::error::{exit_code_for_error, CliExitCode};

/// Arguments for the `search` command
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Reference label image (`.npy`)
    pub reference: PathBuf,

    /// Candidate label image (`.npy`)
    pub candidate: PathBuf,

    /// Number of labels to permute
    #[arg(long)]
    pub nlabels: usize,

    /// Largest label count accepted
    #[arg(long, default_value_t = DEFAULT_MAX_EXHAUSTIVE_LABELS)]
    pub max_labels: usize,

    /// Shard the search across all cores
    #[arg(long)]
    pub parallel: bool,
}

/// Execute the search command.
pub fn search_command(args: SearchArgs) -> i32 {
    debug!("search_command: args={:?}", args);

    match execute(&args) {
        Ok((outcome, result)) => {
            println!("{}", outcome.lut);
            println!("{}", result);
            CliExitCode::Success.into()
        }
        Err(e) => exit_code_for_error("search", &e),
    }
}

fn execute(args: &SearchArgs) -> ReconcileResult<(SearchOutcome, DiffResult)> {
    let source = NpyArraySource::new();
    let reference = source.load_label_image(&args.reference)?;
    let candidate = source.load_label_image(&args.candidate)?;

    let searcher = PermutationSearcher::new(args.max_labels, DEFAULT_PROGRESS_INTERVAL)
        .with_parallel(args.parallel);
    let outcome = searcher.search(&reference, &candidate, args.nlabels, &CancelToken::new())?;

    let result = DiffResult::from_count(outcome.count, reference.pixel_count());
    info!(
        evaluated = outcome.evaluated,
        count = outcome.count,
        lut = %outcome.lut,
        "exhaustive search finished"
    );
    Ok((outcome, result))
}
