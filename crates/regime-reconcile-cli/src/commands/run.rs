//! `run` command: compare every run pair with threshold and retry.
//!
//! # Output
//! - `<out>/<tally_name>`: one CSV row per pair, in processing order
//! - `<out>/<report_name>`: JSON report with per-pair attempts and status
//! - `<out>/<tag1>-<tag2>/`: intermediate artifacts for each pair
//! - stdout: one summary line

use std::path::PathBuf;

use clap::Args;
use tracing::{debug, info, warn};

use regime_reconcile_core::runs::ensure_dir;
use regime_reconcile_core::{
    check_dirs, pair_schedule, CancelToken, PairStatus, PipelineComparator, ReconcileConfig,
    ReconcileController, ReconcileResult, RetryPolicy, RunDirectory, RunReport, TallyLog,
};

use crate::error::{exit_code_for_error, CliExitCode};

/// Arguments for the `run` command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Output directory for the tally, report and pair directories
    #[arg(long)]
    pub out: PathBuf,

    /// TOML configuration file
    #[arg(long, env = "RECONCILE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding precomputed `<tag1>-<tag2>.lut` files
    #[arg(long)]
    pub lut_dir: Option<PathBuf>,

    /// Percent-difference threshold above which a pair is retried
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Attempts allowed per pair before giving up
    #[arg(long)]
    pub budget: Option<u32>,

    /// Run directories, in processing order
    #[arg(required = true, num_args = 1..)]
    pub runs: Vec<PathBuf>,
}

/// Execute the run command.
pub fn run_command(args: RunArgs) -> i32 {
    debug!("run_command: args={:?}", args);

    match execute(args) {
        Ok(report) => {
            println!(
                "compared {} pairs: {} accepted, {} accepted after retry, {} abandoned",
                report.pairs.len(),
                report.count_status(PairStatus::Accepted),
                report.count_status(PairStatus::AcceptedAfterRetry),
                report.count_status(PairStatus::Abandoned),
            );
            CliExitCode::Success.into()
        }
        Err(e) => exit_code_for_error("run", &e),
    }
}

fn load_config(args: &RunArgs) -> ReconcileResult<ReconcileConfig> {
    let mut config = match &args.config {
        Some(path) => ReconcileConfig::from_file(path)?,
        None => ReconcileConfig::default(),
    }
    .with_env_overrides();

    if let Some(dir) = &args.lut_dir {
        config.layout.lut_dir = Some(dir.clone());
    }
    if let Some(threshold) = args.threshold {
        config.retry.threshold = threshold;
    }
    if let Some(budget) = args.budget {
        config.retry.budget = budget;
    }
    config.validate()?;
    Ok(config)
}

fn execute(args: RunArgs) -> ReconcileResult<RunReport> {
    let config = load_config(&args)?;

    let runs: Vec<RunDirectory> = args.runs.iter().map(RunDirectory::new).collect();
    check_dirs(&runs)?;

    let pairs = pair_schedule(&runs, config.layout.include_self_pairs);
    if pairs.is_empty() {
        warn!(runs = runs.len(), "no run pairs to compare");
    }

    ensure_dir(&args.out)?;
    let tally_path = args.out.join(&config.layout.tally_name);
    let mut tally = TallyLog::create(&tally_path)?;

    let cancel = CancelToken::new();
    let mut comparator = PipelineComparator::new(&config, &args.out, cancel.clone())?;
    let mut controller = ReconcileController::new(RetryPolicy::from(&config.retry), cancel);

    info!(
        runs = runs.len(),
        pairs = pairs.len(),
        threshold = config.retry.threshold,
        budget = config.retry.budget,
        "starting reconciliation"
    );
    let report = controller.run(&pairs, &mut comparator, &mut tally)?;

    let report_path = args.out.join(&config.layout.report_name);
    report.write_to(&report_path)?;
    info!(
        tally = %tally_path.display(),
        report = %report_path.display(),
        "reconciliation finished"
    );
    Ok(report)
}
