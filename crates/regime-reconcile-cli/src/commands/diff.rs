//! `diff` command: count differing pixels between two label images.
//!
//! The candidate is transcribed through the lookup table (identity when none
//! is given) before comparison. Output format:
//!
//! ```text
//! num of diff pixels=<count>, % diff=<percent>
//! ```

use std::path::{Path, PathBuf};

use clap::Args;
use tracing::{debug, info};

use regime_reconcile_core::diff::ScoredDiff;
use regime_reconcile_core::render::{Palette, PngRenderer, Renderer};
use regime_reconcile_core::runs::ensure_dir;
use regime_reconcile_core::source::{ArraySource, NpyArraySource};
use regime_reconcile_core::{DiffScorer, LabelImage, LookupTable, ReconcileResult};

use crate::error::{exit_code_for_error, CliExitCode};

/// Arguments for the `diff` command
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Reference label image (`.npy`)
    pub reference: PathBuf,

    /// Candidate label image (`.npy`)
    pub candidate: PathBuf,

    /// Lookup table applied to the candidate
    #[arg(long)]
    pub lut: Option<PathBuf>,

    /// Write `transcribed.png` and `diff_pixels.png` here
    #[arg(long)]
    pub render_dir: Option<PathBuf>,
}

/// Execute the diff command.
pub fn diff_command(args: DiffArgs) -> i32 {
    debug!("diff_command: args={:?}", args);

    match execute(&args) {
        Ok(scored) => {
            println!("{}", scored.result);
            CliExitCode::Success.into()
        }
        Err(e) => exit_code_for_error("diff", &e),
    }
}

/// Identity table covering every label present in either image.
fn identity_for(reference: &LabelImage, candidate: &LabelImage) -> ReconcileResult<LookupTable> {
    let max = reference.max_label().max(candidate.max_label()).unwrap_or(0);
    LookupTable::identity(usize::from(max) + 1)
}

fn execute(args: &DiffArgs) -> ReconcileResult<ScoredDiff> {
    let source = NpyArraySource::new();
    let reference = source.load_label_image(&args.reference)?;
    let candidate = source.load_label_image(&args.candidate)?;

    let lut = match &args.lut {
        Some(path) => LookupTable::read_from(path)?,
        None => identity_for(&reference, &candidate)?,
    };
    let scored = DiffScorer::new().score_with_mask(&reference, &candidate, &lut)?;
    info!(
        count = scored.result.count,
        percent = scored.result.percent,
        pixels = reference.pixel_count(),
        "scored label images"
    );

    if let Some(dir) = &args.render_dir {
        render(dir, &scored, lut.len())?;
    }
    Ok(scored)
}

fn render(dir: &Path, scored: &ScoredDiff, nlabels: usize) -> ReconcileResult<()> {
    ensure_dir(dir)?;
    let renderer = PngRenderer::new();
    renderer.render(
        &scored.transcribed,
        &Palette::rainbow(nlabels),
        &dir.join("transcribed.png"),
    )?;
    renderer.render(&scored.mask, &Palette::highlight(), &dir.join("diff_pixels.png"))?;
    info!(dir = %dir.display(), "wrote renders");
    Ok(())
}
