//! Training run directories and the pair schedule.
//!
//! Each run directory holds the artifacts of one independent training. Runs
//! are named so that the last two characters of the directory name identify
//! them (`SOM_5x5_4_00724_3_02` is run `02`). Every ordered pair `(i, j)` with
//! `j > i` is compared once; its outputs go to `<out>/<tag_i>-<tag_j>/`.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::LayoutConfig;
use crate::error::{ReconcileError, ReconcileResult};

/// Characters of the directory name used as the run tag.
pub const TAG_LEN: usize = 2;

/// One training run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDirectory {
    path: PathBuf,
    tag: String,
}

impl RunDirectory {
    /// Wrap `path`, deriving the tag from its final component.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let tag = derive_tag(&path);
        Self { path, tag }
    }

    /// Directory path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run tag, e.g. `02`.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Path of an artifact inside the run.
    pub fn artifact(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

fn derive_tag(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().trim_end_matches('/').to_string());
    let chars: Vec<char> = name.chars().collect();
    let start = chars.len().saturating_sub(TAG_LEN);
    chars[start..].iter().collect()
}

/// `"<tag1>-<tag2>"`, naming a pair in the tally and on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairTag {
    /// Tag of the first run
    pub first: String,
    /// Tag of the second run
    pub second: String,
}

impl fmt::Display for PairTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.first, self.second)
    }
}

/// Two runs scheduled for comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPair {
    /// Run whose weather labels are transcribed and reclustered
    pub first: RunDirectory,
    /// Run whose clustering is the comparison target
    pub second: RunDirectory,
    /// Position of `first` in the run list
    pub first_index: usize,
    /// Position of `second` in the run list
    pub second_index: usize,
}

impl RunPair {
    /// Pair tag.
    pub fn tag(&self) -> PairTag {
        PairTag {
            first: self.first.tag().to_string(),
            second: self.second.tag().to_string(),
        }
    }

    /// Comparing a run against itself.
    pub fn is_self_pair(&self) -> bool {
        self.first_index == self.second_index
    }

    /// Output directory of this pair under `out`.
    pub fn output_dir(&self, out: &Path) -> PathBuf {
        out.join(self.tag().to_string())
    }
}

/// Every pair `(i, j)` with `j > i`, in row order. With `include_self`,
/// `(i, i)` precedes the pairs starting at `i`.
pub fn pair_schedule(runs: &[RunDirectory], include_self: bool) -> Vec<RunPair> {
    let mut pairs = Vec::new();
    for i in 0..runs.len() {
        let start = if include_self { i } else { i + 1 };
        for j in start..runs.len() {
            pairs.push(RunPair {
                first: runs[i].clone(),
                second: runs[j].clone(),
                first_index: i,
                second_index: j,
            });
        }
    }
    pairs
}

/// Fail with `MissingDirectory` for the first run that is not a directory.
pub fn check_dirs(runs: &[RunDirectory]) -> ReconcileResult<()> {
    for run in runs {
        if !run.path().is_dir() {
            return Err(ReconcileError::MissingDirectory {
                path: run.path().to_path_buf(),
            });
        }
    }
    debug!(count = runs.len(), "run directories present");
    Ok(())
}

/// Create `dir` (and parents) if needed.
pub fn ensure_dir(dir: &Path) -> ReconcileResult<()> {
    fs::create_dir_all(dir).map_err(|e| ReconcileError::io(dir, e))
}

/// Copy artifacts of both runs that the pair directory keeps for reference:
/// both cluster renders (when present) and the second run's cluster image.
///
/// Returns the path of the copied second cluster image.
pub fn copy_pair_artifacts(
    pair: &RunPair,
    pair_dir: &Path,
    layout: &LayoutConfig,
) -> ReconcileResult<PathBuf> {
    let renders = [
        (&pair.first, "first_"),
        (&pair.second, "second_"),
    ];
    for (run, prefix) in renders {
        let src = run.artifact(&layout.cluster_render);
        if src.is_file() {
            let dst = pair_dir.join(format!("{}{}", prefix, layout.cluster_render));
            fs::copy(&src, &dst).map_err(|e| ReconcileError::io(&src, e))?;
        } else {
            debug!(path = %src.display(), "no cluster render to copy");
        }
    }

    let src = pair.second.artifact(&layout.cluster_image);
    let dst = pair_dir.join(format!("second_{}", layout.cluster_image));
    fs::copy(&src, &dst).map_err(|e| ReconcileError::io(&src, e))?;
    info!(pair = %pair.tag(), dir = %pair_dir.display(), "prepared pair directory");
    Ok(dst)
}
