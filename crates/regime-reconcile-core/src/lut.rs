//! Lookup tables (LUTs) between two label numberings.
//!
//! `lut[source] = target`. A LUT produced by matching a reference against a
//! candidate maps candidate labels onto reference labels, so transcribing the
//! candidate image through it makes the two images directly comparable.
//!
//! The persisted form is a single line of comma-separated integers:
//!
//! ```text
//! 3,0,1,2
//! ```

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use ndarray::{Array, Dimension};

use crate::error::{ReconcileError, ReconcileResult};

/// Largest table a `u8` label image can use.
pub const MAX_LABELS: usize = 256;

/// Label relabeling table.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LookupTable {
    targets: Vec<u8>,
}

impl LookupTable {
    /// The standard 1-to-1 table of `nlabels` entries.
    ///
    /// # Errors
    ///
    /// `InvalidLut` if `nlabels` is 0 or exceeds [`MAX_LABELS`].
    pub fn identity(nlabels: usize) -> ReconcileResult<Self> {
        check_len(nlabels)?;
        Ok(Self {
            targets: (0..nlabels).map(|i| i as u8).collect(),
        })
    }

    /// Build a table from explicit targets.
    ///
    /// Targets must lie in `0..len`. Bijectivity is not required here; use
    /// [`LookupTable::is_bijective`] when it matters.
    pub fn from_targets(targets: Vec<usize>) -> ReconcileResult<Self> {
        let n = targets.len();
        check_len(n)?;
        let targets = targets
            .into_iter()
            .enumerate()
            .map(|(i, t)| {
                if t >= n {
                    Err(ReconcileError::invalid_lut(format!(
                        "entry {} maps to {} but the table has {} entries",
                        i, t, n
                    )))
                } else {
                    Ok(t as u8)
                }
            })
            .collect::<ReconcileResult<Vec<u8>>>()?;
        Ok(Self { targets })
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Always false for a constructed table; present for API symmetry.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Target of `source`, if in range.
    #[inline]
    pub fn get(&self, source: usize) -> Option<usize> {
        self.targets.get(source).map(|&t| t as usize)
    }

    /// Targets as `usize` in source order.
    pub fn targets(&self) -> Vec<usize> {
        self.targets.iter().map(|&t| t as usize).collect()
    }

    /// Whether every entry maps to itself.
    pub fn is_identity(&self) -> bool {
        self.targets.iter().enumerate().all(|(i, &t)| i == t as usize)
    }

    /// Whether the table is a permutation of `0..len`.
    pub fn is_bijective(&self) -> bool {
        let mut seen = vec![false; self.targets.len()];
        for &t in &self.targets {
            let t = t as usize;
            if seen[t] {
                return false;
            }
            seen[t] = true;
        }
        true
    }

    /// Inverse permutation.
    ///
    /// # Errors
    ///
    /// `InvalidLut` if the table is not bijective.
    pub fn inverse(&self) -> ReconcileResult<Self> {
        if !self.is_bijective() {
            return Err(ReconcileError::invalid_lut(
                "only a bijective table can be inverted",
            ));
        }
        let mut inv = vec![0u8; self.targets.len()];
        for (source, &target) in self.targets.iter().enumerate() {
            inv[target as usize] = source as u8;
        }
        Ok(Self { targets: inv })
    }

    /// Relabel every element of `labels` through the table.
    ///
    /// # Errors
    ///
    /// `LabelOutOfRange` for the first element with no entry.
    pub fn transcribe<D: Dimension>(&self, labels: &Array<u8, D>) -> ReconcileResult<Array<u8, D>> {
        if let Some(&bad) = labels.iter().find(|&&l| l as usize >= self.targets.len()) {
            return Err(ReconcileError::LabelOutOfRange {
                label: bad as usize,
                nlabels: self.targets.len(),
            });
        }
        Ok(labels.mapv(|l| self.targets[l as usize]))
    }

    /// Read a persisted table.
    pub fn read_from(path: impl AsRef<Path>) -> ReconcileResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| ReconcileError::io(path, e))?;
        let first = text.lines().next().unwrap_or("");
        first.parse::<Self>().map_err(|e| match e {
            ReconcileError::InvalidLut { reason } => {
                ReconcileError::format(path, format!("invalid lookup table: {}", reason))
            }
            other => other,
        })
    }

    /// Persist the table as one comma-separated line.
    pub fn write_to(&self, path: impl AsRef<Path>) -> ReconcileResult<()> {
        let path = path.as_ref();
        fs::write(path, format!("{}\n", self)).map_err(|e| ReconcileError::io(path, e))
    }
}

impl fmt::Display for LookupTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, t) in self.targets.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", t)?;
        }
        Ok(())
    }
}

impl FromStr for LookupTable {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let targets = s
            .trim()
            .split(',')
            .map(|item| {
                item.trim().parse::<usize>().map_err(|e| {
                    ReconcileError::invalid_lut(format!("bad entry '{}': {}", item.trim(), e))
                })
            })
            .collect::<ReconcileResult<Vec<usize>>>()?;
        Self::from_targets(targets)
    }
}

fn check_len(n: usize) -> ReconcileResult<()> {
    if n == 0 {
        return Err(ReconcileError::invalid_lut("table must not be empty"));
    }
    if n > MAX_LABELS {
        return Err(ReconcileError::invalid_lut(format!(
            "{} entries exceed the maximum of {}",
            n, MAX_LABELS
        )));
    }
    Ok(())
}
