//! Neuron (prototype) table parsing.
//!
//! A SOM training run writes its neuron weights as a text artifact:
//!
//! ```text
//! ... free-form preamble ...
//! NEURONS
//! <nlabels> <ndims>
//! <label_id> <w_1> <w_2> ... <w_ndims>
//! ...                                   (nlabels rows)
//! ```
//!
//! The row position is the label value; the leading label id token is
//! skipped. Tokens beyond `ndims` are ignored. At most [`MAX_LABELS`] rows
//! are accepted and every weight must be finite.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ReconcileError, ReconcileResult};
use crate::lut::MAX_LABELS;

/// Marker token that precedes the table header.
pub const NEURONS_MARKER: &str = "NEURONS";

/// Ordered prototype vectors, one per label.
///
/// Invariant: every vector has length `ndims`.
#[derive(Clone, Debug, PartialEq)]
pub struct NeuronTable {
    vectors: Vec<Vec<f64>>,
    ndims: usize,
}

impl NeuronTable {
    /// Build a table from in-memory vectors.
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` if the vectors do not all share one length.
    pub fn from_vectors(vectors: Vec<Vec<f64>>) -> ReconcileResult<Self> {
        let ndims = vectors.first().map_or(0, Vec::len);
        if let Some(bad) = vectors.iter().find(|v| v.len() != ndims) {
            return Err(ReconcileError::shape_mismatch(
                "neuron vector dimensions",
                ndims,
                bad.len(),
            ));
        }
        Ok(Self { vectors, ndims })
    }

    /// Parse a neuron artifact from disk.
    pub fn from_file(path: impl AsRef<Path>) -> ReconcileResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| ReconcileError::io(path, e))?;
        let table = Self::parse(BufReader::new(file), path)?;
        debug!(
            path = %path.display(),
            nlabels = table.nlabels(),
            ndims = table.ndims(),
            "parsed neuron table"
        );
        Ok(table)
    }

    /// Parse a neuron artifact from any buffered reader.
    ///
    /// `origin` is only used in error messages.
    pub fn parse<R: BufRead>(reader: R, origin: impl Into<PathBuf>) -> ReconcileResult<Self> {
        let origin = origin.into();
        let mut lines = reader.lines();

        let mut found = false;
        for line in lines.by_ref() {
            let line = line.map_err(|e| ReconcileError::io(&origin, e))?;
            if line.contains(NEURONS_MARKER) {
                found = true;
                break;
            }
        }
        if !found {
            return Err(ReconcileError::MissingHeader { path: origin });
        }

        let header = match lines.next() {
            Some(line) => line.map_err(|e| ReconcileError::io(&origin, e))?,
            None => String::new(),
        };
        let (nlabels, ndims) = parse_header(&header)
            .filter(|&(nlabels, _)| nlabels <= MAX_LABELS)
            .ok_or_else(|| ReconcileError::MalformedHeader {
                path: origin.clone(),
                line: header.clone(),
            })?;

        let expected = ndims.checked_add(1).ok_or_else(|| ReconcileError::MalformedHeader {
            path: origin.clone(),
            line: header.clone(),
        })?;
        let mut vectors = Vec::with_capacity(nlabels);
        for row in 0..nlabels {
            let line = match lines.next() {
                Some(line) => line.map_err(|e| ReconcileError::io(&origin, e))?,
                None => {
                    return Err(ReconcileError::MalformedRow {
                        path: origin,
                        row,
                        expected,
                        found: 0,
                    })
                }
            };

            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < expected {
                return Err(ReconcileError::MalformedRow {
                    path: origin,
                    row,
                    expected,
                    found: tokens.len(),
                });
            }

            // tokens[0] is the label id
            let weights = tokens[1..expected]
                .iter()
                .map(|t| t.parse::<f64>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| {
                    ReconcileError::format(&origin, format!("row {}: bad weight: {}", row, e))
                })?;
            if let Some(w) = weights.iter().position(|w| !w.is_finite()) {
                return Err(ReconcileError::format(
                    &origin,
                    format!("row {}: weight {} is not finite", row, w),
                ));
            }
            vectors.push(weights);
        }

        Ok(Self { vectors, ndims })
    }

    /// Number of labels (rows).
    #[inline]
    pub fn nlabels(&self) -> usize {
        self.vectors.len()
    }

    /// Dimensionality shared by all vectors.
    #[inline]
    pub fn ndims(&self) -> usize {
        self.ndims
    }

    /// Prototype vector of `label`.
    #[inline]
    pub fn vector(&self, label: usize) -> Option<&[f64]> {
        self.vectors.get(label).map(Vec::as_slice)
    }

    /// All vectors in label order.
    pub fn vectors(&self) -> &[Vec<f64>] {
        &self.vectors
    }

    /// Fail with `ShapeMismatch` unless `other` has the same label count and
    /// dimensionality.
    pub fn ensure_compatible(&self, other: &NeuronTable) -> ReconcileResult<()> {
        if self.nlabels() != other.nlabels() {
            return Err(ReconcileError::shape_mismatch(
                "number of labels",
                self.nlabels(),
                other.nlabels(),
            ));
        }
        if self.ndims() != other.ndims() {
            return Err(ReconcileError::shape_mismatch(
                "number of dimensions",
                self.ndims(),
                other.ndims(),
            ));
        }
        Ok(())
    }
}

fn parse_header(line: &str) -> Option<(usize, usize)> {
    let mut it = line.split_whitespace();
    let nlabels = it.next()?.parse().ok()?;
    let ndims = it.next()?.parse().ok()?;
    Some((nlabels, ndims))
}
