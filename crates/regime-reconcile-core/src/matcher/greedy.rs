//! Greedy nearest-unique-neighbor matching.
//!
//! # Algorithm
//!
//! 1. Compute the pairwise distance matrix `d[j][i]` between reference
//!    vector `j` and candidate vector `i`.
//! 2. For N rounds, take the smallest entry whose row and column are both
//!    still free. Ties go to the first entry in row-major order.
//! 3. Mark the row and column used and record `lut[i] = j`.
//!
//! This is an approximation: it does not minimize the total distance. It is
//! O(N^3) for N labels, which is fine for label counts in the tens.

use tracing::{debug, trace};

use super::metric::{finite_distance_matrix, DistanceMetric};
use super::LabelMatcher;
use crate::error::ReconcileResult;
use crate::lut::LookupTable;
use crate::neuron::NeuronTable;

/// One accepted pairing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatchedPair {
    /// Candidate label (LUT source)
    pub candidate: usize,
    /// Reference label (LUT target)
    pub reference: usize,
    /// Distance between the two prototypes
    pub distance: f64,
}

/// Greedy matcher. The default strategy.
#[derive(Clone, Copy, Debug, Default)]
pub struct GreedyMatcher {
    metric: DistanceMetric,
}

impl GreedyMatcher {
    /// Create a matcher using `metric`.
    pub fn new(metric: DistanceMetric) -> Self {
        Self { metric }
    }

    /// Run the greedy rounds and return the accepted pairs in selection order.
    ///
    /// # Errors
    ///
    /// - `ShapeMismatch` if the tables are incompatible
    /// - `InvalidLut` if any pairwise distance is not finite
    pub fn pairs(
        &self,
        reference: &NeuronTable,
        candidate: &NeuronTable,
    ) -> ReconcileResult<Vec<MatchedPair>> {
        reference.ensure_compatible(candidate)?;
        let n = reference.nlabels();
        let d = finite_distance_matrix(reference, candidate, self.metric)?;

        let mut used_rows = vec![false; n];
        let mut used_cols = vec![false; n];
        let mut pairs = Vec::with_capacity(n);

        for round in 0..n {
            let mut best: Option<(usize, usize, f64)> = None;
            for (j, row) in d.iter().enumerate() {
                if used_rows[j] {
                    continue;
                }
                for (i, &dist) in row.iter().enumerate() {
                    if used_cols[i] {
                        continue;
                    }
                    // strict '<' keeps the first minimum in scan order
                    if best.map_or(true, |(_, _, b)| dist < b) {
                        best = Some((j, i, dist));
                    }
                }
            }

            // n free rows and columns remain each round, so a pair exists
            let Some((j, i, dist)) = best else { break };
            used_rows[j] = true;
            used_cols[i] = true;
            trace!(round, reference = j, candidate = i, dist, "greedy pick");
            pairs.push(MatchedPair {
                candidate: i,
                reference: j,
                distance: dist,
            });
        }

        Ok(pairs)
    }
}

impl LabelMatcher for GreedyMatcher {
    fn match_tables(
        &self,
        reference: &NeuronTable,
        candidate: &NeuronTable,
    ) -> ReconcileResult<LookupTable> {
        let mut pairs = self.pairs(reference, candidate)?;
        pairs.sort_by_key(|p| p.candidate);

        let total: f64 = pairs.iter().map(|p| p.distance).sum();
        debug!(
            nlabels = pairs.len(),
            total_distance = total,
            metric = self.metric.as_str(),
            "greedy matching complete"
        );

        LookupTable::from_targets(pairs.iter().map(|p| p.reference).collect())
    }

    fn name(&self) -> &'static str {
        "greedy"
    }
}
