//! Optimal assignment matching (Kuhn-Munkres).
//!
//! Minimizes the summed prototype distance over all bijections in O(N^3).
//! Opt-in only; the greedy matcher stays the default.

use tracing::debug;

use super::metric::{finite_distance_matrix, DistanceMetric};
use super::LabelMatcher;
use crate::error::ReconcileResult;
use crate::lut::LookupTable;
use crate::neuron::NeuronTable;

/// Hungarian-algorithm matcher.
#[derive(Clone, Copy, Debug, Default)]
pub struct OptimalMatcher {
    metric: DistanceMetric,
}

impl OptimalMatcher {
    /// Create a matcher using `metric`.
    pub fn new(metric: DistanceMetric) -> Self {
        Self { metric }
    }
}

impl LabelMatcher for OptimalMatcher {
    fn match_tables(
        &self,
        reference: &NeuronTable,
        candidate: &NeuronTable,
    ) -> ReconcileResult<LookupTable> {
        reference.ensure_compatible(candidate)?;
        let n = reference.nlabels();
        let d = finite_distance_matrix(reference, candidate, self.metric)?;

        // cost[candidate][reference]
        let cost: Vec<Vec<f64>> = (0..n).map(|i| (0..n).map(|j| d[j][i]).collect()).collect();
        let assignment = solve_assignment(&cost);

        let total: f64 = assignment
            .iter()
            .enumerate()
            .map(|(i, &j)| cost[i][j])
            .sum();
        debug!(
            nlabels = n,
            total_distance = total,
            metric = self.metric.as_str(),
            "optimal matching complete"
        );

        LookupTable::from_targets(assignment)
    }

    fn name(&self) -> &'static str {
        "optimal"
    }
}

/// Minimum-cost perfect assignment for a square cost matrix.
///
/// Returns `assignment[row] = column`. Uses the potentials formulation with
/// 1-based internal indices; index 0 is the virtual start column.
pub fn solve_assignment(cost: &[Vec<f64>]) -> Vec<usize> {
    let n = cost.len();
    if n == 0 {
        return Vec::new();
    }

    let mut u = vec![0.0f64; n + 1];
    let mut v = vec![0.0f64; n + 1];
    // p[col] = row matched to col (1-based, 0 = none)
    let mut p = vec![0usize; n + 1];
    let mut way = vec![0usize; n + 1];

    for row in 1..=n {
        p[0] = row;
        let mut j0 = 0usize;
        let mut minv = vec![f64::INFINITY; n + 1];
        let mut used = vec![false; n + 1];

        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0usize;

            for j in 1..=n {
                if used[j] {
                    continue;
                }
                let cur = cost[i0 - 1][j - 1] - u[i0] - v[j];
                if cur < minv[j] {
                    minv[j] = cur;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }

            for j in 0..=n {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }

            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }

        loop {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut assignment = vec![0usize; n];
    for col in 1..=n {
        if p[col] > 0 {
            assignment[p[col] - 1] = col - 1;
        }
    }
    assignment
}
