//! Distance metrics between prototype vectors.

use serde::{Deserialize, Serialize};

use crate::error::{ReconcileError, ReconcileResult};
use crate::neuron::NeuronTable;

/// Metric used to compare neuron vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Square root of the summed squared differences.
    #[default]
    Euclidean,
    /// Summed absolute differences.
    Manhattan,
}

impl DistanceMetric {
    /// Distance between two equal-length vectors.
    #[inline]
    pub fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            Self::Euclidean => euclidean_distance_squared(a, b).sqrt(),
            Self::Manhattan => a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum(),
        }
    }

    /// Name as used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Euclidean => "euclidean",
            Self::Manhattan => "manhattan",
        }
    }
}

/// Squared Euclidean distance.
#[inline]
pub fn euclidean_distance_squared(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Full pairwise matrix `d[j][i] = metric(reference[j], candidate[i])`.
///
/// Callers must have checked that the tables are compatible.
pub fn distance_matrix(
    reference: &NeuronTable,
    candidate: &NeuronTable,
    metric: DistanceMetric,
) -> Vec<Vec<f64>> {
    reference
        .vectors()
        .iter()
        .map(|r| {
            candidate
                .vectors()
                .iter()
                .map(|c| metric.distance(r, c))
                .collect()
        })
        .collect()
}

/// [`distance_matrix`], failing with `InvalidLut` if any entry is NaN or
/// infinite. Both matchers compare distances with `<`, which is meaningless
/// against NaN.
pub fn finite_distance_matrix(
    reference: &NeuronTable,
    candidate: &NeuronTable,
    metric: DistanceMetric,
) -> ReconcileResult<Vec<Vec<f64>>> {
    let d = distance_matrix(reference, candidate, metric);
    for (j, row) in d.iter().enumerate() {
        if let Some(i) = row.iter().position(|x| !x.is_finite()) {
            return Err(ReconcileError::invalid_lut(format!(
                "non-finite distance between reference {} and candidate {}",
                j, i
            )));
        }
    }
    Ok(d)
}
