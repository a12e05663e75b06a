//! Label matching between two neuron tables.
//!
//! Two independently trained SOMs number their clusters arbitrarily. A
//! [`LabelMatcher`] pairs each candidate prototype with a reference prototype
//! and returns the bijective [`LookupTable`] `lut[candidate] = reference`.
//!
//! # Strategies
//!
//! - [`GreedyMatcher`]: repeated nearest unique pair. Fast, not optimal.
//!   This is the default.
//! - [`OptimalMatcher`]: Kuhn-Munkres assignment minimizing the total
//!   distance. Opt-in.
//! - `exhaustive`: not a table matcher; it searches label-image permutations
//!   directly, see [`crate::permutation`].

mod greedy;
mod metric;
mod optimal;

pub use greedy::{GreedyMatcher, MatchedPair};
pub use metric::{
    distance_matrix, euclidean_distance_squared, finite_distance_matrix, DistanceMetric,
};
pub use optimal::{solve_assignment, OptimalMatcher};

use serde::{Deserialize, Serialize};

use crate::error::ReconcileResult;
use crate::lut::LookupTable;
use crate::neuron::NeuronTable;

/// Computes a relabeling from neuron prototypes.
pub trait LabelMatcher {
    /// Match `candidate` labels onto `reference` labels.
    ///
    /// # Errors
    ///
    /// - `ShapeMismatch` if the tables differ in label count or dimensionality
    /// - `InvalidLut` if a pairwise distance is NaN or infinite
    fn match_tables(
        &self,
        reference: &NeuronTable,
        candidate: &NeuronTable,
    ) -> ReconcileResult<LookupTable>;

    /// Strategy name for logs.
    fn name(&self) -> &'static str;
}

/// Reconciliation strategy selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Greedy nearest unique neighbor over neuron tables.
    #[default]
    Greedy,
    /// Minimum total distance assignment over neuron tables.
    Optimal,
    /// Exhaustive permutation search over label images.
    Exhaustive,
}

impl MatchStrategy {
    /// Name as used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greedy => "greedy",
            Self::Optimal => "optimal",
            Self::Exhaustive => "exhaustive",
        }
    }

    /// Table matcher for this strategy.
    ///
    /// `Exhaustive` has no table form; callers needing one for it (e.g. the
    /// weather LUT fallback) get the greedy matcher.
    pub fn table_matcher(&self, metric: DistanceMetric) -> Box<dyn LabelMatcher + Send + Sync> {
        match self {
            Self::Optimal => Box::new(OptimalMatcher::new(metric)),
            Self::Greedy | Self::Exhaustive => Box::new(GreedyMatcher::new(metric)),
        }
    }
}

impl std::str::FromStr for MatchStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "greedy" => Ok(Self::Greedy),
            "optimal" => Ok(Self::Optimal),
            "exhaustive" => Ok(Self::Exhaustive),
            other => Err(format!(
                "unknown strategy '{}' (expected greedy, optimal or exhaustive)",
                other
            )),
        }
    }
}
