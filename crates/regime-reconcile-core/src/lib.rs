//! Regime Reconcile Core Library
//!
//! Reconciles the label numbering of independently trained SOM weather-regime
//! maps and measures how well two trainings agree.
//!
//! # Architecture
//!
//! - [`neuron::NeuronTable`]: prototype vectors parsed from a `NEURONS` artifact
//! - [`matcher`]: greedy (default) and optimal label matching over neuron tables
//! - [`permutation::PermutationSearcher`]: exhaustive search over label images
//! - [`diff::DiffScorer`]: pixel disagreement under a lookup table
//! - [`controller::ReconcileController`]: threshold/retry state machine over
//!   run pairs, writing the tally and the JSON report
//! - [`pipeline::PipelineComparator`]: transcribe, recluster, match and score
//!   one run pair
//!
//! # Example
//!
//! ```
//! use regime_reconcile_core::{DiffScorer, GreedyMatcher, LabelImage, LabelMatcher, NeuronTable};
//! use regime_reconcile_core::matcher::DistanceMetric;
//!
//! let reference = NeuronTable::from_vectors(vec![vec![0.0], vec![10.0]]).unwrap();
//! let candidate = NeuronTable::from_vectors(vec![vec![9.5], vec![0.5]]).unwrap();
//! let lut = GreedyMatcher::new(DistanceMetric::Euclidean)
//!     .match_tables(&reference, &candidate)
//!     .unwrap();
//! assert_eq!(lut.to_string(), "1,0");
//!
//! let a = LabelImage::from_rows(vec![vec![0, 1], vec![1, 1]]).unwrap();
//! let b = LabelImage::from_rows(vec![vec![1, 0], vec![0, 0]]).unwrap();
//! let result = DiffScorer::new().score(&a, &b, &lut).unwrap();
//! assert_eq!(result.count, 0);
//! ```

pub mod cancel;
pub mod config;
pub mod controller;
pub mod diff;
pub mod error;
pub mod histogram;
pub mod label_image;
pub mod lut;
pub mod matcher;
pub mod neuron;
pub mod permutation;
pub mod pipeline;
pub mod render;
pub mod report;
pub mod resolver;
pub mod runs;
pub mod source;
pub mod tally;
pub mod trainer;

// Re-exports for convenience
pub use cancel::CancelToken;
pub use config::ReconcileConfig;
pub use controller::{PairComparator, ReconcileController, RetryDecision, RetryPolicy};
pub use diff::{DiffResult, DiffScorer};
pub use error::{ReconcileError, ReconcileResult};
pub use label_image::LabelImage;
pub use lut::LookupTable;
pub use matcher::{GreedyMatcher, LabelMatcher, MatchStrategy, OptimalMatcher};
pub use neuron::NeuronTable;
pub use permutation::PermutationSearcher;
pub use pipeline::PipelineComparator;
pub use report::{PairStatus, RunReport};
pub use runs::{check_dirs, pair_schedule, RunDirectory, RunPair};
pub use tally::TallyLog;
