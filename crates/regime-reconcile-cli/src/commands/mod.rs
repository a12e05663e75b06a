//! CLI command handlers
//!
//! # Modules
//!
//! - `run`: full pairwise comparison loop with retries
//! - `match_cmd`: neuron table matching
//! - `diff`: pixel disagreement between two label images
//! - `search`: exhaustive permutation search

pub mod diff;
pub mod match_cmd;
pub mod run;
pub mod search;
