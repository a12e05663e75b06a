//! JSON run report.
//!
//! The tally file records one row per pair but cannot tell an accepted pair
//! from an abandoned one. The report keeps that status and the number of
//! attempts next to each score.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::diff::DiffResult;
use crate::error::{ReconcileError, ReconcileResult};

/// How a pair's comparison ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairStatus {
    /// Within threshold on the first attempt
    Accepted,
    /// Within threshold after one or more retries
    AcceptedAfterRetry,
    /// Retry budget exhausted; the last score was recorded
    Abandoned,
}

impl PairStatus {
    /// Status of a pair that ended after `attempts` comparisons.
    pub fn from_attempts(attempts: u32, abandoned: bool) -> Self {
        if abandoned {
            Self::Abandoned
        } else if attempts > 1 {
            Self::AcceptedAfterRetry
        } else {
            Self::Accepted
        }
    }
}

/// Final record of one pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairOutcome {
    /// `<tag1>-<tag2>`
    pub tag: String,
    /// Disagreeing pixels of the recorded attempt
    pub count: usize,
    /// Percentage of the recorded attempt
    pub percent: f64,
    /// Comparisons performed for this pair
    pub attempts: u32,
    /// Outcome
    pub status: PairStatus,
    /// When the pair finished
    pub completed_at: DateTime<Utc>,
}

impl PairOutcome {
    /// Score of the recorded attempt.
    pub fn result(&self) -> DiffResult {
        DiffResult {
            count: self.count,
            percent: self.percent,
        }
    }
}

/// Summary of a controller run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Run start
    pub started_at: DateTime<Utc>,
    /// Run end; unset while running
    pub finished_at: Option<DateTime<Utc>>,
    /// Acceptance threshold; `None` when unbounded
    pub threshold: Option<f64>,
    /// Retry budget per pair
    pub budget: u32,
    /// One entry per pair, in processing order
    pub pairs: Vec<PairOutcome>,
}

impl RunReport {
    /// Start a report.
    pub fn begin(threshold: f64, budget: u32) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            threshold: threshold.is_finite().then_some(threshold),
            budget,
            pairs: Vec::new(),
        }
    }

    /// Stamp the end time.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Pairs with the given status.
    pub fn count_status(&self, status: PairStatus) -> usize {
        self.pairs.iter().filter(|p| p.status == status).count()
    }

    /// Write as pretty JSON.
    pub fn write_to(&self, path: &Path) -> ReconcileResult<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ReconcileError::format(path, e.to_string()))?;
        fs::write(path, json).map_err(|e| ReconcileError::io(path, e))
    }

    /// Read a report written by [`RunReport::write_to`].
    pub fn read_from(path: &Path) -> ReconcileResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| ReconcileError::io(path, e))?;
        serde_json::from_str(&text).map_err(|e| ReconcileError::format(path, e.to_string()))
    }
}
