//! ReconcileController - retry state machine over run pairs
//!
//! Each pair moves through:
//!
//! ```text
//! Comparing -> Accepted ------------------------> next pair
//!           -> Retrying -> Comparing (same pair)
//!           -> Abandoned -----------------------> next pair
//! ```
//!
//! and the run ends in `Done`. A score above the threshold is not an error:
//! it costs one unit of the pair's retry budget. When the budget is spent the
//! last score is recorded anyway and the run moves on. Accepted and abandoned
//! pairs both get a tally row; the JSON report keeps the distinction.

use std::io::Write;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::config::RetryConfig;
use crate::diff::DiffResult;
use crate::error::ReconcileResult;
use crate::report::{PairOutcome, PairStatus, RunReport};
use crate::runs::RunPair;
use crate::tally::{TallyLog, TallyRecord};

/// Controller state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum ReconcileState {
    /// No pair started yet
    #[default]
    Idle,

    /// Comparing a pair
    Comparing {
        /// Pair tag
        pair: String,
        /// 1-based attempt number
        attempt: u32,
    },

    /// Score too high; the same pair will be compared again
    Retrying {
        /// Pair tag
        pair: String,
        /// Threshold failures so far
        fail_count: u32,
    },

    /// Pair recorded within threshold
    Accepted {
        /// Pair tag
        pair: String,
    },

    /// Retry budget exhausted; last score recorded
    Abandoned {
        /// Pair tag
        pair: String,
    },

    /// Every pair processed
    Done,
}

impl ReconcileState {
    /// Name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Comparing { .. } => "comparing",
            Self::Retrying { .. } => "retrying",
            Self::Accepted { .. } => "accepted",
            Self::Abandoned { .. } => "abandoned",
            Self::Done => "done",
        }
    }
}

/// What to do after one comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Record and move on
    Accept,
    /// Compare the same pair again
    Retry,
    /// Record the last score and move on
    Abandon,
}

/// Acceptance threshold and per-pair retry budget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Percent ceiling for acceptance
    pub threshold: f64,
    /// Threshold failures before abandoning a pair
    pub budget: u32,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            threshold: config.threshold,
            budget: config.budget,
        }
    }
}

impl RetryPolicy {
    /// Fresh per-pair state.
    pub fn start(&self) -> RetryState {
        RetryState {
            fail_count: 0,
            budget: self.budget,
        }
    }
}

/// Threshold failures of the pair in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    /// Failures so far
    pub fail_count: u32,
    /// Failures allowed
    pub budget: u32,
}

impl RetryState {
    /// Record one score. A failure counts against the budget before the
    /// budget is checked, so a budget of `n` allows `n` comparisons in total
    /// when every one fails.
    pub fn record(&mut self, percent: f64, threshold: f64) -> RetryDecision {
        if percent <= threshold {
            return RetryDecision::Accept;
        }
        self.fail_count += 1;
        if self.fail_count < self.budget {
            RetryDecision::Retry
        } else {
            RetryDecision::Abandon
        }
    }

    /// Clear after a pair is recorded.
    pub fn reset(&mut self) {
        self.fail_count = 0;
    }
}

/// Runs one full comparison of a pair.
pub trait PairComparator {
    /// Resolve the LUT, recluster, and score `pair`.
    fn compare(&mut self, pair: &RunPair) -> ReconcileResult<DiffResult>;
}

/// Drives every pair through compare/retry and records the outcomes.
#[derive(Debug)]
pub struct ReconcileController {
    policy: RetryPolicy,
    state: ReconcileState,
    cancel: CancelToken,
}

impl ReconcileController {
    /// Create a controller.
    pub fn new(policy: RetryPolicy, cancel: CancelToken) -> Self {
        Self {
            policy,
            state: ReconcileState::Idle,
            cancel,
        }
    }

    /// Current state.
    pub fn state(&self) -> &ReconcileState {
        &self.state
    }

    /// Process `pairs` in order, appending one tally row per pair.
    ///
    /// # Errors
    ///
    /// Any comparison error aborts the run. `Cancelled` if the token fires
    /// between comparisons.
    pub fn run<C, W>(
        &mut self,
        pairs: &[RunPair],
        comparator: &mut C,
        tally: &mut TallyLog<W>,
    ) -> ReconcileResult<RunReport>
    where
        C: PairComparator + ?Sized,
        W: Write,
    {
        let mut report = RunReport::begin(self.policy.threshold, self.policy.budget);
        info!(
            pairs = pairs.len(),
            threshold = self.policy.threshold,
            budget = self.policy.budget,
            "starting reconciliation run"
        );

        for pair in pairs {
            let outcome = self.run_pair(pair, comparator)?;
            tally.append(&TallyRecord {
                tag: pair.tag(),
                result: outcome.result(),
            })?;
            report.pairs.push(outcome);
        }

        self.transition(ReconcileState::Done);
        report.finish();
        info!(
            accepted = report.count_status(PairStatus::Accepted),
            accepted_after_retry = report.count_status(PairStatus::AcceptedAfterRetry),
            abandoned = report.count_status(PairStatus::Abandoned),
            "reconciliation run complete"
        );
        Ok(report)
    }

    fn run_pair<C>(&mut self, pair: &RunPair, comparator: &mut C) -> ReconcileResult<PairOutcome>
    where
        C: PairComparator + ?Sized,
    {
        let tag = pair.tag().to_string();
        let mut retry = self.policy.start();
        let mut attempt = 0u32;

        loop {
            self.cancel.check()?;
            attempt += 1;
            self.transition(ReconcileState::Comparing {
                pair: tag.clone(),
                attempt,
            });

            let result = comparator.compare(pair)?;
            info!(pair = %tag, attempt, count = result.count, percent = result.percent, "{}", result);

            match retry.record(result.percent, self.policy.threshold) {
                RetryDecision::Accept => {
                    self.transition(ReconcileState::Accepted { pair: tag.clone() });
                    retry.reset();
                    return Ok(outcome(tag, result, attempt, false));
                }
                RetryDecision::Retry => {
                    warn!(
                        pair = %tag,
                        percent = format_args!("{:.2}", result.percent),
                        fail_count = retry.fail_count,
                        "per cent error is too high, re-running comparison"
                    );
                    self.transition(ReconcileState::Retrying {
                        pair: tag.clone(),
                        fail_count: retry.fail_count,
                    });
                }
                RetryDecision::Abandon => {
                    warn!(
                        pair = %tag,
                        percent = format_args!("{:.2}", result.percent),
                        fail_count = retry.fail_count,
                        "giving up this comparison, continuing"
                    );
                    self.transition(ReconcileState::Abandoned { pair: tag.clone() });
                    retry.reset();
                    return Ok(outcome(tag, result, attempt, true));
                }
            }
        }
    }

    fn transition(&mut self, next: ReconcileState) {
        debug!(from = self.state.name(), to = next.name(), "state transition");
        self.state = next;
    }
}

fn outcome(tag: String, result: DiffResult, attempts: u32, abandoned: bool) -> PairOutcome {
    PairOutcome {
        tag,
        count: result.count,
        percent: result.percent,
        attempts,
        status: PairStatus::from_attempts(attempts, abandoned),
        completed_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReconcileError;
    use crate::runs::{pair_schedule, RunDirectory};
    use std::collections::{HashMap, VecDeque};

    /// Replays canned scores per pair tag.
    struct Scripted {
        scores: HashMap<String, VecDeque<DiffResult>>,
        calls: Vec<String>,
    }

    impl Scripted {
        fn new(script: Vec<(&str, Vec<(usize, f64)>)>) -> Self {
            let scores = script
                .into_iter()
                .map(|(tag, s)| {
                    let q = s
                        .into_iter()
                        .map(|(count, percent)| DiffResult { count, percent })
                        .collect();
                    (tag.to_string(), q)
                })
                .collect();
            Self {
                scores,
                calls: Vec::new(),
            }
        }
    }

    impl PairComparator for Scripted {
        fn compare(&mut self, pair: &RunPair) -> ReconcileResult<DiffResult> {
            let tag = pair.tag().to_string();
            self.calls.push(tag.clone());
            self.scores
                .get_mut(&tag)
                .and_then(|q| q.pop_front())
                .ok_or_else(|| ReconcileError::trainer(format!("no score left for {}", tag)))
        }
    }

    fn pairs(tags: &[&str]) -> Vec<RunPair> {
        let runs: Vec<RunDirectory> = tags
            .iter()
            .map(|t| RunDirectory::new(format!("/runs/SOM_{}", t)))
            .collect();
        pair_schedule(&runs, false)
    }

    fn policy(threshold: f64, budget: u32) -> RetryPolicy {
        RetryPolicy { threshold, budget }
    }

    #[test]
    fn test_retry_state_sequence() {
        let mut state = policy(4.0, 2).start();
        assert_eq!(state.record(6.0, 4.0), RetryDecision::Retry);
        assert_eq!(state.fail_count, 1);
        assert_eq!(state.record(5.5, 4.0), RetryDecision::Abandon);
        assert_eq!(state.fail_count, 2);
        state.reset();
        assert_eq!(state.fail_count, 0);
        assert_eq!(state.record(4.0, 4.0), RetryDecision::Accept);
    }

    #[test]
    fn test_zero_budget_abandons_immediately() {
        let mut state = policy(1.0, 0).start();
        assert_eq!(state.record(2.0, 1.0), RetryDecision::Abandon);
    }

    #[test]
    fn test_forced_acceptance_after_budget() {
        let pairs = pairs(&["02", "03"]);
        let mut comparator = Scripted::new(vec![("02-03", vec![(900, 6.0), (825, 5.5)])]);
        let mut tally = TallyLog::new(Vec::new(), "memory").unwrap();
        let mut controller = ReconcileController::new(policy(4.0, 2), CancelToken::new());

        let report = controller.run(&pairs, &mut comparator, &mut tally).unwrap();

        assert_eq!(comparator.calls, ["02-03", "02-03"]);
        let text = String::from_utf8(tally.into_inner()).unwrap();
        println!("[AFTER] tally:\n{}", text);
        assert_eq!(text, "dirs,num_diff_pixels,% diff\n02-03,825,5.50\n");

        let pair = &report.pairs[0];
        assert_eq!(pair.attempts, 2);
        assert_eq!(pair.status, PairStatus::Abandoned);
        assert_eq!(controller.state(), &ReconcileState::Done);
        println!("[VERIFIED] 6.00 -> retry, 5.50 -> recorded after budget of 2");
    }

    #[test]
    fn test_retry_does_not_advance_pair() {
        let pairs = pairs(&["02", "03", "04"]);
        let mut comparator = Scripted::new(vec![
            ("02-03", vec![(10, 9.0), (1, 0.5)]),
            ("02-04", vec![(2, 1.0)]),
            ("03-04", vec![(3, 1.5)]),
        ]);
        let mut tally = TallyLog::new(Vec::new(), "memory").unwrap();
        let mut controller = ReconcileController::new(policy(4.0, 2), CancelToken::new());

        let report = controller.run(&pairs, &mut comparator, &mut tally).unwrap();

        assert_eq!(comparator.calls, ["02-03", "02-03", "02-04", "03-04"]);
        assert_eq!(report.pairs[0].status, PairStatus::AcceptedAfterRetry);
        assert_eq!(report.pairs[1].status, PairStatus::Accepted);
        // fail count was reset: 02-04 starts with a full budget
        assert_eq!(report.pairs[1].attempts, 1);
    }

    #[test]
    fn test_unbounded_threshold_never_retries() {
        let pairs = pairs(&["02", "03"]);
        let mut comparator = Scripted::new(vec![("02-03", vec![(5000, 80.0)])]);
        let mut tally = TallyLog::new(Vec::new(), "memory").unwrap();
        let mut controller = ReconcileController::new(policy(f64::INFINITY, 2), CancelToken::new());

        let report = controller.run(&pairs, &mut comparator, &mut tally).unwrap();
        assert_eq!(report.pairs[0].status, PairStatus::Accepted);
        assert_eq!(comparator.calls.len(), 1);
    }

    #[test]
    fn test_comparison_error_aborts() {
        let pairs = pairs(&["02", "03"]);
        let mut comparator = Scripted::new(Vec::new());
        let mut tally = TallyLog::new(Vec::new(), "memory").unwrap();
        let mut controller = ReconcileController::new(policy(4.0, 2), CancelToken::new());

        let err = controller.run(&pairs, &mut comparator, &mut tally).unwrap_err();
        assert!(matches!(err, ReconcileError::Trainer { .. }));
        assert_eq!(tally.rows(), 0);
    }

    #[test]
    fn test_cancel_before_first_comparison() {
        let pairs = pairs(&["02", "03"]);
        let mut comparator = Scripted::new(vec![("02-03", vec![(0, 0.0)])]);
        let mut tally = TallyLog::new(Vec::new(), "memory").unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut controller = ReconcileController::new(policy(4.0, 2), cancel);

        let err = controller.run(&pairs, &mut comparator, &mut tally).unwrap_err();
        assert!(matches!(err, ReconcileError::Cancelled));
        assert!(comparator.calls.is_empty());
    }
}
