//! Exhaustive permutation search.
//!
//! Tries every bijection of `0..nlabels` on a label-image pair and keeps the
//! one with the fewest disagreeing pixels. Cost is `nlabels!` candidates:
//! 12 labels is ~479 million candidates and takes days, so this is a
//! correctness oracle and a tool for very small label counts, never the
//! default path.
//!
//! # Evaluation
//!
//! A candidate's disagreement count equals the pixel count obtained by
//! transcribing and comparing, but is computed from a confusion matrix built
//! once:
//! `count = total - sum_a confusion[a][lut[a]]`, where `confusion[a][b]` is the
//! number of pixels with candidate label `a` and reference label `b`.
//!
//! # Ordering
//!
//! Candidates are visited in lexicographic order and only a strictly smaller
//! count replaces the best, so the first minimum wins. The parallel mode
//! shards by leading element and reduces shard minima in shard order, which
//! yields the same table as the sequential scan.

use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::error::{ReconcileError, ReconcileResult};
use crate::label_image::LabelImage;
use crate::lut::{LookupTable, MAX_LABELS};

/// Candidates evaluated between cancellation checks.
const CANCEL_CHECK_BATCH: u64 = 4096;

/// Default label-count ceiling for exhaustive search.
pub const DEFAULT_MAX_EXHAUSTIVE_LABELS: usize = 10;

/// Default number of candidates between progress reports.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 100_000;

/// Best permutation found.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchOutcome {
    /// Winning table, `lut[candidate] = reference`
    pub lut: LookupTable,
    /// Disagreeing pixels under `lut`
    pub count: usize,
    /// Candidates evaluated
    pub evaluated: u64,
}

/// Exhaustive searcher.
#[derive(Clone, Debug)]
pub struct PermutationSearcher {
    max_labels: usize,
    progress_interval: u64,
    parallel: bool,
}

impl Default for PermutationSearcher {
    fn default() -> Self {
        Self {
            max_labels: DEFAULT_MAX_EXHAUSTIVE_LABELS,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            parallel: false,
        }
    }
}

impl PermutationSearcher {
    /// Create a sequential searcher.
    pub fn new(max_labels: usize, progress_interval: u64) -> Self {
        Self {
            max_labels,
            progress_interval: progress_interval.max(1),
            parallel: false,
        }
    }

    /// Shard the search across the rayon pool.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Find the LUT minimizing disagreement between `reference` and the
    /// transcribed `candidate`.
    ///
    /// # Errors
    ///
    /// - `ShapeMismatch` if the images differ in dimensions
    /// - `InvalidLut` if `nlabels` is 0 or above [`MAX_LABELS`]
    /// - `SearchTooLarge` if `nlabels` exceeds the configured ceiling
    /// - `LabelOutOfRange` if `candidate` holds a label `>= nlabels`
    /// - `Cancelled` if `cancel` fires
    pub fn search(
        &self,
        reference: &LabelImage,
        candidate: &LabelImage,
        nlabels: usize,
        cancel: &CancelToken,
    ) -> ReconcileResult<SearchOutcome> {
        reference.ensure_same_shape(candidate)?;
        if nlabels == 0 {
            return Err(ReconcileError::invalid_lut("nlabels must be > 0"));
        }
        if nlabels > MAX_LABELS {
            return Err(ReconcileError::invalid_lut(format!(
                "nlabels {} exceeds the {} label limit",
                nlabels, MAX_LABELS
            )));
        }
        if nlabels > self.max_labels {
            return Err(ReconcileError::SearchTooLarge {
                nlabels,
                limit: self.max_labels,
            });
        }

        let confusion = Confusion::build(reference, candidate, nlabels)?;
        let progress = Progress::new(self.progress_interval);

        info!(
            nlabels,
            pixels = confusion.total,
            parallel = self.parallel,
            "starting exhaustive permutation search"
        );

        let best = if self.parallel && nlabels > 1 {
            let shards = (0..nlabels)
                .into_par_iter()
                .map(|lead| {
                    let mut perm = Vec::with_capacity(nlabels);
                    perm.push(lead);
                    perm.extend((0..nlabels).filter(|&x| x != lead));
                    scan(&confusion, perm, 1, cancel, &progress)
                })
                .collect::<ReconcileResult<Vec<Best>>>()?;

            // shard order is lexicographic order of the leading element
            shards
                .into_iter()
                .reduce(|acc, next| if next.count < acc.count { next } else { acc })
                .ok_or_else(|| ReconcileError::invalid_lut("no permutations evaluated"))?
        } else {
            scan(&confusion, (0..nlabels).collect(), 0, cancel, &progress)?
        };

        let evaluated = progress.evaluated();
        debug!(
            count = best.count,
            evaluated,
            lut = ?best.perm,
            "exhaustive permutation search complete"
        );

        Ok(SearchOutcome {
            lut: LookupTable::from_targets(best.perm)?,
            count: best.count,
            evaluated,
        })
    }
}

#[derive(Debug)]
struct Best {
    count: usize,
    perm: Vec<usize>,
}

/// `cells[a * n + b]`: pixels with candidate label `a`, reference label `b`.
struct Confusion {
    n: usize,
    cells: Vec<usize>,
    total: usize,
}

impl Confusion {
    fn build(reference: &LabelImage, candidate: &LabelImage, n: usize) -> ReconcileResult<Self> {
        let mut cells = vec![0usize; n * n];
        for (&r, &c) in reference.as_array().iter().zip(candidate.as_array().iter()) {
            let (r, c) = (r as usize, c as usize);
            if c >= n {
                return Err(ReconcileError::LabelOutOfRange {
                    label: c,
                    nlabels: n,
                });
            }
            // reference labels outside the table never agree
            if r < n {
                cells[c * n + r] += 1;
            }
        }
        Ok(Self {
            n,
            cells,
            total: reference.pixel_count(),
        })
    }

    #[inline]
    fn disagreements(&self, perm: &[usize]) -> usize {
        let agree: usize = perm
            .iter()
            .enumerate()
            .map(|(a, &b)| self.cells[a * self.n + b])
            .sum();
        self.total - agree
    }
}

struct Progress {
    evaluated: AtomicU64,
    interval: u64,
}

impl Progress {
    fn new(interval: u64) -> Self {
        Self {
            evaluated: AtomicU64::new(0),
            interval: interval.max(1),
        }
    }

    fn advance(&self, n: u64, best: usize) {
        let before = self.evaluated.fetch_add(n, Ordering::Relaxed);
        let after = before + n;
        if before / self.interval != after / self.interval {
            info!(evaluated = after, min_diff = best, "permutation search progress");
        }
    }

    fn evaluated(&self) -> u64 {
        self.evaluated.load(Ordering::Relaxed)
    }
}

/// Visit every permutation of `perm[fixed..]` in lexicographic order.
/// `perm[fixed..]` must start sorted ascending.
fn scan(
    confusion: &Confusion,
    mut perm: Vec<usize>,
    fixed: usize,
    cancel: &CancelToken,
    progress: &Progress,
) -> ReconcileResult<Best> {
    let mut best = Best {
        count: usize::MAX,
        perm: perm.clone(),
    };
    let mut batch = 0u64;

    loop {
        let count = confusion.disagreements(&perm);
        if count < best.count {
            best.count = count;
            best.perm.copy_from_slice(&perm);
        }

        batch += 1;
        if batch == CANCEL_CHECK_BATCH {
            progress.advance(batch, best.count);
            batch = 0;
            cancel.check()?;
        }

        if !next_permutation(&mut perm[fixed..]) {
            break;
        }
    }

    progress.advance(batch, best.count);
    Ok(best)
}

/// Advance `a` to the next lexicographic permutation. Returns `false` (and
/// leaves `a` untouched) when `a` is already the last one.
pub fn next_permutation(a: &mut [usize]) -> bool {
    if a.len() < 2 {
        return false;
    }
    let mut i = a.len() - 1;
    while i > 0 && a[i - 1] >= a[i] {
        i -= 1;
    }
    if i == 0 {
        return false;
    }
    let mut j = a.len() - 1;
    while a[j] <= a[i - 1] {
        j -= 1;
    }
    a.swap(i - 1, j);
    a[i..].reverse();
    true
}

#[cfg(test)]
mod tests {
    use ndarray::{array, Array2};

    use super::*;
    use crate::diff::DiffScorer;

    fn image(a: Array2<u8>) -> LabelImage {
        LabelImage::new(a)
    }

    #[test]
    fn test_next_permutation_order() {
        let mut a = vec![0, 1, 2];
        let mut seen = vec![a.clone()];
        while next_permutation(&mut a) {
            seen.push(a.clone());
        }
        assert_eq!(
            seen,
            vec![
                vec![0, 1, 2],
                vec![0, 2, 1],
                vec![1, 0, 2],
                vec![1, 2, 0],
                vec![2, 0, 1],
                vec![2, 1, 0],
            ]
        );
    }

    #[test]
    fn test_recovers_relabeling() {
        let reference = image(array![[0, 0, 1, 1], [2, 2, 3, 3]]);
        // candidate numbering: ref 0 -> 3, 1 -> 0, 2 -> 1, 3 -> 2
        let candidate = image(array![[3, 3, 0, 0], [1, 1, 2, 2]]);

        let outcome = PermutationSearcher::default()
            .search(&reference, &candidate, 4, &CancelToken::new())
            .unwrap();

        println!("[AFTER] lut={} count={}", outcome.lut, outcome.count);
        assert_eq!(outcome.count, 0);
        assert_eq!(outcome.lut.targets(), vec![1, 2, 3, 0]);
        assert_eq!(outcome.evaluated, 24);
    }

    #[test]
    fn test_count_matches_diff_scorer() {
        let reference = image(array![[0, 1, 2, 0], [1, 1, 2, 2], [0, 0, 0, 1]]);
        let candidate = image(array![[2, 1, 0, 2], [1, 0, 0, 0], [2, 2, 1, 1]]);

        let outcome = PermutationSearcher::default()
            .search(&reference, &candidate, 3, &CancelToken::new())
            .unwrap();
        let scored = DiffScorer::new()
            .score(&reference, &candidate, &outcome.lut)
            .unwrap();

        assert_eq!(scored.count, outcome.count);
    }

    #[test]
    fn test_first_minimum_wins() {
        // every table gives the same count on a uniform pair of images
        let reference = image(Array2::from_elem((2, 2), 5u8));
        let candidate = image(Array2::zeros((2, 2)));

        let outcome = PermutationSearcher::default()
            .search(&reference, &candidate, 3, &CancelToken::new())
            .unwrap();

        assert_eq!(outcome.count, 4);
        assert!(outcome.lut.is_identity());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let reference = image(array![
            [0, 1, 2, 3, 4],
            [4, 3, 2, 1, 0],
            [0, 0, 1, 1, 2],
            [3, 3, 4, 4, 0]
        ]);
        let candidate = image(array![
            [1, 1, 2, 4, 0],
            [0, 4, 2, 1, 1],
            [1, 3, 3, 1, 2],
            [4, 4, 0, 0, 1]
        ]);
        let cancel = CancelToken::new();

        let seq = PermutationSearcher::default()
            .search(&reference, &candidate, 5, &cancel)
            .unwrap();
        let par = PermutationSearcher::default()
            .with_parallel(true)
            .search(&reference, &candidate, 5, &cancel)
            .unwrap();

        println!("[AFTER] sequential={} parallel={}", seq.lut, par.lut);
        assert_eq!(seq.lut, par.lut);
        assert_eq!(seq.count, par.count);
        assert_eq!(par.evaluated, 120);
    }

    #[test]
    fn test_refuses_large_label_counts() {
        let img = image(Array2::zeros((1, 1)));
        let err = PermutationSearcher::new(6, 1000)
            .search(&img, &img, 7, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::SearchTooLarge {
                nlabels: 7,
                limit: 6
            }
        ));
    }

    #[test]
    fn test_label_count_capped_regardless_of_ceiling() {
        let img = image(Array2::zeros((1, 1)));
        let searcher = PermutationSearcher::new(usize::MAX, 1000);

        let err = searcher
            .search(&img, &img, MAX_LABELS + 1, &CancelToken::new())
            .unwrap_err();
        println!("[AFTER] {}", err);
        assert!(matches!(err, ReconcileError::InvalidLut { .. }));

        let err = searcher
            .search(&img, &img, usize::MAX, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidLut { .. }));
    }

    #[test]
    fn test_candidate_label_out_of_range() {
        let reference = image(array![[0, 1]]);
        let candidate = image(array![[0, 3]]);
        let err = PermutationSearcher::default()
            .search(&reference, &candidate, 2, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, ReconcileError::LabelOutOfRange { label: 3, .. }));
    }

    #[test]
    fn test_cancelled_search() {
        let img = image(Array2::zeros((2, 2)));
        let cancel = CancelToken::new();
        cancel.cancel();

        // 8! = 40320 candidates, more than one batch
        let err = PermutationSearcher::default()
            .search(&img, &img, 8, &cancel)
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Cancelled));
    }

    #[test]
    fn test_shape_mismatch() {
        let a = image(Array2::zeros((2, 2)));
        let b = image(Array2::zeros((1, 4)));
        let err = PermutationSearcher::default()
            .search(&a, &b, 2, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, ReconcileError::ShapeMismatch { .. }));
    }
}
