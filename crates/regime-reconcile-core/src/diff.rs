//! Pixel-difference scoring.
//!
//! The candidate image is transcribed through a LUT and compared pixel by
//! pixel against the reference. The score is the number of disagreeing
//! pixels and that number as a percentage of the image area.

use std::fmt;

use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

use crate::error::ReconcileResult;
use crate::label_image::LabelImage;
use crate::lut::LookupTable;

/// Value written into a highlight mask for disagreeing pixels.
pub const HIGHLIGHT: u8 = 255;

/// Outcome of one comparison.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiffResult {
    /// Disagreeing pixels
    pub count: usize,
    /// `100 * count / total_pixels`; 0.0 for an empty image
    pub percent: f64,
}

impl DiffResult {
    /// Build from a count and the image area.
    pub fn from_count(count: usize, total_pixels: usize) -> Self {
        let percent = if total_pixels == 0 {
            0.0
        } else {
            count as f64 / total_pixels as f64 * 100.0
        };
        Self { count, percent }
    }
}

impl fmt::Display for DiffResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "num of diff pixels={}, % diff={:.2}",
            self.count, self.percent
        )
    }
}

/// Scores label-image agreement under a LUT.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiffScorer;

impl DiffScorer {
    /// Create a scorer.
    pub fn new() -> Self {
        Self
    }

    /// Transcribe `candidate` through `lut` and count pixels that differ
    /// from `reference`.
    ///
    /// # Errors
    ///
    /// - `ShapeMismatch` if the images differ in dimensions
    /// - `LabelOutOfRange` if `candidate` has a label the LUT cannot map
    pub fn score(
        &self,
        reference: &LabelImage,
        candidate: &LabelImage,
        lut: &LookupTable,
    ) -> ReconcileResult<DiffResult> {
        let transcribed = self.prepare(reference, candidate, lut)?;
        Ok(count_disagreements(reference, &transcribed))
    }

    /// Like [`DiffScorer::score`], also returning the transcribed candidate
    /// and a highlight mask (`HIGHLIGHT` where pixels differ, 0 elsewhere)
    /// for rendering.
    pub fn score_with_mask(
        &self,
        reference: &LabelImage,
        candidate: &LabelImage,
        lut: &LookupTable,
    ) -> ReconcileResult<ScoredDiff> {
        let transcribed = self.prepare(reference, candidate, lut)?;
        let mut mask = Array2::<u8>::zeros(reference.dim());
        Zip::from(&mut mask)
            .and(reference.as_array())
            .and(transcribed.as_array())
            .for_each(|m, &r, &c| {
                if r != c {
                    *m = HIGHLIGHT;
                }
            });
        let count = mask.iter().filter(|&&m| m != 0).count();
        Ok(ScoredDiff {
            result: DiffResult::from_count(count, reference.pixel_count()),
            transcribed,
            mask: LabelImage::new(mask),
        })
    }

    fn prepare(
        &self,
        reference: &LabelImage,
        candidate: &LabelImage,
        lut: &LookupTable,
    ) -> ReconcileResult<LabelImage> {
        reference.ensure_same_shape(candidate)?;
        candidate.transcribe(lut)
    }
}

/// A score plus the images needed to visualize it.
#[derive(Clone, Debug)]
pub struct ScoredDiff {
    /// Count and percentage
    pub result: DiffResult,
    /// Candidate after transcription
    pub transcribed: LabelImage,
    /// Highlight mask of disagreeing pixels
    pub mask: LabelImage,
}

fn count_disagreements(reference: &LabelImage, transcribed: &LabelImage) -> DiffResult {
    let count = Zip::from(reference.as_array())
        .and(transcribed.as_array())
        .fold(0usize, |acc, &r, &c| acc + usize::from(r != c));
    DiffResult::from_count(count, reference.pixel_count())
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::error::ReconcileError;

    fn image(a: Array2<u8>) -> LabelImage {
        LabelImage::new(a)
    }

    #[test]
    fn test_identical_images_score_zero() {
        let img = image(array![[0, 1, 2], [2, 1, 0]]);
        let lut = LookupTable::identity(3).unwrap();

        let result = DiffScorer::new().score(&img, &img, &lut).unwrap();

        assert_eq!(result.count, 0);
        assert_eq!(result.percent, 0.0);
        println!("[VERIFIED] self comparison under identity LUT scores 0");
    }

    #[test]
    fn test_relabeled_image_scores_zero_with_right_lut() {
        let reference = image(array![[0, 1], [2, 0]]);
        // candidate uses numbering 0->1, 1->2, 2->0
        let candidate = image(array![[1, 2], [0, 1]]);
        let lut = LookupTable::from_targets(vec![2, 0, 1]).unwrap();

        let result = DiffScorer::new().score(&reference, &candidate, &lut).unwrap();
        assert_eq!(result.count, 0);

        let identity = LookupTable::identity(3).unwrap();
        let result = DiffScorer::new()
            .score(&reference, &candidate, &identity)
            .unwrap();
        assert_eq!(result.count, 4);
        assert_eq!(result.percent, 100.0);
    }

    #[test]
    fn test_percent_of_area() {
        let reference = image(array![[0, 0, 0, 0], [0, 0, 0, 0]]);
        let candidate = image(array![[0, 1, 0, 0], [0, 0, 0, 1]]);
        let lut = LookupTable::identity(2).unwrap();

        let result = DiffScorer::new().score(&reference, &candidate, &lut).unwrap();
        assert_eq!(result.count, 2);
        assert!((result.percent - 25.0).abs() < 1e-12);
        assert_eq!(result.to_string(), "num of diff pixels=2, % diff=25.00");
    }

    #[test]
    fn test_mask_marks_disagreements() {
        let reference = image(array![[0, 1], [1, 0]]);
        let candidate = image(array![[0, 0], [1, 1]]);
        let lut = LookupTable::identity(2).unwrap();

        let scored = DiffScorer::new()
            .score_with_mask(&reference, &candidate, &lut)
            .unwrap();

        assert_eq!(scored.result.count, 2);
        assert_eq!(
            scored.mask.as_array(),
            &array![[0, HIGHLIGHT], [0, HIGHLIGHT]]
        );
    }

    #[test]
    fn test_shape_mismatch_fails() {
        let a = image(Array2::zeros((2, 2)));
        let b = image(Array2::zeros((2, 3)));
        let lut = LookupTable::identity(1).unwrap();

        let err = DiffScorer::new().score(&a, &b, &lut).unwrap_err();
        assert!(matches!(err, ReconcileError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_empty_image_percent_is_zero() {
        let r = DiffResult::from_count(0, 0);
        assert_eq!(r.percent, 0.0);
    }
}
