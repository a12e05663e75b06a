//! Per-pixel class histograms.
//!
//! A run's weather labels form a height x width x days cube. Reclustering
//! works on one feature vector per pixel: how often each weather class
//! occurred at that pixel.

use ndarray::{Array3, Axis, Zip};

use crate::error::{ReconcileError, ReconcileResult};

/// Bin index of `value` among `nclasses` equal-width bins spanning
/// `[0, nclasses - 1]`, last bin closed. `None` outside the range.
#[inline]
pub fn bin_index(value: u8, nclasses: usize) -> Option<usize> {
    let value = usize::from(value);
    let upper = nclasses.checked_sub(1)?;
    if value > upper {
        return None;
    }
    if upper == 0 {
        return Some(0);
    }
    Some((value * nclasses / upper).min(upper))
}

/// Histogram each pixel's label sequence into `nclasses` bins.
///
/// Returns a height x width x `nclasses` array of counts. Labels above
/// `nclasses - 1` are not counted.
///
/// # Errors
///
/// `Config` if `nclasses < 2`.
pub fn class_histograms(cube: &Array3<u8>, nclasses: usize) -> ReconcileResult<Array3<i64>> {
    if nclasses < 2 {
        return Err(ReconcileError::config(format!(
            "nclasses must be >= 2, got {}",
            nclasses
        )));
    }
    let (height, width, _) = cube.dim();
    let mut hist = Array3::<i64>::zeros((height, width, nclasses));

    Zip::from(hist.lanes_mut(Axis(2)))
        .and(cube.lanes(Axis(2)))
        .for_each(|mut bins, series| {
            for &value in series.iter() {
                if let Some(b) = bin_index(value, nclasses) {
                    bins[b] += 1;
                }
            }
        });

    Ok(hist)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bin_index_edges() {
        // 25 classes over [0, 24]: bin width 24/25
        assert_eq!(bin_index(0, 25), Some(0));
        assert_eq!(bin_index(1, 25), Some(1));
        assert_eq!(bin_index(23, 25), Some(23));
        assert_eq!(bin_index(24, 25), Some(24));
        assert_eq!(bin_index(25, 25), None);
    }

    #[test]
    fn test_small_class_count_merges_bins() {
        // 3 classes over [0, 2]: bins [0, 2/3), [2/3, 4/3), [4/3, 2]
        assert_eq!(bin_index(0, 3), Some(0));
        assert_eq!(bin_index(1, 3), Some(1));
        assert_eq!(bin_index(2, 3), Some(2));

        // 2 classes over [0, 1]: bins [0, 0.5), [0.5, 1]
        assert_eq!(bin_index(0, 2), Some(0));
        assert_eq!(bin_index(1, 2), Some(1));
        assert_eq!(bin_index(2, 2), None);
    }

    #[test]
    fn test_class_histograms_counts() {
        let mut cube = Array3::<u8>::zeros((1, 2, 4));
        for (d, v) in [0u8, 1, 1, 3].iter().enumerate() {
            cube[[0, 0, d]] = *v;
        }
        for (d, v) in [2u8, 2, 2, 9].iter().enumerate() {
            cube[[0, 1, d]] = *v;
        }

        let hist = class_histograms(&cube, 4).unwrap();
        assert_eq!(hist.dim(), (1, 2, 4));
        let first: Vec<i64> = (0..4).map(|b| hist[[0, 0, b]]).collect();
        assert_eq!(first, vec![1, 2, 0, 1]);
        let second: Vec<i64> = (0..4).map(|b| hist[[0, 1, b]]).collect();
        // label 9 is out of range and dropped
        assert_eq!(second, vec![0, 0, 3, 0]);
        println!("[VERIFIED] histograms: {:?} / {:?}", first, second);
    }

    #[test]
    fn test_rejects_single_class() {
        let cube = Array3::<u8>::zeros((1, 1, 1));
        assert!(class_histograms(&cube, 1).is_err());
    }
}
