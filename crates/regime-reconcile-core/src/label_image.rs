//! Label images.

use ndarray::{Array2, ArrayView2};

use crate::error::{ReconcileError, ReconcileResult};
use crate::lut::LookupTable;

/// 2D grid of integer labels (rows = height, columns = width).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelImage {
    pixels: Array2<u8>,
}

impl LabelImage {
    /// Wrap an existing array.
    pub fn new(pixels: Array2<u8>) -> Self {
        Self { pixels }
    }

    /// Build from row vectors.
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` if rows have different lengths.
    pub fn from_rows(rows: Vec<Vec<u8>>) -> ReconcileResult<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().find(|r| r.len() != width) {
            return Err(ReconcileError::shape_mismatch(
                "row lengths",
                width,
                bad.len(),
            ));
        }
        let flat: Vec<u8> = rows.into_iter().flatten().collect();
        let pixels = Array2::from_shape_vec((height, width), flat)
            .map_err(|e| ReconcileError::format("<rows>", e.to_string()))?;
        Ok(Self { pixels })
    }

    /// `(height, width)`.
    #[inline]
    pub fn dim(&self) -> (usize, usize) {
        self.pixels.dim()
    }

    /// `height * width`.
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }

    /// Largest label present, `None` for an empty image.
    pub fn max_label(&self) -> Option<u8> {
        self.pixels.iter().copied().max()
    }

    /// Borrow the pixels.
    pub fn view(&self) -> ArrayView2<'_, u8> {
        self.pixels.view()
    }

    /// Borrow the underlying array.
    pub fn as_array(&self) -> &Array2<u8> {
        &self.pixels
    }

    /// Take the underlying array.
    pub fn into_array(self) -> Array2<u8> {
        self.pixels
    }

    /// Relabel through `lut`.
    pub fn transcribe(&self, lut: &LookupTable) -> ReconcileResult<Self> {
        lut.transcribe(&self.pixels).map(Self::new)
    }

    /// Fail with `ShapeMismatch` unless `other` has identical dimensions.
    pub fn ensure_same_shape(&self, other: &LabelImage) -> ReconcileResult<()> {
        if self.dim() != other.dim() {
            return Err(ReconcileError::shape_mismatch(
                "image dimensions",
                self.dim(),
                other.dim(),
            ));
        }
        Ok(())
    }
}

impl From<Array2<u8>> for LabelImage {
    fn from(pixels: Array2<u8>) -> Self {
        Self::new(pixels)
    }
}
