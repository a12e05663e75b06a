//! Persisted numeric arrays.
//!
//! Label images and label cubes are stored as `.npy` files. Producers are not
//! consistent about the element type (the trainer writes integers, older runs
//! wrote floats), so [`NpyArraySource`] accepts the common numeric dtypes and
//! converts them to `u8` labels.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use ndarray::{Array, ArrayD, Dimension, Ix2, Ix3, IxDyn};
use ndarray_npy::{ReadNpyError, ReadNpyExt, WritableElement};
use tracing::trace;

use crate::error::{ReconcileError, ReconcileResult};
use crate::label_image::LabelImage;

/// Read-only provider of persisted label arrays.
pub trait ArraySource {
    /// Load a 2-D label image.
    fn load_label_image(&self, path: &Path) -> ReconcileResult<LabelImage>;

    /// Load a height x width x samples label cube.
    fn load_label_cube(&self, path: &Path) -> ReconcileResult<ndarray::Array3<u8>>;
}

/// `.npy` backed [`ArraySource`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NpyArraySource;

impl NpyArraySource {
    /// Create a source.
    pub fn new() -> Self {
        Self
    }

    /// Load an array of any rank as `u8` labels.
    ///
    /// # Errors
    ///
    /// - `Io` if the file cannot be read
    /// - `Format` if the header is corrupt, the dtype is unsupported, or a
    ///   value is not a whole number in `0..=255`
    pub fn load_labels(&self, path: &Path) -> ReconcileResult<ArrayD<u8>> {
        let bytes = fs::read(path).map_err(|e| ReconcileError::io(path, e))?;

        if let Some(a) = try_read::<u8>(&bytes, path)? {
            return Ok(a);
        }
        if let Some(a) = try_read::<u16>(&bytes, path)? {
            return integers_to_labels(a.mapv(i64::from), path);
        }
        if let Some(a) = try_read::<i32>(&bytes, path)? {
            return integers_to_labels(a.mapv(i64::from), path);
        }
        if let Some(a) = try_read::<i64>(&bytes, path)? {
            return integers_to_labels(a, path);
        }
        if let Some(a) = try_read::<f32>(&bytes, path)? {
            return floats_to_labels(a.mapv(f64::from), path);
        }
        if let Some(a) = try_read::<f64>(&bytes, path)? {
            return floats_to_labels(a, path);
        }
        Err(ReconcileError::format(
            path,
            "unsupported element type (expected u8, u16, i32, i64, f32 or f64)",
        ))
    }
}

impl ArraySource for NpyArraySource {
    fn load_label_image(&self, path: &Path) -> ReconcileResult<LabelImage> {
        let labels = self.load_labels(path)?;
        let shape = labels.shape().to_vec();
        let pixels = labels
            .into_dimensionality::<Ix2>()
            .map_err(|_| ReconcileError::format(path, format!("expected 2-D array, got shape {:?}", shape)))?;
        trace!(path = %path.display(), shape = ?shape, "loaded label image");
        Ok(LabelImage::new(pixels))
    }

    fn load_label_cube(&self, path: &Path) -> ReconcileResult<ndarray::Array3<u8>> {
        let labels = self.load_labels(path)?;
        let shape = labels.shape().to_vec();
        let cube = labels
            .into_dimensionality::<Ix3>()
            .map_err(|_| ReconcileError::format(path, format!("expected 3-D array, got shape {:?}", shape)))?;
        trace!(path = %path.display(), shape = ?shape, "loaded label cube");
        Ok(cube)
    }
}

/// Persist an array as `.npy`.
pub fn write_npy<T, D>(path: &Path, array: &Array<T, D>) -> ReconcileResult<()>
where
    T: WritableElement,
    D: Dimension,
{
    ndarray_npy::write_npy(path, array).map_err(|e| ReconcileError::format(path, e.to_string()))
}

/// `None` when the file holds a different dtype.
fn try_read<T>(bytes: &[u8], path: &Path) -> ReconcileResult<Option<ArrayD<T>>>
where
    T: ndarray_npy::ReadableElement,
{
    match Array::<T, IxDyn>::read_npy(Cursor::new(bytes)) {
        Ok(a) => Ok(Some(a)),
        Err(ReadNpyError::WrongDescriptor(_)) => Ok(None),
        Err(e) => Err(ReconcileError::format(path, e.to_string())),
    }
}

fn integers_to_labels(values: ArrayD<i64>, path: &Path) -> ReconcileResult<ArrayD<u8>> {
    if let Some(bad) = values.iter().find(|&&v| !(0..=255).contains(&v)) {
        return Err(ReconcileError::format(
            path,
            format!("label value {} outside 0..=255", bad),
        ));
    }
    Ok(values.mapv(|v| v as u8))
}

fn floats_to_labels(values: ArrayD<f64>, path: &Path) -> ReconcileResult<ArrayD<u8>> {
    if let Some(bad) = values
        .iter()
        .find(|&&v| !(v.fract() == 0.0 && (0.0..=255.0).contains(&v)))
    {
        return Err(ReconcileError::format(
            path,
            format!("label value {} is not a whole number in 0..=255", bad),
        ));
    }
    Ok(values.mapv(|v| v as u8))
}
