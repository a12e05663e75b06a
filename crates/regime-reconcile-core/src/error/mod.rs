//! Error types for regime-reconcile-core.
//!
//! [`ReconcileError`] is the single error type returned by every fallible
//! operation in the crate. Variants fall into three families:
//!
//! - **Input errors**: a neuron artifact, label image or LUT is unusable
//!   (`MissingHeader`, `MalformedHeader`, `MalformedRow`, `ShapeMismatch`,
//!   `LabelOutOfRange`, `InvalidLut`, `Format`). These abort the current
//!   comparison and are never retried.
//! - **Setup errors**: the run cannot start (`MissingDirectory`, `Config`).
//! - **Delegate errors**: an external collaborator failed (`Trainer`,
//!   `Render`, `Io`), or the run was stopped (`Cancelled`).
//!
//! An agreement percentage above the retry threshold is NOT an error. It is a
//! controller decision, see [`crate::controller::RetryDecision`].
//!
//! # Examples
//!
//! ```rust
//! use regime_reconcile_core::error::{ReconcileError, ReconcileResult};
//!
//! fn check(nlabels: usize) -> ReconcileResult<()> {
//!     if nlabels == 0 {
//!         return Err(ReconcileError::config("nlabels must be > 0"));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check(0).unwrap_err().is_setup_error());
//! ```

use std::path::PathBuf;

use thiserror::Error;


/// Unified error type for label reconciliation.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The neuron artifact does not contain the `NEURONS` marker line.
    #[error("could not find NEURONS flag in {}", path.display())]
    MissingHeader {
        /// Artifact that was scanned
        path: PathBuf,
    },

    /// The line after the `NEURONS` marker is not `<nlabels> <ndims>`.
    #[error("malformed NEURONS header in {}: '{line}'", path.display())]
    MalformedHeader {
        /// Artifact that was scanned
        path: PathBuf,
        /// Offending line (empty when the file ended)
        line: String,
    },

    /// A weight row is missing or has fewer tokens than `1 + ndims`.
    #[error(
        "malformed neuron row {row} in {}: expected {expected} tokens, found {found}",
        path.display()
    )]
    MalformedRow {
        /// Artifact that was parsed
        path: PathBuf,
        /// Zero-based row index after the header
        row: usize,
        /// Tokens required (label id + ndims weights)
        expected: usize,
        /// Tokens present
        found: usize,
    },

    /// Two inputs being compared disagree in label count, vector
    /// dimensionality or image dimensions.
    #[error("{what} do not match: {left} vs {right}")]
    ShapeMismatch {
        /// What was compared, e.g. "number of labels"
        what: &'static str,
        /// Rendering of the left-hand shape
        left: String,
        /// Rendering of the right-hand shape
        right: String,
    },

    /// A pixel carries a label the lookup table cannot map.
    #[error("label {label} out of range for lookup table of {nlabels} entries")]
    LabelOutOfRange {
        /// Offending label value
        label: usize,
        /// Size of the table
        nlabels: usize,
    },

    /// A lookup table violates its invariants (empty, out-of-range target,
    /// not a permutation where one is required, unparsable text).
    #[error("invalid lookup table: {reason}")]
    InvalidLut {
        /// What is wrong with it
        reason: String,
    },

    /// A required input directory does not exist.
    #[error("dir: {} does not exist", path.display())]
    MissingDirectory {
        /// Directory that was expected
        path: PathBuf,
    },

    /// Filesystem failure on a specific path.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path being read or written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A persisted array or artifact has an unusable format.
    #[error("format error in {}: {message}", path.display())]
    Format {
        /// Offending file
        path: PathBuf,
        /// Detail
        message: String,
    },

    /// Invalid configuration value or unreadable configuration file.
    #[error("configuration error: {message}")]
    Config {
        /// Detail
        message: String,
    },

    /// The cluster trainer failed or produced incomplete output.
    #[error("cluster trainer failed: {message}")]
    Trainer {
        /// Detail
        message: String,
    },

    /// Rendering a label image failed.
    #[error("render failed: {message}")]
    Render {
        /// Detail
        message: String,
    },

    /// Exhaustive permutation search refused because the factorial cost is
    /// beyond the configured limit.
    #[error("exhaustive search over {nlabels} labels exceeds the limit of {limit}")]
    SearchTooLarge {
        /// Requested label count
        nlabels: usize,
        /// Configured maximum
        limit: usize,
    },

    /// The run was cancelled through its [`crate::cancel::CancelToken`].
    #[error("operation cancelled")]
    Cancelled,
}

impl ReconcileError {
    /// Input errors: the artifacts themselves are inconsistent.
    ///
    /// The command line maps these to exit code 2.
    #[inline]
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::MissingHeader { .. }
                | Self::MalformedHeader { .. }
                | Self::MalformedRow { .. }
                | Self::ShapeMismatch { .. }
                | Self::LabelOutOfRange { .. }
                | Self::InvalidLut { .. }
                | Self::Format { .. }
        )
    }

    /// Setup errors abort before any comparison begins.
    #[inline]
    pub fn is_setup_error(&self) -> bool {
        matches!(self, Self::MissingDirectory { .. } | Self::Config { .. })
    }

    /// Whether retrying the same operation could succeed.
    ///
    /// Always `false`: threshold failures are handled by the controller and
    /// never surface as errors, and everything else is deterministic.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        false
    }

    /// Build an `Io` error for `path`.
    #[inline]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Build a `Format` error for `path`.
    #[inline]
    pub fn format(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Format {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Build a `Config` error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Build an `InvalidLut` error.
    #[inline]
    pub fn invalid_lut(reason: impl Into<String>) -> Self {
        Self::InvalidLut {
            reason: reason.into(),
        }
    }

    /// Build a `ShapeMismatch` error from two debuggable shapes.
    #[inline]
    pub fn shape_mismatch(
        what: &'static str,
        left: impl std::fmt::Debug,
        right: impl std::fmt::Debug,
    ) -> Self {
        Self::ShapeMismatch {
            what,
            left: format!("{:?}", left),
            right: format!("{:?}", right),
        }
    }

    /// Build a `Trainer` error.
    #[inline]
    pub fn trainer(message: impl Into<String>) -> Self {
        Self::Trainer {
            message: message.into(),
        }
    }

    /// Build a `Render` error.
    #[inline]
    pub fn render(message: impl Into<String>) -> Self {
        Self::Render {
            message: message.into(),
        }
    }
}

/// Result type alias for reconciliation operations.
pub type ReconcileResult<T> = std::result::Result<T, ReconcileError>;
