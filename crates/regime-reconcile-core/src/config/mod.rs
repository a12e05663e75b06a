//! Run configuration.
//!
//! [`ReconcileConfig`] is built once per run and passed by reference into
//! every operation that needs it. Nothing in the crate keeps configuration in
//! module-level state.
//!
//! # Loading Configuration
//!
//! ```rust,ignore
//! use regime_reconcile_core::ReconcileConfig;
//!
//! let config = ReconcileConfig::from_file("reconcile.toml")?.with_env_overrides();
//! config.validate()?;
//! ```
//!
//! # TOML Structure
//!
//! ```toml
//! [retry]
//! threshold = 4.0        # inf disables retries
//! budget = 2
//!
//! [matching]
//! strategy = "greedy"
//! metric = "euclidean"
//!
//! [layout]
//! weather_labels = "2019_labels.npy"
//! lut_dir = "./LUTs_2017-2021_5x5_4_00724_3_first"
//! nclasses = 25
//!
//! [trainer]
//! program = "msom-train"
//! grid_shape = [3, 4]
//! epochs = 30
//!
//! [render]
//! enabled = true
//! ```

mod layout;
mod trainer;


pub use layout::LayoutConfig;
pub use trainer::{
    ActivationDistance, InitWeights, Neighborhood, OutputType, Topology, TrainerConfig,
};

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ReconcileError, ReconcileResult};
use crate::matcher::{DistanceMetric, MatchStrategy};
use crate::permutation::{DEFAULT_MAX_EXHAUSTIVE_LABELS, DEFAULT_PROGRESS_INTERVAL};

// ============================================================================
// DEFAULT FUNCTIONS
// ============================================================================

fn default_threshold() -> f64 {
    4.0
}

fn default_budget() -> u32 {
    2
}

fn default_max_exhaustive_labels() -> usize {
    DEFAULT_MAX_EXHAUSTIVE_LABELS
}

fn default_progress_interval() -> u64 {
    DEFAULT_PROGRESS_INTERVAL
}

fn default_render_enabled() -> bool {
    true
}

// ============================================================================
// SECTIONS
// ============================================================================

/// Acceptance threshold and retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Percent-difference ceiling for acceptance. `f64::INFINITY` accepts
    /// every comparison on the first attempt.
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Threshold failures tolerated per pair before the pair is abandoned.
    #[serde(default = "default_budget")]
    pub budget: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            budget: default_budget(),
        }
    }
}

impl RetryConfig {
    /// Validate values.
    pub fn validate(&self) -> ReconcileResult<()> {
        if self.threshold.is_nan() || self.threshold < 0.0 {
            return Err(ReconcileError::config(format!(
                "threshold must be >= 0 (or inf), got {}",
                self.threshold
            )));
        }
        Ok(())
    }

    /// Whether retries can ever happen.
    pub fn retries_enabled(&self) -> bool {
        self.threshold.is_finite()
    }
}

/// How LUTs are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Strategy for the cluster LUT.
    #[serde(default)]
    pub strategy: MatchStrategy,

    /// Prototype distance metric.
    #[serde(default)]
    pub metric: DistanceMetric,

    /// Ceiling on `nlabels` for exhaustive search.
    #[serde(default = "default_max_exhaustive_labels")]
    pub max_exhaustive_labels: usize,

    /// Candidates between exhaustive-search progress reports.
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,

    /// Shard exhaustive search across threads.
    #[serde(default)]
    pub parallel: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            strategy: MatchStrategy::default(),
            metric: DistanceMetric::default(),
            max_exhaustive_labels: default_max_exhaustive_labels(),
            progress_interval: default_progress_interval(),
            parallel: false,
        }
    }
}

impl MatchingConfig {
    /// Validate values.
    pub fn validate(&self) -> ReconcileResult<()> {
        if self.max_exhaustive_labels == 0 {
            return Err(ReconcileError::config("max_exhaustive_labels must be > 0"));
        }
        if self.progress_interval == 0 {
            return Err(ReconcileError::config("progress_interval must be > 0"));
        }
        Ok(())
    }
}

/// Rendering of clusters and difference maps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Write PNG renders next to the arrays.
    #[serde(default = "default_render_enabled")]
    pub enabled: bool,

    /// Palette for cluster images; built-in rainbow when unset.
    #[serde(default)]
    pub cluster_palette: Option<PathBuf>,

    /// Palette for difference maps; black/white when unset.
    #[serde(default)]
    pub diff_palette: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            enabled: default_render_enabled(),
            cluster_palette: None,
            diff_palette: None,
        }
    }
}

// ============================================================================
// ROOT CONFIG
// ============================================================================

/// Root configuration for a reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Threshold and retry budget
    #[serde(default)]
    pub retry: RetryConfig,

    /// LUT computation
    #[serde(default)]
    pub matching: MatchingConfig,

    /// File names and directories
    #[serde(default)]
    pub layout: LayoutConfig,

    /// Parameters handed to the cluster trainer
    #[serde(default)]
    pub trainer: TrainerConfig,

    /// Rendering
    #[serde(default)]
    pub render: RenderConfig,
}

impl ReconcileConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// `Config` if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> ReconcileResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ReconcileError::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        toml::from_str(&contents).map_err(|e| {
            ReconcileError::config(format!(
                "Failed to parse TOML in '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(toml: &str) -> ReconcileResult<Self> {
        toml::from_str(toml)
            .map_err(|e| ReconcileError::config(format!("Failed to parse TOML: {}", e)))
    }

    /// Serialize to a TOML string.
    pub fn to_toml_string(&self) -> ReconcileResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ReconcileError::config(format!("Failed to serialize to TOML: {}", e)))
    }

    /// Validate every section, returning the first error.
    pub fn validate(&self) -> ReconcileResult<()> {
        self.retry.validate().map_err(|e| in_section("retry", e))?;
        self.matching.validate().map_err(|e| in_section("matching", e))?;
        self.layout.validate().map_err(|e| in_section("layout", e))?;
        self.trainer.validate().map_err(|e| in_section("trainer", e))?;
        Ok(())
    }

    /// Apply `RECONCILE_*` environment overrides.
    ///
    /// | Variable | Config Path | Type |
    /// |----------|-------------|------|
    /// | `RECONCILE_THRESHOLD` | `retry.threshold` | f64 (`inf` allowed) |
    /// | `RECONCILE_BUDGET` | `retry.budget` | u32 |
    /// | `RECONCILE_STRATEGY` | `matching.strategy` | greedy/optimal/exhaustive |
    /// | `RECONCILE_LUT_DIR` | `layout.lut_dir` | path |
    /// | `RECONCILE_NCLASSES` | `layout.nclasses` | usize |
    /// | `RECONCILE_TRAINER` | `trainer.program` | path |
    /// | `RECONCILE_RENDER` | `render.enabled` | bool |
    ///
    /// Unparsable values are ignored.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = env::var("RECONCILE_THRESHOLD") {
            if let Ok(t) = val.parse::<f64>() {
                self.retry.threshold = t;
            }
        }
        if let Ok(val) = env::var("RECONCILE_BUDGET") {
            if let Ok(b) = val.parse::<u32>() {
                self.retry.budget = b;
            }
        }
        if let Ok(val) = env::var("RECONCILE_STRATEGY") {
            if let Ok(s) = val.parse::<MatchStrategy>() {
                self.matching.strategy = s;
            }
        }
        if let Ok(val) = env::var("RECONCILE_LUT_DIR") {
            self.layout.lut_dir = Some(PathBuf::from(val));
        }
        if let Ok(val) = env::var("RECONCILE_NCLASSES") {
            if let Ok(n) = val.parse::<usize>() {
                self.layout.nclasses = n;
            }
        }
        if let Ok(val) = env::var("RECONCILE_TRAINER") {
            self.trainer.program = PathBuf::from(val);
        }
        if let Ok(val) = env::var("RECONCILE_RENDER") {
            if let Ok(b) = val.parse::<bool>() {
                self.render.enabled = b;
            }
        }
        self
    }
}

/// Prefix a section validation error with `[section]`.
fn in_section(section: &str, err: ReconcileError) -> ReconcileError {
    match err {
        ReconcileError::Config { message } => {
            ReconcileError::config(format!("[{}] {}", section, message))
        }
        other => other,
    }
}
