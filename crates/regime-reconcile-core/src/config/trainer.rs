//! Parameters handed to the external cluster trainer.
//!
//! The trainer is an external SOM program. These values are written next to
//! its input as `trainer.toml` and are otherwise opaque to this crate.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ReconcileError, ReconcileResult};

/// SOM neighborhood function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Neighborhood {
    /// Gaussian kernel
    #[default]
    Gaussian,
    /// Mexican hat kernel
    MexicanHat,
    /// Hard bubble
    Bubble,
    /// Triangle kernel
    Triangle,
}

/// SOM grid topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// Hexagonal lattice
    #[default]
    Hexagonal,
    /// Rectangular lattice
    Rectangular,
}

/// Distance used to find the best-matching unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActivationDistance {
    /// L2
    #[default]
    Euclidean,
    /// Cosine distance
    Cosine,
    /// L1
    Manhattan,
    /// L-infinity
    Chebyshev,
}

/// Weight initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InitWeights {
    /// Principal component spanning
    #[default]
    Pca,
    /// Random samples
    Random,
}

/// What the trainer writes as its image output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputType {
    /// Label (winning neuron index) per pixel
    #[default]
    Labels,
    /// Quantization error per pixel
    Errors,
}

fn default_program() -> PathBuf {
    PathBuf::from("msom-train")
}

fn default_grid_shape() -> [usize; 2] {
    [3, 4]
}

fn default_sigma() -> f64 {
    2.0
}

fn default_epochs() -> usize {
    30
}

fn default_learning_rate() -> f64 {
    0.3
}

fn default_decay_function() -> u32 {
    4
}

fn default_apply_classification() -> bool {
    true
}

/// Cluster trainer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Trainer executable
    #[serde(default = "default_program")]
    pub program: PathBuf,

    /// Extra arguments appended after the standard ones
    #[serde(default)]
    pub args: Vec<String>,

    /// SOM grid `[rows, cols]`; the label count is `rows * cols`
    #[serde(default = "default_grid_shape")]
    pub grid_shape: [usize; 2],

    /// Initial neighborhood radius
    #[serde(default = "default_sigma")]
    pub sigma: f64,

    /// Full passes over the data
    #[serde(default = "default_epochs")]
    pub epochs: usize,

    /// Initial learning rate
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// Neighborhood function
    #[serde(default)]
    pub neighborhood: Neighborhood,

    /// Grid topology
    #[serde(default)]
    pub topology: Topology,

    /// Best-matching-unit distance
    #[serde(default)]
    pub activation_distance: ActivationDistance,

    /// Weight initialization
    #[serde(default)]
    pub init_weights: InitWeights,

    /// Output image content
    #[serde(default)]
    pub output_type: OutputType,

    /// Trainer-specific decay schedule selector
    #[serde(default = "default_decay_function")]
    pub decay_function: u32,

    /// Fixed seed for deterministic training; random when unset
    #[serde(default)]
    pub deterministic_seed: Option<u64>,

    /// Classify every pixel after training
    #[serde(default = "default_apply_classification")]
    pub apply_classification: bool,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: Vec::new(),
            grid_shape: default_grid_shape(),
            sigma: default_sigma(),
            epochs: default_epochs(),
            learning_rate: default_learning_rate(),
            neighborhood: Neighborhood::default(),
            topology: Topology::default(),
            activation_distance: ActivationDistance::default(),
            init_weights: InitWeights::default(),
            output_type: OutputType::default(),
            decay_function: default_decay_function(),
            deterministic_seed: None,
            apply_classification: default_apply_classification(),
        }
    }
}

impl TrainerConfig {
    /// Number of labels the trained map produces.
    pub fn nlabels(&self) -> usize {
        self.grid_shape[0] * self.grid_shape[1]
    }

    /// Validate values.
    pub fn validate(&self) -> ReconcileResult<()> {
        if self.grid_shape[0] == 0 || self.grid_shape[1] == 0 {
            return Err(ReconcileError::config(format!(
                "grid_shape must be non-zero, got {:?}",
                self.grid_shape
            )));
        }
        if self.epochs == 0 {
            return Err(ReconcileError::config("epochs must be > 0"));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(ReconcileError::config(format!(
                "learning_rate must be a finite positive number, got {}",
                self.learning_rate
            )));
        }
        if !(self.sigma > 0.0 && self.sigma.is_finite()) {
            return Err(ReconcileError::config(format!(
                "sigma must be a finite positive number, got {}",
                self.sigma
            )));
        }
        if self.program.as_os_str().is_empty() {
            return Err(ReconcileError::config("program must not be empty"));
        }
        Ok(())
    }
}
