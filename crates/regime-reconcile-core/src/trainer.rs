//! Cluster trainer adapter.
//!
//! Reclustering is delegated to an external SOM trainer. The trainer reads a
//! per-pixel feature image and writes a label image plus a neuron table in
//! the format [`crate::neuron::NeuronTable`] parses.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info, warn};

use crate::config::TrainerConfig;
use crate::error::{ReconcileError, ReconcileResult};

/// Label image written by the trainer.
pub const TRAINER_LABEL_IMAGE: &str = "cluster.npy";

/// Neuron table written by the trainer.
pub const TRAINER_NEURONS: &str = "cluster.labels";

/// Parameter file handed to the trainer.
pub const TRAINER_PARAMS: &str = "trainer.toml";

/// Files produced by one training run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainerOutput {
    /// Per-pixel cluster labels, `.npy`
    pub label_image_path: PathBuf,
    /// Neuron table with the `NEURONS` header
    pub neurons_path: PathBuf,
}

impl TrainerOutput {
    /// Expected output locations inside `outdir`.
    pub fn in_dir(outdir: &Path) -> Self {
        Self {
            label_image_path: outdir.join(TRAINER_LABEL_IMAGE),
            neurons_path: outdir.join(TRAINER_NEURONS),
        }
    }

    /// Fail with `Trainer` if any output file is absent.
    pub fn ensure_present(&self) -> ReconcileResult<()> {
        for path in [&self.label_image_path, &self.neurons_path] {
            if !path.is_file() {
                return Err(ReconcileError::trainer(format!(
                    "trainer did not produce {}",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// Produces a clustering from a feature image.
pub trait ClusterTrainer {
    /// Train on `feature_path` and write outputs into `outdir`.
    fn train(
        &self,
        feature_path: &Path,
        outdir: &Path,
        config: &TrainerConfig,
    ) -> ReconcileResult<TrainerOutput>;
}

/// Runs the configured trainer program synchronously.
///
/// Invocation: `<program> --input <feature.npy> --outdir <dir> --params
/// <dir>/trainer.toml [args...]`.
#[derive(Debug, Clone, Default)]
pub struct CommandTrainer;

impl CommandTrainer {
    /// Create a trainer adapter.
    pub fn new() -> Self {
        Self
    }

    fn write_params(outdir: &Path, config: &TrainerConfig) -> ReconcileResult<PathBuf> {
        let path = outdir.join(TRAINER_PARAMS);
        let text = toml::to_string_pretty(config)
            .map_err(|e| ReconcileError::trainer(format!("cannot serialize parameters: {}", e)))?;
        fs::write(&path, text).map_err(|e| ReconcileError::io(&path, e))?;
        Ok(path)
    }
}

impl ClusterTrainer for CommandTrainer {
    fn train(
        &self,
        feature_path: &Path,
        outdir: &Path,
        config: &TrainerConfig,
    ) -> ReconcileResult<TrainerOutput> {
        let params = Self::write_params(outdir, config)?;

        info!(
            program = %config.program.display(),
            outdir = %outdir.display(),
            epochs = config.epochs,
            learning_rate = config.learning_rate,
            "training cluster map"
        );

        let output = Command::new(&config.program)
            .arg("--input")
            .arg(feature_path)
            .arg("--outdir")
            .arg(outdir)
            .arg("--params")
            .arg(&params)
            .args(&config.args)
            .output()
            .map_err(|e| {
                ReconcileError::trainer(format!(
                    "failed to start {}: {}",
                    config.program.display(),
                    e
                ))
            })?;

        if !output.stdout.is_empty() {
            debug!(stdout = %String::from_utf8_lossy(&output.stdout).trim_end(), "trainer output");
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = %output.status, stderr = %stderr.trim_end(), "trainer failed");
            return Err(ReconcileError::trainer(format!(
                "{} exited with {}: {}",
                config.program.display(),
                output.status,
                stderr.trim()
            )));
        }

        let produced = TrainerOutput::in_dir(outdir);
        produced.ensure_present()?;
        Ok(produced)
    }
}
