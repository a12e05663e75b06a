//! File layout of run directories and pair directories.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ReconcileError, ReconcileResult};
use crate::lut::MAX_LABELS;

fn default_weather_labels() -> String {
    "labels.npy".to_string()
}

fn default_weather_neurons() -> String {
    "weather.labels".to_string()
}

fn default_cluster_image() -> String {
    "cluster.npy".to_string()
}

fn default_cluster_neurons() -> String {
    "cluster.labels".to_string()
}

fn default_cluster_render() -> String {
    "cluster.png".to_string()
}

fn default_tally_name() -> String {
    "tally_diffs.txt".to_string()
}

fn default_report_name() -> String {
    "reconcile_report.json".to_string()
}

fn default_nclasses() -> usize {
    25
}

/// Names of the artifacts the pipeline reads and writes.
///
/// Every run directory holds the weather labels of the training period
/// (`weather_labels`, height x width x days), the weather SOM neuron table
/// (`weather_neurons`), and the climate clustering of that run
/// (`cluster_image`, `cluster_neurons`, optionally `cluster_render`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Per-pixel weather class sequence, `.npy`
    #[serde(default = "default_weather_labels")]
    pub weather_labels: String,

    /// Weather SOM neuron table, used when no precomputed LUT exists
    #[serde(default = "default_weather_neurons")]
    pub weather_neurons: String,

    /// Climate cluster label image, `.npy`
    #[serde(default = "default_cluster_image")]
    pub cluster_image: String,

    /// Climate cluster neuron table
    #[serde(default = "default_cluster_neurons")]
    pub cluster_neurons: String,

    /// Rendered climate clusters, copied into pair directories if present
    #[serde(default = "default_cluster_render")]
    pub cluster_render: String,

    /// Directory of precomputed `<tag1>-<tag2>.lut` files
    #[serde(default)]
    pub lut_dir: Option<PathBuf>,

    /// Tally file name inside the output directory
    #[serde(default = "default_tally_name")]
    pub tally_name: String,

    /// JSON run report name inside the output directory
    #[serde(default = "default_report_name")]
    pub report_name: String,

    /// Number of weather classes (identity LUT size, histogram bins)
    #[serde(default = "default_nclasses")]
    pub nclasses: usize,

    /// Also compare every run against itself
    #[serde(default)]
    pub include_self_pairs: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            weather_labels: default_weather_labels(),
            weather_neurons: default_weather_neurons(),
            cluster_image: default_cluster_image(),
            cluster_neurons: default_cluster_neurons(),
            cluster_render: default_cluster_render(),
            lut_dir: None,
            tally_name: default_tally_name(),
            report_name: default_report_name(),
            nclasses: default_nclasses(),
            include_self_pairs: false,
        }
    }
}

impl LayoutConfig {
    /// Validate values.
    pub fn validate(&self) -> ReconcileResult<()> {
        if self.nclasses < 2 || self.nclasses > MAX_LABELS {
            return Err(ReconcileError::config(format!(
                "nclasses must be in 2..={}, got {}",
                MAX_LABELS, self.nclasses
            )));
        }
        let names = [
            ("weather_labels", &self.weather_labels),
            ("weather_neurons", &self.weather_neurons),
            ("cluster_image", &self.cluster_image),
            ("cluster_neurons", &self.cluster_neurons),
            ("tally_name", &self.tally_name),
            ("report_name", &self.report_name),
        ];
        for (key, value) in names {
            if value.trim().is_empty() {
                return Err(ReconcileError::config(format!("{} must not be empty", key)));
            }
        }
        Ok(())
    }
}
