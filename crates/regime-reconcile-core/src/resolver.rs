//! Weather-class LUT lookup for a run pair.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::LayoutConfig;
use crate::error::ReconcileResult;
use crate::lut::LookupTable;
use crate::matcher::LabelMatcher;
use crate::neuron::NeuronTable;
use crate::runs::RunPair;

/// Where a resolved LUT came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LutSource {
    /// Self pair; the identity table
    Identity,
    /// Precomputed artifact
    File(PathBuf),
    /// Computed from the two runs' weather neuron tables
    Matched,
}

/// Resolves the LUT that maps the first run's weather classes onto the
/// second run's.
///
/// Order: identity for a self pair (no filesystem access), then
/// `<lut_dir>/<tag1>-<tag2>.lut` if it exists, then the matcher over the
/// weather neuron tables with the second run as reference.
pub struct LutResolver<'a> {
    layout: &'a LayoutConfig,
    matcher: &'a dyn LabelMatcher,
}

impl<'a> LutResolver<'a> {
    /// Create a resolver.
    pub fn new(layout: &'a LayoutConfig, matcher: &'a dyn LabelMatcher) -> Self {
        Self { layout, matcher }
    }

    /// Path a precomputed LUT for `pair` would have.
    pub fn lut_path(&self, pair: &RunPair) -> Option<PathBuf> {
        self.layout
            .lut_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.lut", pair.tag())))
    }

    /// Resolve the LUT for `pair`.
    pub fn resolve(&self, pair: &RunPair) -> ReconcileResult<(LookupTable, LutSource)> {
        if pair.is_self_pair() {
            info!(pair = %pair.tag(), "using the standard look-up table");
            return Ok((LookupTable::identity(self.layout.nclasses)?, LutSource::Identity));
        }

        if let Some(path) = self.lut_path(pair).filter(|p| p.is_file()) {
            info!(pair = %pair.tag(), path = %path.display(), "getting the look-up table from file");
            let lut = LookupTable::read_from(&path)?;
            return Ok((lut, LutSource::File(path)));
        }

        let reference = NeuronTable::from_file(pair.second.artifact(&self.layout.weather_neurons))?;
        let candidate = NeuronTable::from_file(pair.first.artifact(&self.layout.weather_neurons))?;
        let lut = self.matcher.match_tables(&reference, &candidate)?;
        info!(
            pair = %pair.tag(),
            matcher = self.matcher.name(),
            lut = %lut,
            "matched weather neuron tables"
        );
        Ok((lut, LutSource::Matched))
    }

    /// Resolve and persist the LUT into `pair_dir` as `<tag>.lut`.
    pub fn resolve_into(
        &self,
        pair: &RunPair,
        pair_dir: &Path,
    ) -> ReconcileResult<(LookupTable, LutSource)> {
        let (lut, source) = self.resolve(pair)?;
        lut.write_to(pair_dir.join(format!("{}.lut", pair.tag())))?;
        Ok((lut, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{DistanceMetric, GreedyMatcher};
    use crate::runs::{pair_schedule, RunDirectory};
    use std::fs;
    use tempfile::TempDir;

    fn neurons(rows: &[[f64; 2]]) -> String {
        let mut s = String::from("# weather SOM\nNEURONS\n");
        s.push_str(&format!("{} 2\n", rows.len()));
        for (i, r) in rows.iter().enumerate() {
            s.push_str(&format!("{} {} {}\n", i, r[0], r[1]));
        }
        s
    }

    #[test]
    fn test_self_pair_is_identity_without_files() {
        let layout = LayoutConfig {
            nclasses: 3,
            lut_dir: Some(PathBuf::from("/definitely/not/here")),
            ..LayoutConfig::default()
        };
        let matcher = GreedyMatcher::new(DistanceMetric::Euclidean);
        let runs = vec![RunDirectory::new("/missing/SOM_02")];
        let pair = pair_schedule(&runs, true).remove(0);

        let (lut, source) = LutResolver::new(&layout, &matcher).resolve(&pair).unwrap();
        assert_eq!(source, LutSource::Identity);
        assert_eq!(lut.to_string(), "0,1,2");
    }

    #[test]
    fn test_file_preferred_over_matcher() {
        let tmp = TempDir::new().unwrap();
        let lut_dir = tmp.path().join("LUTs");
        fs::create_dir(&lut_dir).unwrap();
        fs::write(lut_dir.join("02-03.lut"), "2,0,1\n").unwrap();

        let layout = LayoutConfig {
            lut_dir: Some(lut_dir.clone()),
            ..LayoutConfig::default()
        };
        let matcher = GreedyMatcher::new(DistanceMetric::Euclidean);
        let runs = vec![
            RunDirectory::new(tmp.path().join("SOM_02")),
            RunDirectory::new(tmp.path().join("SOM_03")),
        ];
        let pair = pair_schedule(&runs, false).remove(0);

        let (lut, source) = LutResolver::new(&layout, &matcher).resolve(&pair).unwrap();
        assert_eq!(lut.targets(), vec![2, 0, 1]);
        assert_eq!(source, LutSource::File(lut_dir.join("02-03.lut")));
    }

    #[test]
    fn test_matcher_fallback_maps_first_onto_second() {
        let tmp = TempDir::new().unwrap();
        let first = tmp.path().join("SOM_02");
        let second = tmp.path().join("SOM_03");
        fs::create_dir(&first).unwrap();
        fs::create_dir(&second).unwrap();
        // first run's label 0 sits where second run's label 2 is, etc.
        fs::write(first.join("weather.labels"), neurons(&[[5.0, 5.0], [0.0, 0.0], [9.0, 1.0]])).unwrap();
        fs::write(second.join("weather.labels"), neurons(&[[0.1, 0.0], [9.0, 1.1], [5.0, 5.2]])).unwrap();

        let layout = LayoutConfig::default();
        let matcher = GreedyMatcher::new(DistanceMetric::Euclidean);
        let pair = pair_schedule(&[RunDirectory::new(&first), RunDirectory::new(&second)], false)
            .remove(0);
        let out = tmp.path().join("out");
        fs::create_dir(&out).unwrap();

        let (lut, source) = LutResolver::new(&layout, &matcher)
            .resolve_into(&pair, &out)
            .unwrap();
        assert_eq!(source, LutSource::Matched);
        assert_eq!(lut.targets(), vec![2, 0, 1]);
        assert_eq!(fs::read_to_string(out.join("02-03.lut")).unwrap(), "2,0,1\n");
    }

    #[test]
    fn test_missing_neurons_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let layout = LayoutConfig::default();
        let matcher = GreedyMatcher::new(DistanceMetric::Euclidean);
        let runs = vec![
            RunDirectory::new(tmp.path().join("SOM_02")),
            RunDirectory::new(tmp.path().join("SOM_03")),
        ];
        let pair = pair_schedule(&runs, false).remove(0);

        let err = LutResolver::new(&layout, &matcher).resolve(&pair).unwrap_err();
        assert!(err.to_string().contains("weather.labels"), "{}", err);
    }
}
