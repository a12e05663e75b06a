//! Full comparison of one run pair.
//!
//! For a pair `(first, second)` the pipeline:
//!
//! 1. prepares `<out>/<tag1>-<tag2>/` and copies the runs' cluster artifacts
//! 2. resolves the weather LUT (first run's classes onto the second's)
//! 3. transcribes the first run's weather labels and histograms them per pixel
//! 4. reclusters the histograms with the [`ClusterTrainer`]
//! 5. matches the recluster onto the second run's clustering
//! 6. transcribes the second run's cluster image and scores it against the
//!    recluster
//!
//! If the first run's weather classes line up with the second's, the
//! recluster reproduces the second run's regimes and the score is low.

use std::path::{Path, PathBuf};

use ndarray::Array3;
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::config::ReconcileConfig;
use crate::controller::PairComparator;
use crate::diff::{DiffResult, DiffScorer};
use crate::error::ReconcileResult;
use crate::histogram::class_histograms;
use crate::label_image::LabelImage;
use crate::lut::LookupTable;
use crate::matcher::{LabelMatcher, MatchStrategy};
use crate::neuron::NeuronTable;
use crate::permutation::PermutationSearcher;
use crate::render::{Palette, PngRenderer, Renderer};
use crate::resolver::LutResolver;
use crate::runs::{copy_pair_artifacts, ensure_dir, RunPair};
use crate::source::{write_npy, ArraySource, NpyArraySource};
use crate::trainer::{ClusterTrainer, CommandTrainer, TrainerOutput};

/// Transcribed weather labels, `f32`.
pub const TRANSCRIBED_LABELS: &str = "transcribed_labels.npy";
/// Per-pixel class histograms, `i64`.
pub const HISTOGRAMS: &str = "hist.npy";
/// Second run's cluster image after transcription, `u8`.
pub const TRANSCRIBED_CLUSTER: &str = "transcribed_cluster.npy";
/// Render of [`TRANSCRIBED_CLUSTER`].
pub const TRANSCRIBED_CLUSTER_RENDER: &str = "transcribed_cluster.png";
/// Highlight map of disagreeing pixels.
pub const DIFF_RENDER: &str = "diff_pixels.png";
/// Render of the recluster.
pub const RECLUSTER_RENDER: &str = "cluster.png";
/// LUT used on the second run's cluster image.
pub const CLUSTER_LUT: &str = "cluster.lut";

/// [`PairComparator`] running the full recluster-and-score pipeline.
pub struct PipelineComparator<'a> {
    config: &'a ReconcileConfig,
    out_dir: PathBuf,
    source: Box<dyn ArraySource + 'a>,
    trainer: Box<dyn ClusterTrainer + 'a>,
    renderer: Box<dyn Renderer + 'a>,
    weather_matcher: Box<dyn LabelMatcher + Send + Sync>,
    cluster_palette: Option<Palette>,
    diff_palette: Palette,
    scorer: DiffScorer,
    cancel: CancelToken,
}

impl<'a> PipelineComparator<'a> {
    /// Comparator writing pair directories under `out_dir`, using `.npy`
    /// arrays, the configured trainer program and PNG renders.
    ///
    /// # Errors
    ///
    /// `Io`/`Format` if a configured palette file is unreadable.
    pub fn new(
        config: &'a ReconcileConfig,
        out_dir: impl Into<PathBuf>,
        cancel: CancelToken,
    ) -> ReconcileResult<Self> {
        let cluster_palette = config
            .render
            .cluster_palette
            .as_deref()
            .map(Palette::from_file)
            .transpose()?;
        let diff_palette = match config.render.diff_palette.as_deref() {
            Some(path) => Palette::from_file(path)?,
            None => Palette::highlight(),
        };
        Ok(Self {
            config,
            out_dir: out_dir.into(),
            source: Box::new(NpyArraySource::new()),
            trainer: Box::new(CommandTrainer::new()),
            renderer: Box::new(PngRenderer::new()),
            weather_matcher: config.matching.strategy.table_matcher(config.matching.metric),
            cluster_palette,
            diff_palette,
            scorer: DiffScorer::new(),
            cancel,
        })
    }

    /// Replace the cluster trainer.
    pub fn with_trainer(mut self, trainer: impl ClusterTrainer + 'a) -> Self {
        self.trainer = Box::new(trainer);
        self
    }

    /// Replace the renderer.
    pub fn with_renderer(mut self, renderer: impl Renderer + 'a) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    /// Replace the array source.
    pub fn with_source(mut self, source: impl ArraySource + 'a) -> Self {
        self.source = Box::new(source);
        self
    }

    fn transcribe_weather(
        &self,
        pair: &RunPair,
        pair_dir: &Path,
        lut: &LookupTable,
    ) -> ReconcileResult<Array3<u8>> {
        let path = pair.first.artifact(&self.config.layout.weather_labels);
        let cube = self.source.load_label_cube(&path)?;
        info!(path = %path.display(), shape = ?cube.dim(), "transcribing weather labels");
        let transcribed = lut.transcribe(&cube)?;
        write_npy(&pair_dir.join(TRANSCRIBED_LABELS), &transcribed.mapv(f32::from))?;
        Ok(transcribed)
    }

    fn recluster(&self, pair_dir: &Path, transcribed: &Array3<u8>) -> ReconcileResult<TrainerOutput> {
        let nclasses = self.config.layout.nclasses;
        let hist = class_histograms(transcribed, nclasses)?;
        let hist_path = pair_dir.join(HISTOGRAMS);
        write_npy(&hist_path, &hist)?;
        debug!(path = %hist_path.display(), nclasses, "wrote class histograms");

        self.cancel.check()?;
        self.trainer.train(&hist_path, pair_dir, &self.config.trainer)
    }

    fn cluster_lut(
        &self,
        pair: &RunPair,
        trained: &TrainerOutput,
        reclustered: &LabelImage,
        second: &LabelImage,
    ) -> ReconcileResult<LookupTable> {
        let reference = NeuronTable::from_file(&trained.neurons_path)?;
        let matching = &self.config.matching;

        let lut = match matching.strategy {
            MatchStrategy::Exhaustive => {
                let searcher =
                    PermutationSearcher::new(matching.max_exhaustive_labels, matching.progress_interval)
                        .with_parallel(matching.parallel);
                searcher
                    .search(reclustered, second, reference.nlabels(), &self.cancel)?
                    .lut
            }
            strategy => {
                let candidate = NeuronTable::from_file(
                    pair.second.artifact(&self.config.layout.cluster_neurons),
                )?;
                strategy
                    .table_matcher(matching.metric)
                    .match_tables(&reference, &candidate)?
            }
        };
        info!(pair = %pair.tag(), strategy = matching.strategy.as_str(), lut = %lut, "matched cluster labels");
        Ok(lut)
    }

    fn render(&self, image: &LabelImage, palette: &Palette, path: &Path) -> ReconcileResult<()> {
        if self.config.render.enabled {
            self.renderer.render(image, palette, path)?;
        }
        Ok(())
    }

    fn cluster_palette(&self, nlabels: usize) -> Palette {
        self.cluster_palette
            .clone()
            .unwrap_or_else(|| Palette::rainbow(nlabels))
    }
}

impl PairComparator for PipelineComparator<'_> {
    fn compare(&mut self, pair: &RunPair) -> ReconcileResult<DiffResult> {
        let layout = &self.config.layout;
        let pair_dir = pair.output_dir(&self.out_dir);
        ensure_dir(&pair_dir)?;
        info!(pair = %pair.tag(), dir = %pair_dir.display(), "comparing runs");

        let second_cluster_path = copy_pair_artifacts(pair, &pair_dir, layout)?;

        let resolver = LutResolver::new(layout, self.weather_matcher.as_ref());
        let (weather_lut, lut_source) = resolver.resolve_into(pair, &pair_dir)?;
        debug!(pair = %pair.tag(), source = ?lut_source, "weather LUT resolved");

        let transcribed = self.transcribe_weather(pair, &pair_dir, &weather_lut)?;
        let trained = self.recluster(&pair_dir, &transcribed)?;

        let reclustered = self.source.load_label_image(&trained.label_image_path)?;
        let second = self.source.load_label_image(&second_cluster_path)?;

        let cluster_lut = self.cluster_lut(pair, &trained, &reclustered, &second)?;
        cluster_lut.write_to(pair_dir.join(CLUSTER_LUT))?;

        let scored = self.scorer.score_with_mask(&reclustered, &second, &cluster_lut)?;
        write_npy(&pair_dir.join(TRANSCRIBED_CLUSTER), scored.transcribed.as_array())?;

        let palette = self.cluster_palette(cluster_lut.len());
        self.render(&reclustered, &palette, &pair_dir.join(RECLUSTER_RENDER))?;
        self.render(&scored.transcribed, &palette, &pair_dir.join(TRANSCRIBED_CLUSTER_RENDER))?;
        self.render(&scored.mask, &self.diff_palette, &pair_dir.join(DIFF_RENDER))?;

        Ok(scored.result)
    }
}
