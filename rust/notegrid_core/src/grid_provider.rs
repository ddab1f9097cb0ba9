use crate::config::{DatasetConfig, LabelEncoding};
use crate::corpus::{CorpusIndex, LevelMatch};
use crate::decode::decode_notes;
use crate::features::{FeatureExtractor, FeatureRequest};
use crate::grid::encode_grid;
use crate::io::read_level;
use crate::provider::{checked_config, sampling_rng, FeatureStore, SampleProvider};
use crate::timebase::StepPolicy;
use crate::types::{ProgressEvent, ProgressSink, ProgressStage, Sample, GRID_CELLS, NUM_CLASSES};
use crate::window::WindowSampler;
use crate::NoteGridError;
use ndarray::{s, Array3};
use rand::rngs::StdRng;

/// Samples random windows of features with the many-hot note grid riding along as
/// extra input channels, and the class grid of the following frames as target.
pub struct GridSampleProvider {
    corpus: CorpusIndex,
    store: FeatureStore,
    sampler: WindowSampler,
    step: StepPolicy,
    sampling_rate: f64,
    feature_size: usize,
    rng: StdRng,
}

impl GridSampleProvider {
    pub fn new(
        config: &DatasetConfig,
        extractor: Option<Box<dyn FeatureExtractor>>,
        progress: &mut dyn ProgressSink,
    ) -> Result<Self, NoteGridError> {
        checked_config(config)?;
        let strategy = config.strategy();
        if strategy.encoding != LabelEncoding::Grid {
            return Err(NoteGridError::Configuration(
                "grid provider built from a reduced-state config".to_string(),
            ));
        }
        let sampler = WindowSampler::new(
            config.windowing.receptive_field,
            config.windowing.output_length,
            config.windowing.num_windows,
        )?;
        let sampling_rate = config.audio.sampling_rate;
        let feature_size = config.features.feature_size;
        let step = strategy.step;
        let mut store = FeatureStore::new(config, strategy.features, extractor)?;

        let candidates = CorpusIndex::discover(
            &config.data_dir,
            &config.audio.extension,
            &config.levels.difficulties(),
            LevelMatch::First,
        )?;
        progress.on_progress(ProgressEvent {
            stage: ProgressStage::Discover,
            progress: 1.0,
        });
        let corpus = CorpusIndex::build(
            candidates,
            |next, entry| {
                let level = read_level(&entry.level)?;
                let hop = step.hop_samples(level.beats_per_minute, sampling_rate)?;
                let request = FeatureRequest::with_hop(sampling_rate, hop, feature_size);
                let probed = store.probe(&entry.audio, &request)?;
                let keep = sampler.available_starts(probed.frames) >= sampler.num_windows;
                if keep {
                    store.commit(next, &entry.audio, probed);
                }
                Ok(keep)
            },
            progress,
        )?;

        Ok(Self {
            corpus,
            store,
            sampler,
            step,
            sampling_rate,
            feature_size,
            rng: sampling_rng(config.sampling.seed),
        })
    }

    pub fn corpus(&self) -> &CorpusIndex {
        &self.corpus
    }

    pub fn sampler(&self) -> &WindowSampler {
        &self.sampler
    }
}

impl SampleProvider for GridSampleProvider {
    fn get_sample(&mut self, index: usize) -> Result<Sample, NoteGridError> {
        let entry = self.corpus.entry(index)?;
        let level = read_level(&entry.level)?;
        let bpm = level.beats_per_minute;
        let hop = self.step.hop_samples(bpm, self.sampling_rate)?;
        let request = FeatureRequest::with_hop(self.sampling_rate, hop, self.feature_size);
        let features = self.store.features(index, &entry.audio, &request)?;
        let num_frames = features.ncols();
        let feature_dim = features.nrows();

        let notes = decode_notes(&level.notes, bpm, self.sampling_rate, hop, num_frames)?;
        let labels = encode_grid(num_frames, &notes)?;
        let starts = self.sampler.sample_starts(num_frames, &mut self.rng)?;

        let input_length = self.sampler.input_length();
        let context_channels = GRID_CELLS * NUM_CLASSES;
        let mut input =
            Array3::<f32>::zeros((starts.len(), feature_dim + context_channels, input_length));
        let mut target =
            Array3::<i64>::zeros((starts.len(), self.sampler.output_length, GRID_CELLS));

        for (w, &start) in starts.iter().enumerate() {
            let window = self.sampler.input_window(&*features, start);
            input.slice_mut(s![w, ..feature_dim, ..]).assign(&window);

            // cell-major channels: cell * NUM_CLASSES + class
            let context = self
                .sampler
                .context_window(&labels.many_hot, start)
                .into_shape((context_channels, input_length))
                .map_err(|e| NoteGridError::InvalidInput(e.to_string()))?;
            input.slice_mut(s![w, feature_dim.., ..]).assign(&context);

            target
                .slice_mut(s![w, .., ..])
                .assign(&self.sampler.target_window(&labels.classes, start));
        }

        log::debug!(
            "song {}: {} windows from {} frames ({} notes)",
            index,
            starts.len(),
            num_frames,
            notes.len()
        );
        Ok(Sample {
            input,
            target,
            window_starts: starts,
        })
    }

    fn corpus_size(&self) -> usize {
        self.corpus.len()
    }
}
