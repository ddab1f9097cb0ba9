use crate::config::{DatasetConfig, LabelEncoding, StateRole};
use crate::corpus::{CorpusIndex, LevelMatch};
use crate::features::FeatureRequest;
use crate::io::read_level;
use crate::provider::{checked_config, FeatureStore, SampleProvider};
use crate::reduced::{ReducedStateEncoder, StateSequencer, StateVocabulary};
use crate::timebase::StepPolicy;
use crate::types::{FeatureMatrix, ProgressEvent, ProgressSink, ProgressStage, Sample};
use crate::window::normalize_in_place;
use crate::NoteGridError;
use ndarray::{concatenate, s, Array2, Array3, Axis};
use std::sync::Arc;

/// One whole-song sample per level: features gathered at the steps where the
/// level's state changes, paired with the reduced-state sequence.
pub struct ReducedStateSampleProvider {
    corpus: CorpusIndex,
    store: FeatureStore,
    encoder: ReducedStateEncoder,
    step: StepPolicy,
    receptive_field: usize,
    state_role: StateRole,
    request: FeatureRequest,
}

impl ReducedStateSampleProvider {
    pub fn new(
        config: &DatasetConfig,
        sequencer: Box<dyn StateSequencer>,
        vocabulary: Arc<StateVocabulary>,
        progress: &mut dyn ProgressSink,
    ) -> Result<Self, NoteGridError> {
        checked_config(config)?;
        let strategy = config.strategy();
        if strategy.encoding != LabelEncoding::ReducedState {
            return Err(NoteGridError::Configuration(
                "reduced-state provider built from a grid config".to_string(),
            ));
        }
        if vocabulary.is_empty() {
            return Err(NoteGridError::Configuration(
                "state vocabulary is empty".to_string(),
            ));
        }
        let request = FeatureRequest::with_hop(
            config.audio.sampling_rate,
            config.audio.hop_length,
            config.features.feature_size,
        );
        let mut store = FeatureStore::new(config, strategy.features, None)?;

        // a song must leave at least one step after the input window and its shifts
        let needed = config.windowing.input_length() + config.windowing.time_shifts - 1;
        let candidates = CorpusIndex::discover(
            &config.data_dir,
            &config.audio.extension,
            &config.levels.difficulties(),
            LevelMatch::All,
        )?;
        progress.on_progress(ProgressEvent {
            stage: ProgressStage::Discover,
            progress: 1.0,
        });
        let corpus = CorpusIndex::build(
            candidates,
            |next, entry| {
                let probed = store.probe(&entry.audio, &request)?;
                let keep = probed.frames as i64 - needed as i64 >= 1;
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
            encoder: ReducedStateEncoder::new(
                sequencer,
                vocabulary,
                config.labels.top_k,
                config.labels.max_token_seq_len,
            ),
            step: strategy.step,
            receptive_field: config.windowing.receptive_field,
            state_role: strategy.state_role,
            request,
        })
    }

    pub fn corpus(&self) -> &CorpusIndex {
        &self.corpus
    }
}

impl SampleProvider for ReducedStateSampleProvider {
    fn get_sample(&mut self, index: usize) -> Result<Sample, NoteGridError> {
        let entry = self.corpus.entry(index)?;
        let bpm = read_level(&entry.level)?.beats_per_minute;
        let step_seconds = self.step.step_seconds(bpm)?;
        let beat_subdivision = self.step.beat_subdivision(bpm)?;
        let features = self.store.features(index, &entry.audio, &self.request)?;

        let padded = pad_frames(&features, self.receptive_field, 1);
        let duration_seconds = padded.ncols() as f64 * step_seconds;
        let sequence = self
            .encoder
            .encode(&entry.level, duration_seconds, bpm, beat_subdivision)?;
        if let Some(&bad) = sequence.frame_indices.iter().find(|&&i| i >= padded.ncols()) {
            return Err(NoteGridError::Collaborator(format!(
                "frame index {} outside {} padded frames",
                bad,
                padded.ncols()
            )));
        }

        let mut song = padded.select(Axis(1), &sequence.frame_indices);
        normalize_in_place(&mut song);

        let tokens = sequence.len();
        let states = sequence.states.view().insert_axis(Axis(0));
        let (input, target) = match self.state_role {
            StateRole::Target => {
                let forward = sequence.delta_forward.mapv(f32::trunc);
                let backward = sequence.delta_backward.mapv(f32::trunc);
                let input = concatenate(Axis(0), &[song.view(), forward.view(), backward.view()])
                    .map_err(|e| NoteGridError::Collaborator(e.to_string()))?;
                (input, states.to_owned())
            }
            StateRole::DecoderInput => {
                let forward = sequence.delta_forward.mapv(|v| v as i64);
                let backward = sequence.delta_backward.mapv(|v| v as i64);
                let target = concatenate(
                    Axis(0),
                    &[
                        states,
                        sequence.one_hot_states.view(),
                        forward.view(),
                        backward.view(),
                    ],
                )
                .map_err(|e| NoteGridError::Collaborator(e.to_string()))?;
                (song, target)
            }
        };

        log::debug!(
            "song {}: {} state tokens ({} songs cached)",
            index,
            tokens,
            self.store.cached_songs()
        );
        Ok(Sample {
            input: batch_of_one(input),
            target: batch_of_one(target),
            window_starts: Vec::new(),
        })
    }

    fn corpus_size(&self) -> usize {
        self.corpus.len()
    }
}

/// Adds `left` zero frames before and `right` after the song.
pub fn pad_frames(features: &FeatureMatrix, left: usize, right: usize) -> FeatureMatrix {
    let frames = features.ncols();
    let mut padded = Array2::<f32>::zeros((features.nrows(), left + frames + right));
    padded.slice_mut(s![.., left..left + frames]).assign(features);
    padded
}

fn batch_of_one<A>(matrix: Array2<A>) -> Array3<A> {
    matrix.insert_axis(Axis(0))
}
