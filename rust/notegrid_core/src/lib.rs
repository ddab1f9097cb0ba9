//! Beat-aligned note labels and training windows for rhythm-game level models.
//!
//! Songs and their levels live on different clocks: features advance one hop of
//! audio samples at a time while notes are placed in beats. This crate puts both on
//! one frame axis, encodes the notes as dense grid labels (or as a reduced-state
//! sequence) and cuts normalized training samples out of each song.

mod config;
mod corpus;
mod decode;
mod features;
mod grid;
mod grid_provider;
mod io;
mod provider;
mod reduced;
mod state_provider;
mod timebase;
mod types;
mod window;

pub use config::{
    load_config, validate_dataset_config, AudioConfig, ConfigValidationIssue, DatasetConfig,
    DatasetStrategy, FeatureConfig, FeatureSource, LabelConfig, LabelEncoding, LevelConfig,
    ModelHints, SamplingConfig, StateRole, TimingConfig, WindowConfig,
};
pub use corpus::{CorpusEntry, CorpusIndex, LevelMatch};
pub use decode::{decode_notes, event_class, grid_cell};
pub use features::{FeatureCache, FeatureExtractor, FeatureRequest};
pub use grid::{encode_grid, GridLabels};
pub use grid_provider::GridSampleProvider;
pub use io::{precomputed_feature_path, read_feature_matrix, read_level};
pub use provider::SampleProvider;
pub use reduced::{
    GridState, ReducedStateEncoder, StateSequence, StateSequenceRequest, StateSequencer,
    StateVocabulary,
};
pub use state_provider::{pad_frames, ReducedStateSampleProvider};
pub use timebase::{beats_to_frame, beats_to_seconds, seconds_to_frame, StepPolicy};
pub use types::{
    DecodedNote, FeatureMatrix, Level, NoteEvent, ProgressEvent, ProgressSink, ProgressStage,
    Sample, BOMB_CLASS, GRID_CELLS, GRID_LANES, GRID_LAYERS, NUM_CLASSES,
};
pub use window::{normalize_in_place, WindowSampler};

use std::sync::Arc;
use thiserror::Error;
use types::NoopProgressSink;

#[derive(Debug, Error)]
pub enum NoteGridError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("data integrity error: {0}")]
    DataIntegrity(String),
    #[error("insufficient length: {0}")]
    InsufficientLength(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("collaborator error: {0}")]
    Collaborator(String),
    #[error("io error: {0}")]
    Io(String),
}

/// External pieces a dataset may need, depending on its strategy.
#[derive(Default)]
pub struct Collaborators {
    /// Required for grid datasets extracting features on demand.
    pub extractor: Option<Box<dyn FeatureExtractor>>,
    /// Required for reduced-state datasets.
    pub sequencer: Option<Box<dyn StateSequencer>>,
    /// Required for reduced-state datasets; load once and share.
    pub vocabulary: Option<Arc<StateVocabulary>>,
}

/// A sample provider picked from the config's label encoding.
pub enum Dataset {
    Grid(GridSampleProvider),
    ReducedState(ReducedStateSampleProvider),
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dataset::Grid(_) => f.write_str("Dataset::Grid(..)"),
            Dataset::ReducedState(_) => f.write_str("Dataset::ReducedState(..)"),
        }
    }
}

impl Dataset {
    pub fn open(config: &DatasetConfig, collaborators: Collaborators) -> Result<Self, NoteGridError> {
        Self::open_with_progress(config, collaborators, None)
    }

    /// Builds the corpus, reporting validation progress (0.0..=1.0).
    pub fn open_with_progress(
        config: &DatasetConfig,
        collaborators: Collaborators,
        progress: Option<&mut dyn ProgressSink>,
    ) -> Result<Self, NoteGridError> {
        let mut noop = NoopProgressSink;
        let sink: &mut dyn ProgressSink = match progress {
            Some(s) => s,
            None => &mut noop,
        };

        match config.strategy().encoding {
            LabelEncoding::Grid => Ok(Dataset::Grid(GridSampleProvider::new(
                config,
                collaborators.extractor,
                sink,
            )?)),
            LabelEncoding::ReducedState => {
                let sequencer = collaborators.sequencer.ok_or_else(|| {
                    NoteGridError::Configuration(
                        "reduced-state datasets need a state sequencer".to_string(),
                    )
                })?;
                let vocabulary = collaborators.vocabulary.ok_or_else(|| {
                    NoteGridError::Configuration(
                        "reduced-state datasets need a state vocabulary".to_string(),
                    )
                })?;
                Ok(Dataset::ReducedState(ReducedStateSampleProvider::new(
                    config, sequencer, vocabulary, sink,
                )?))
            }
        }
    }

    pub fn corpus(&self) -> &CorpusIndex {
        match self {
            Dataset::Grid(provider) => provider.corpus(),
            Dataset::ReducedState(provider) => provider.corpus(),
        }
    }
}

impl SampleProvider for Dataset {
    fn get_sample(&mut self, index: usize) -> Result<Sample, NoteGridError> {
        match self {
            Dataset::Grid(provider) => provider.get_sample(index),
            Dataset::ReducedState(provider) => provider.get_sample(index),
        }
    }

    fn corpus_size(&self) -> usize {
        match self {
            Dataset::Grid(provider) => provider.corpus_size(),
            Dataset::ReducedState(provider) => provider.corpus_size(),
        }
    }
}
