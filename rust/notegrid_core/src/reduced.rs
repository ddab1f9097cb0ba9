//! Reduced-state labels: a sequence of grid states sampled at the beats where
//! something happens, with forward/backward time deltas between them.
//!
//! The state algorithm itself lives outside this crate behind [`StateSequencer`].

use crate::NoteGridError;
use ndarray::{s, Array1, Array2};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

/// A grid state as stored in the vocabulary file: the ordered cell contents.
pub type GridState = Vec<i64>;

/// Known grid states, most frequent first. Loaded once and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct StateVocabulary {
    states: Vec<GridState>,
    ids: HashMap<GridState, usize>,
}

#[derive(Deserialize)]
struct VocabularyFile {
    states: Vec<GridState>,
}

impl StateVocabulary {
    pub fn new(states: Vec<GridState>) -> Self {
        let ids = states
            .iter()
            .enumerate()
            .map(|(id, state)| (state.clone(), id))
            .collect();
        Self { states, ids }
    }

    /// Loads `{"states": [[...], ...]}`.
    pub fn load(path: &Path) -> Result<Arc<Self>, NoteGridError> {
        let file = File::open(path).map_err(|e| {
            NoteGridError::Configuration(format!("vocabulary {}: {}", path.display(), e))
        })?;
        let parsed: VocabularyFile = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            NoteGridError::Configuration(format!("vocabulary {}: {}", path.display(), e))
        })?;
        if parsed.states.is_empty() {
            return Err(NoteGridError::Configuration(format!(
                "vocabulary {} is empty",
                path.display()
            )));
        }
        log::info!(
            "loaded {} grid states from {}",
            parsed.states.len(),
            path.display()
        );
        Ok(Arc::new(Self::new(parsed.states)))
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn id_of(&self, state: &[i64]) -> Option<usize> {
        self.ids.get(state).copied()
    }

    pub fn state(&self, id: usize) -> Option<&GridState> {
        self.states.get(id)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StateSequenceRequest<'a> {
    pub level_path: &'a Path,
    pub duration_seconds: f64,
    pub bpm: f64,
    pub top_k: usize,
    /// Beat fraction of one step, `1 / beat_subdivision`.
    pub beat_discretization: f64,
    pub vocabulary: &'a StateVocabulary,
    pub one_hot: bool,
}

/// Output of the state algorithm. Columns are time steps.
#[derive(Debug, Clone)]
pub struct StateSequence {
    /// `[vocabulary rows, T]`
    pub one_hot_states: Array2<i64>,
    /// `[T]`
    pub states: Array1<i64>,
    /// `[delta rows, T]`
    pub delta_forward: Array2<f32>,
    /// `[delta rows, T]`
    pub delta_backward: Array2<f32>,
    /// `[T]`, positions on the padded feature axis.
    pub frame_indices: Vec<usize>,
}

impl StateSequence {
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    fn truncated(&self, len: usize) -> Self {
        Self {
            one_hot_states: self.one_hot_states.slice(s![.., ..len]).to_owned(),
            states: self.states.slice(s![..len]).to_owned(),
            delta_forward: self.delta_forward.slice(s![.., ..len]).to_owned(),
            delta_backward: self.delta_backward.slice(s![.., ..len]).to_owned(),
            frame_indices: self.frame_indices[..len].to_vec(),
        }
    }
}

pub trait StateSequencer {
    fn sequence_with_deltas(
        &self,
        request: &StateSequenceRequest<'_>,
    ) -> Result<StateSequence, NoteGridError>;
}

/// Runs the state algorithm and cuts every output at the same token count.
pub struct ReducedStateEncoder {
    sequencer: Box<dyn StateSequencer>,
    vocabulary: Arc<StateVocabulary>,
    top_k: usize,
    max_tokens: usize,
}

impl ReducedStateEncoder {
    pub fn new(
        sequencer: Box<dyn StateSequencer>,
        vocabulary: Arc<StateVocabulary>,
        top_k: usize,
        max_tokens: usize,
    ) -> Self {
        Self {
            sequencer,
            vocabulary,
            top_k,
            max_tokens,
        }
    }

    pub fn vocabulary(&self) -> &StateVocabulary {
        &self.vocabulary
    }

    pub fn encode(
        &self,
        level_path: &Path,
        duration_seconds: f64,
        bpm: f64,
        beat_subdivision: f64,
    ) -> Result<StateSequence, NoteGridError> {
        let request = StateSequenceRequest {
            level_path,
            duration_seconds,
            bpm,
            top_k: self.top_k,
            beat_discretization: 1.0 / beat_subdivision,
            vocabulary: &self.vocabulary,
            one_hot: true,
        };
        let sequence = self.sequencer.sequence_with_deltas(&request)?;
        let len = sequence.len().min(self.max_tokens);
        check_lengths(&sequence, len)?;
        Ok(sequence.truncated(len))
    }
}

fn check_lengths(sequence: &StateSequence, len: usize) -> Result<(), NoteGridError> {
    let lengths = [
        ("one_hot_states", sequence.one_hot_states.ncols()),
        ("delta_forward", sequence.delta_forward.ncols()),
        ("delta_backward", sequence.delta_backward.ncols()),
        ("frame_indices", sequence.frame_indices.len()),
    ];
    for (name, actual) in lengths {
        if actual < len {
            return Err(NoteGridError::Collaborator(format!(
                "{} has {} steps; expected at least {}",
                name, actual, len
            )));
        }
    }
    if sequence.delta_forward.nrows() != sequence.delta_backward.nrows() {
        return Err(NoteGridError::Collaborator(format!(
            "delta rows differ: forward {} vs backward {}",
            sequence.delta_forward.nrows(),
            sequence.delta_backward.nrows()
        )));
    }
    Ok(())
}
