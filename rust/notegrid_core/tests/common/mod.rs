#![allow(dead_code)]

use ndarray::{Array1, Array2};
use notegrid_core::{
    read_level, FeatureExtractor, FeatureMatrix, FeatureRequest, NoteGridError, StateSequence,
    StateSequenceRequest, StateSequencer,
};
use serde_json::json;
use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

/// Writes `<dir>/song.ogg` whose content is the number of feature frames the
/// fake extractor will produce for it.
pub fn write_song(dir: &Path, frames: usize) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("song.ogg"), frames.to_string()).unwrap();
}

/// Writes `<dir>/<difficulty>.json`. Notes are `(beat, lane, layer, type, cut)`.
pub fn write_level(dir: &Path, difficulty: &str, bpm: f64, notes: &[(f64, i64, i64, i64, i64)]) {
    fs::create_dir_all(dir).unwrap();
    let notes: Vec<_> = notes
        .iter()
        .map(|&(time, lane, layer, kind, cut)| {
            json!({
                "_time": time,
                "_lineIndex": lane,
                "_lineLayer": layer,
                "_type": kind,
                "_cutDirection": cut
            })
        })
        .collect();
    let level = json!({
        "_version": "2.0.0",
        "_beatsPerMinute": bpm,
        "_events": [],
        "_obstacles": [],
        "_notes": notes
    });
    fs::write(
        dir.join(format!("{}.json", difficulty)),
        serde_json::to_string_pretty(&level).unwrap(),
    )
    .unwrap();
}

pub fn ramp_features(rows: usize, frames: usize) -> FeatureMatrix {
    Array2::from_shape_fn((rows, frames), |(r, c)| ((r * 31 + c * 17) % 11) as f32 + 1.0)
}

/// Reads the frame count from the audio file and returns a ramp of that length.
#[derive(Default)]
pub struct FileLengthExtractor {
    pub requests: Rc<RefCell<Vec<FeatureRequest>>>,
}

impl FeatureExtractor for FileLengthExtractor {
    fn extract(&self, audio: &Path, request: &FeatureRequest) -> Result<FeatureMatrix, NoteGridError> {
        self.requests.borrow_mut().push(*request);
        let frames = fs::read_to_string(audio)
            .map_err(|e| NoteGridError::Io(e.to_string()))?
            .trim()
            .parse::<usize>()
            .map_err(|e| NoteGridError::Io(e.to_string()))?;
        Ok(ramp_features(request.feature_size, frames))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SeenRequest {
    pub duration_seconds: f64,
    pub bpm: f64,
    pub beat_discretization: f64,
    pub top_k: usize,
}

/// One token per note plus an end token, placed on the padded step axis.
pub struct NoteTokenSequencer {
    pub receptive_field: usize,
    pub seen: Rc<RefCell<Vec<SeenRequest>>>,
}

impl NoteTokenSequencer {
    pub fn new(receptive_field: usize) -> Self {
        Self {
            receptive_field,
            seen: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

pub const DELTA_ROWS: usize = 2;

impl StateSequencer for NoteTokenSequencer {
    fn sequence_with_deltas(
        &self,
        request: &StateSequenceRequest<'_>,
    ) -> Result<StateSequence, NoteGridError> {
        self.seen.borrow_mut().push(SeenRequest {
            duration_seconds: request.duration_seconds,
            bpm: request.bpm,
            beat_discretization: request.beat_discretization,
            top_k: request.top_k,
        });
        let level = read_level(request.level_path)?;
        let step_seconds = 60.0 / request.bpm * request.beat_discretization;
        let total_steps = (request.duration_seconds / step_seconds).round() as usize;
        let vocab = request.vocabulary.len();

        let mut beats: Vec<f64> = level.notes.iter().map(|n| n.time_beats).collect();
        beats.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let mut frames: Vec<usize> = beats
            .iter()
            .map(|b| {
                let step = (b / request.beat_discretization).floor() as usize;
                self.receptive_field + step
            })
            .collect();
        let last = total_steps.saturating_sub(1);
        frames.push(last);
        let end_beat = last as f64 * request.beat_discretization;
        beats.push(end_beat);

        let len = frames.len();
        let states = Array1::from_iter((0..len).map(|t| (t % vocab) as i64));
        let mut one_hot = Array2::<i64>::zeros((vocab, len));
        for t in 0..len {
            one_hot[(t % vocab, t)] = 1;
        }
        let delta_forward = Array2::from_shape_fn((DELTA_ROWS, len), |(_, t)| {
            if t + 1 < len {
                (beats[t + 1] - beats[t]) as f32
            } else {
                0.0
            }
        });
        let delta_backward = Array2::from_shape_fn((DELTA_ROWS, len), |(_, t)| {
            if t > 0 {
                (beats[t] - beats[t - 1]) as f32
            } else {
                0.0
            }
        });
        Ok(StateSequence {
            one_hot_states: one_hot,
            states,
            delta_forward,
            delta_backward,
            frame_indices: frames,
        })
    }
}
