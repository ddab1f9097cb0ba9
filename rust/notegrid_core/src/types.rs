use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

/// Feature matrix laid out as `[feature_dim, num_frames]`.
pub type FeatureMatrix = Array2<f32>;

/// Cells on the 4 lanes x 3 layers note grid.
pub const GRID_CELLS: usize = 12;
/// Lanes per grid layer.
pub const GRID_LANES: usize = 4;
/// Grid layers.
pub const GRID_LAYERS: usize = 3;
/// Event classes including the empty class 0.
pub const NUM_CLASSES: usize = 20;
/// Class id shared by every bomb.
pub const BOMB_CLASS: usize = 19;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Level {
    #[serde(rename = "_beatsPerMinute")]
    pub beats_per_minute: f64,
    #[serde(rename = "_notes", default)]
    pub notes: Vec<NoteEvent>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NoteEvent {
    #[serde(rename = "_time")]
    pub time_beats: f64,
    #[serde(rename = "_lineIndex")]
    pub line_index: i64,
    #[serde(rename = "_lineLayer")]
    pub line_layer: i64,
    #[serde(rename = "_type")]
    pub kind: i64,
    #[serde(rename = "_cutDirection")]
    pub cut_direction: i64,
}

/// A note placed on the common frame axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedNote {
    pub frame: usize,
    pub cell: usize,
    pub class: usize,
}

/// One training sample.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Grid: `[windows, channels, input_length]`. Reduced state: `[1, channels, tokens]`.
    pub input: Array3<f32>,
    /// Grid: `[windows, output_length, 12]`. Reduced state: `[1, rows, tokens]`.
    pub target: Array3<i64>,
    /// Window starts used for this sample; empty for the reduced-state variant.
    pub window_starts: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStage {
    Discover = 0,
    Validate = 1,
}

#[derive(Debug, Clone, Copy)]
pub struct ProgressEvent {
    pub stage: ProgressStage,
    pub progress: f32,
}

pub trait ProgressSink {
    fn on_progress(&mut self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: FnMut(ProgressEvent),
{
    fn on_progress(&mut self, event: ProgressEvent) {
        self(event);
    }
}

pub(crate) struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {
    fn on_progress(&mut self, _event: ProgressEvent) {}
}
