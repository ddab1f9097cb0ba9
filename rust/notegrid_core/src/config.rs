use crate::timebase::StepPolicy;
use crate::types::{GRID_CELLS, NUM_CLASSES};
use crate::NoteGridError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AudioConfig {
    pub sampling_rate: f64,
    /// Hop used by offline feature preprocessing, in samples.
    pub hop_length: usize,
    pub padded_length: usize,
    pub chunk_length: usize,
    /// Audio file extension scanned for, without the dot.
    pub extension: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sampling_rate: 16_000.0,
            hop_length: 256,
            padded_length: 3_000_000,
            chunk_length: 9_000,
            extension: "ogg".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LevelConfig {
    /// Comma-separated difficulty names, e.g. `"Expert,ExpertPlus"`.
    pub level_diff: String,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            level_diff: "Expert".to_string(),
        }
    }
}

impl LevelConfig {
    pub fn difficulties(&self) -> Vec<String> {
        self.level_diff
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureConfig {
    pub feature_name: String,
    pub feature_size: usize,
    /// Load every precomputed feature matrix while building the corpus.
    pub load_features: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            feature_name: "chroma".to_string(),
            feature_size: 24,
            load_features: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimingConfig {
    pub using_bpm_time_division: bool,
    pub beat_subdivision: u32,
    /// Step length in seconds when not bpm-locked.
    pub step_size: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            using_bpm_time_division: true,
            beat_subdivision: 16,
            step_size: 0.01,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowConfig {
    pub receptive_field: usize,
    pub output_length: usize,
    pub num_windows: usize,
    pub time_shifts: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            receptive_field: 1,
            output_length: 1,
            num_windows: 1,
            time_shifts: 1,
        }
    }
}

impl WindowConfig {
    pub fn input_length(&self) -> usize {
        self.receptive_field + self.output_length.max(1) - 1
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LabelConfig {
    pub reduced_state: bool,
    /// Return states and deltas as decoder input inside the target.
    pub tgt_vector_input: bool,
    pub max_token_seq_len: usize,
    pub top_k: usize,
    pub concat_outputs: bool,
    pub extra_output: bool,
    pub binarized: bool,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            reduced_state: false,
            tgt_vector_input: false,
            max_token_seq_len: 1000,
            top_k: 2000,
            concat_outputs: false,
            extra_output: false,
            binarized: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SamplingConfig {
    /// Seed for window sampling; entropy when absent.
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetConfig {
    pub data_dir: PathBuf,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub levels: LevelConfig,
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub windowing: WindowConfig,
    #[serde(default)]
    pub labels: LabelConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelEncoding {
    Grid,
    ReducedState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureSource {
    /// Extract from audio on first access.
    OnDemand,
    /// Read `.npy` features on first access.
    PrecomputedLazy,
    /// Read every `.npy` matrix while building the corpus.
    PrecomputedEager,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateRole {
    Target,
    DecoderInput,
}

/// Boolean switches resolved once into the variant each concern runs with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatasetStrategy {
    pub encoding: LabelEncoding,
    pub features: FeatureSource,
    pub step: StepPolicy,
    pub state_role: StateRole,
}

/// Flags and sizes only the model side consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelHints {
    pub input_channels: usize,
    pub output_channels: usize,
    pub num_classes: usize,
    pub concat_outputs: bool,
    pub extra_output: bool,
    pub binarized: bool,
    pub padded_length: usize,
    pub chunk_length: usize,
    pub hop_length: usize,
}

impl DatasetConfig {
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn strategy(&self) -> DatasetStrategy {
        let encoding = if self.labels.reduced_state {
            LabelEncoding::ReducedState
        } else {
            LabelEncoding::Grid
        };
        let features = match (encoding, self.features.load_features) {
            (_, true) => FeatureSource::PrecomputedEager,
            (LabelEncoding::ReducedState, false) => FeatureSource::PrecomputedLazy,
            (LabelEncoding::Grid, false) => FeatureSource::OnDemand,
        };
        let step = if self.timing.using_bpm_time_division {
            StepPolicy::BpmLocked {
                beat_subdivision: self.timing.beat_subdivision,
            }
        } else {
            StepPolicy::Fixed {
                step_seconds: self.timing.step_size,
            }
        };
        let state_role = if self.labels.tgt_vector_input {
            StateRole::DecoderInput
        } else {
            StateRole::Target
        };
        DatasetStrategy {
            encoding,
            features,
            step,
            state_role,
        }
    }

    pub fn model_hints(&self) -> ModelHints {
        ModelHints {
            input_channels: self.features.feature_size + GRID_CELLS * NUM_CLASSES,
            output_channels: GRID_CELLS,
            num_classes: NUM_CLASSES,
            concat_outputs: self.labels.concat_outputs,
            extra_output: self.labels.extra_output,
            binarized: self.labels.binarized,
            padded_length: self.audio.padded_length,
            chunk_length: self.audio.chunk_length,
            hop_length: self.audio.hop_length,
        }
    }
}

pub fn load_config(path: impl AsRef<Path>) -> Result<DatasetConfig, NoteGridError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| NoteGridError::Configuration(format!("{}: {}", path.display(), e)))?;
    let config: DatasetConfig = serde_json::from_str(&text)
        .map_err(|e| NoteGridError::Configuration(format!("{}: {}", path.display(), e)))?;
    if let Err(issue) = validate_dataset_config(&config) {
        return Err(NoteGridError::Configuration(issue.to_string()));
    }
    log::info!("loaded dataset config from {}", path.display());
    Ok(config)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValidationIssue {
    pub path: String,
    pub message: String,
}

impl ConfigValidationIssue {
    fn new(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

pub fn validate_dataset_config(config: &DatasetConfig) -> Result<(), ConfigValidationIssue> {
    if config.data_dir.as_os_str().is_empty() {
        return Err(ConfigValidationIssue::new("data_dir", "must not be empty"));
    }

    let audio = &config.audio;
    if !audio.sampling_rate.is_finite() || audio.sampling_rate <= 0.0 {
        return Err(ConfigValidationIssue::new(
            "audio.sampling_rate",
            "must be > 0",
        ));
    }
    if audio.hop_length == 0 {
        return Err(ConfigValidationIssue::new("audio.hop_length", "must be > 0"));
    }
    if audio.extension.trim().is_empty() || audio.extension.starts_with('.') {
        return Err(ConfigValidationIssue::new(
            "audio.extension",
            "must be a bare extension such as \"ogg\"",
        ));
    }

    if config.levels.difficulties().is_empty() {
        return Err(ConfigValidationIssue::new(
            "levels.level_diff",
            "must name at least one difficulty",
        ));
    }

    let features = &config.features;
    if features.feature_name.trim().is_empty() {
        return Err(ConfigValidationIssue::new(
            "features.feature_name",
            "must not be empty",
        ));
    }
    if features.feature_size == 0 {
        return Err(ConfigValidationIssue::new(
            "features.feature_size",
            "must be > 0",
        ));
    }

    let timing = &config.timing;
    if timing.using_bpm_time_division && timing.beat_subdivision == 0 {
        return Err(ConfigValidationIssue::new(
            "timing.beat_subdivision",
            "must be > 0",
        ));
    }
    if !timing.using_bpm_time_division && (!timing.step_size.is_finite() || timing.step_size <= 0.0)
    {
        return Err(ConfigValidationIssue::new("timing.step_size", "must be > 0"));
    }

    let windowing = &config.windowing;
    if windowing.receptive_field == 0 {
        return Err(ConfigValidationIssue::new(
            "windowing.receptive_field",
            "must be > 0",
        ));
    }
    if windowing.output_length == 0 {
        return Err(ConfigValidationIssue::new(
            "windowing.output_length",
            "must be > 0",
        ));
    }
    if windowing.num_windows == 0 {
        return Err(ConfigValidationIssue::new(
            "windowing.num_windows",
            "must be > 0",
        ));
    }
    if windowing.time_shifts == 0 {
        return Err(ConfigValidationIssue::new(
            "windowing.time_shifts",
            "must be > 0",
        ));
    }

    let labels = &config.labels;
    if labels.max_token_seq_len == 0 {
        return Err(ConfigValidationIssue::new(
            "labels.max_token_seq_len",
            "must be > 0",
        ));
    }
    if labels.top_k == 0 {
        return Err(ConfigValidationIssue::new("labels.top_k", "must be > 0"));
    }
    if labels.tgt_vector_input && !labels.reduced_state {
        return Err(ConfigValidationIssue::new(
            "labels.tgt_vector_input",
            "requires labels.reduced_state",
        ));
    }

    Ok(())
}
