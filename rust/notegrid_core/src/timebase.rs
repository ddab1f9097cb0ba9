use crate::NoteGridError;

/// How long one step of the common time axis lasts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepPolicy {
    /// One step per `1 / beat_subdivision` of a beat.
    BpmLocked { beat_subdivision: u32 },
    /// Steps of a fixed wall-clock duration.
    Fixed { step_seconds: f64 },
}

impl StepPolicy {
    /// Step duration in seconds for a song at `bpm`.
    pub fn step_seconds(&self, bpm: f64) -> Result<f64, NoteGridError> {
        check_bpm(bpm)?;
        match *self {
            StepPolicy::BpmLocked { beat_subdivision } => {
                Ok(60.0 / (bpm * beat_subdivision as f64))
            }
            StepPolicy::Fixed { step_seconds } => Ok(step_seconds),
        }
    }

    /// Beat subdivision implied by the policy; fractional for fixed steps.
    pub fn beat_subdivision(&self, bpm: f64) -> Result<f64, NoteGridError> {
        check_bpm(bpm)?;
        match *self {
            StepPolicy::BpmLocked { beat_subdivision } => Ok(beat_subdivision as f64),
            StepPolicy::Fixed { step_seconds } => Ok(1.0 / (step_seconds * bpm / 60.0)),
        }
    }

    /// Feature hop in audio samples.
    ///
    /// The bpm-locked hop truncates twice: first the beat length to whole samples, then
    /// the integer division by the subdivision.
    pub fn hop_samples(&self, bpm: f64, sampling_rate: f64) -> Result<usize, NoteGridError> {
        check_bpm(bpm)?;
        let hop = match *self {
            StepPolicy::BpmLocked { beat_subdivision } => {
                let beat_samples = (60.0 * sampling_rate / bpm).floor() as usize;
                beat_samples / beat_subdivision.max(1) as usize
            }
            StepPolicy::Fixed { step_seconds } => (step_seconds * sampling_rate).floor() as usize,
        };
        if hop == 0 {
            return Err(NoteGridError::InvalidInput(format!(
                "hop of 0 samples at {} bpm and {} Hz",
                bpm, sampling_rate
            )));
        }
        Ok(hop)
    }
}

pub fn check_bpm(bpm: f64) -> Result<(), NoteGridError> {
    if !bpm.is_finite() || bpm <= 0.0 {
        return Err(NoteGridError::InvalidInput(format!(
            "bpm must be > 0; got {}",
            bpm
        )));
    }
    Ok(())
}

pub fn beats_to_seconds(time_beats: f64, bpm: f64) -> Result<f64, NoteGridError> {
    check_bpm(bpm)?;
    Ok(time_beats * 60.0 / bpm)
}

/// Frame index of a point in time, `floor(seconds * sr / (hop + 1))`.
///
/// Negative results mean the point lies before the first frame.
pub fn seconds_to_frame(seconds: f64, sampling_rate: f64, hop_samples: usize) -> i64 {
    (seconds * sampling_rate / (hop_samples as f64 + 1.0)).floor() as i64
}

pub fn beats_to_frame(
    time_beats: f64,
    bpm: f64,
    sampling_rate: f64,
    hop_samples: usize,
) -> Result<i64, NoteGridError> {
    let seconds = beats_to_seconds(time_beats, bpm)?;
    Ok(seconds_to_frame(seconds, sampling_rate, hop_samples))
}
