use crate::types::{GRID_CELLS, NUM_CLASSES};
use crate::NoteGridError;
use ndarray::{s, Array, Array2, Array3, ArrayBase, Axis, Data, Dimension, Ix2, Ix3};
use rand::seq::index;
use rand::Rng;

/// Cuts fixed-length training windows out of one song.
///
/// A window starting at `i` feeds frames `i..i + input_length` to the model and asks
/// it for the `output_length` frames right after the receptive field,
/// `i + receptive_field..i + receptive_field + output_length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSampler {
    pub receptive_field: usize,
    pub output_length: usize,
    pub num_windows: usize,
}

impl WindowSampler {
    pub fn new(
        receptive_field: usize,
        output_length: usize,
        num_windows: usize,
    ) -> Result<Self, NoteGridError> {
        if receptive_field == 0 || output_length == 0 {
            return Err(NoteGridError::InvalidInput(format!(
                "receptive field ({}) and output length ({}) must be > 0",
                receptive_field, output_length
            )));
        }
        Ok(Self {
            receptive_field,
            output_length,
            num_windows,
        })
    }

    pub fn input_length(&self) -> usize {
        self.receptive_field + self.output_length - 1
    }

    /// Number of distinct window starts in a song of `num_frames` frames.
    pub fn available_starts(&self, num_frames: usize) -> usize {
        num_frames.saturating_sub(self.receptive_field)
    }

    /// Draws `num_windows` distinct starts from `0..num_frames - receptive_field`.
    pub fn sample_starts<R: Rng + ?Sized>(
        &self,
        num_frames: usize,
        rng: &mut R,
    ) -> Result<Vec<usize>, NoteGridError> {
        let available = self.available_starts(num_frames);
        if available == 0 {
            return Err(NoteGridError::InsufficientLength(format!(
                "{} frames cannot hold a receptive field of {}",
                num_frames, self.receptive_field
            )));
        }
        if self.num_windows > available {
            return Err(NoteGridError::InsufficientLength(format!(
                "{} windows requested but only {} starts available",
                self.num_windows, available
            )));
        }
        Ok(index::sample(rng, available, self.num_windows).into_vec())
    }

    /// `[feature_dim, input_length]` slice at `start`, normalized on its own.
    pub fn input_window<S>(&self, features: &ArrayBase<S, Ix2>, start: usize) -> Array2<f32>
    where
        S: Data<Elem = f32>,
    {
        let mut window = slice_columns(features, start, self.input_length(), 0.0);
        normalize_in_place(&mut window);
        window
    }

    /// `[output_length, 12]` class ids following the receptive field.
    pub fn target_window<S>(&self, classes: &ArrayBase<S, Ix2>, start: usize) -> Array2<i64>
    where
        S: Data<Elem = i64>,
    {
        let rows = slice_columns(&classes.t(), start + self.receptive_field, self.output_length, 0);
        rows.reversed_axes()
    }

    /// `[12, 20, input_length]` many-hot labels aligned with the input window.
    pub fn context_window<S>(
        &self,
        many_hot: &ArrayBase<S, Ix3>,
        start: usize,
    ) -> Array3<f32>
    where
        S: Data<Elem = f32>,
    {
        let len = self.input_length();
        let num_frames = many_hot.len_of(Axis(0));
        let mut out = Array3::<f32>::zeros((GRID_CELLS, NUM_CLASSES, len));
        out.slice_mut(s![.., 0, ..]).fill(1.0);
        let end = (start + len).min(num_frames);
        if start < end {
            let present = many_hot.slice(s![start..end, .., ..]).permuted_axes([1, 2, 0]);
            out.slice_mut(s![.., .., ..end - start]).assign(&present);
        }
        out
    }
}

/// Copies `len` columns starting at `start`; columns past the end read as `fill`.
pub fn slice_columns<S, A>(matrix: &ArrayBase<S, Ix2>, start: usize, len: usize, fill: A) -> Array2<A>
where
    S: Data<Elem = A>,
    A: Clone,
{
    let rows = matrix.nrows();
    let mut out = Array2::from_elem((rows, len), fill);
    let end = (start + len).min(matrix.ncols());
    if start < end {
        out.slice_mut(s![.., ..end - start])
            .assign(&matrix.slice(s![.., start..end]));
    }
    out
}

/// Centers on the mean and scales by the largest centered magnitude.
///
/// An all-constant window becomes all zeros.
pub fn normalize_in_place<D: Dimension>(window: &mut Array<f32, D>) {
    let mean = match window.mean() {
        Some(mean) => mean,
        None => return,
    };
    window.mapv_inplace(|v| v - mean);
    let peak = window.iter().fold(0.0f32, |acc, v| acc.max(v.abs()));
    if peak > 0.0 {
        window.mapv_inplace(|v| v / peak);
    }
}
