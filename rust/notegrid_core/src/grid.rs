use crate::types::{DecodedNote, GRID_CELLS, NUM_CLASSES};
use crate::NoteGridError;
use ndarray::{s, Array2, Array3};

/// Dense per-frame labels of one level.
#[derive(Debug, Clone)]
pub struct GridLabels {
    /// `[num_frames, 12]`, class id per cell, 0 where empty.
    pub classes: Array2<i64>,
    /// `[num_frames, 12, 20]`, one indicator per cell.
    pub many_hot: Array3<f32>,
}

impl GridLabels {
    pub fn num_frames(&self) -> usize {
        self.classes.nrows()
    }
}

/// Writes decoded notes into both grid encodings in input order, so the last note
/// at a given frame and cell wins in the class grid.
pub fn encode_grid(num_frames: usize, notes: &[DecodedNote]) -> Result<GridLabels, NoteGridError> {
    let mut classes = Array2::<i64>::zeros((num_frames, GRID_CELLS));
    let mut many_hot = Array3::<f32>::zeros((num_frames, GRID_CELLS, NUM_CLASSES));
    many_hot.slice_mut(s![.., .., 0]).fill(1.0);

    for note in notes {
        if note.frame >= num_frames || note.cell >= GRID_CELLS || note.class >= NUM_CLASSES {
            return Err(NoteGridError::InvalidInput(format!(
                "note {:?} does not fit a {} frame grid",
                note, num_frames
            )));
        }
        classes[(note.frame, note.cell)] = note.class as i64;
        many_hot[(note.frame, note.cell, 0)] = 0.0;
        many_hot[(note.frame, note.cell, note.class)] = 1.0;
    }

    Ok(GridLabels { classes, many_hot })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoded(frame: usize, cell: usize, class: usize) -> DecodedNote {
        DecodedNote { frame, cell, class }
    }

    #[test]
    fn empty_cells_hold_only_the_nothing_class() {
        let labels = encode_grid(6, &[decoded(2, 5, 7)]).unwrap();
        for frame in 0..6 {
            for cell in 0..GRID_CELLS {
                if (frame, cell) == (2, 5) {
                    continue;
                }
                assert_eq!(labels.classes[(frame, cell)], 0);
                assert_eq!(labels.many_hot[(frame, cell, 0)], 1.0);
                let total: f32 = labels.many_hot.slice(s![frame, cell, ..]).sum();
                assert_eq!(total, 1.0);
            }
        }
        assert_eq!(labels.classes[(2, 5)], 7);
        assert_eq!(labels.many_hot[(2, 5, 0)], 0.0);
        assert_eq!(labels.many_hot[(2, 5, 7)], 1.0);
    }

    #[test]
    fn collisions_apply_every_note_in_order() {
        let labels = encode_grid(3, &[decoded(1, 0, 4), decoded(1, 0, 19)]).unwrap();
        assert_eq!(labels.classes[(1, 0)], 19);
        assert_eq!(labels.many_hot[(1, 0, 0)], 0.0);
        // both indicators survive; the class grid keeps the last write
        assert_eq!(labels.many_hot[(1, 0, 4)], 1.0);
        assert_eq!(labels.many_hot[(1, 0, 19)], 1.0);
    }

    #[test]
    fn unsorted_input_is_accepted() {
        let labels = encode_grid(4, &[decoded(3, 1, 2), decoded(0, 1, 3)]).unwrap();
        assert_eq!(labels.classes[(3, 1)], 2);
        assert_eq!(labels.classes[(0, 1)], 3);
        assert_eq!(labels.num_frames(), 4);
    }

    #[test]
    fn zero_frames_is_fine() {
        let labels = encode_grid(0, &[]).unwrap();
        assert_eq!(labels.many_hot.shape(), &[0, GRID_CELLS, NUM_CLASSES]);
        assert!(encode_grid(0, &[decoded(0, 0, 1)]).is_err());
    }
}
