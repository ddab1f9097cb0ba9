use crate::timebase::{beats_to_frame, check_bpm};
use crate::types::{DecodedNote, NoteEvent, BOMB_CLASS, GRID_LANES, GRID_LAYERS};
use crate::NoteGridError;

const MAX_CUT_DIRECTION: i64 = 8;

/// Class id of a note: 0 stays free for "no event", red/blue notes take
/// `1 + type * 9 + cut_direction`, bombs share one id.
pub fn event_class(note: &NoteEvent) -> Result<usize, NoteGridError> {
    match note.kind {
        3 => Ok(BOMB_CLASS),
        0 | 1 => {
            if !(0..=MAX_CUT_DIRECTION).contains(&note.cut_direction) {
                return Err(NoteGridError::DataIntegrity(format!(
                    "cut direction {} at beat {} outside 0..={}",
                    note.cut_direction, note.time_beats, MAX_CUT_DIRECTION
                )));
            }
            Ok((1 + note.kind * 9 + note.cut_direction) as usize)
        }
        other => Err(NoteGridError::DataIntegrity(format!(
            "unrecognized note type {} at beat {}",
            other, note.time_beats
        ))),
    }
}

pub fn grid_cell(note: &NoteEvent) -> Result<usize, NoteGridError> {
    let lanes = GRID_LANES as i64;
    let layers = GRID_LAYERS as i64;
    if !(0..lanes).contains(&note.line_index) || !(0..layers).contains(&note.line_layer) {
        return Err(NoteGridError::DataIntegrity(format!(
            "note at beat {} sits off the grid (lane {}, layer {})",
            note.time_beats, note.line_index, note.line_layer
        )));
    }
    Ok((note.line_layer * lanes + note.line_index) as usize)
}

/// Places notes on the frame axis of a feature matrix with `num_frames` frames.
///
/// Output order follows input order. Notes landing outside the frame span are
/// skipped with a warning.
pub fn decode_notes(
    notes: &[NoteEvent],
    bpm: f64,
    sampling_rate: f64,
    hop_samples: usize,
    num_frames: usize,
) -> Result<Vec<DecodedNote>, NoteGridError> {
    check_bpm(bpm)?;
    let mut decoded = Vec::with_capacity(notes.len());
    for note in notes {
        let frame = beats_to_frame(note.time_beats, bpm, sampling_rate, hop_samples)?;
        if frame < 0 || frame as usize >= num_frames {
            log::warn!(
                "note at beat {} maps to frame {} outside {} frames; skipping",
                note.time_beats,
                frame,
                num_frames
            );
            continue;
        }
        let class = event_class(note)?;
        let cell = grid_cell(note)?;
        decoded.push(DecodedNote {
            frame: frame as usize,
            cell,
            class,
        });
    }
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(time_beats: f64, line_index: i64, line_layer: i64, kind: i64, cut: i64) -> NoteEvent {
        NoteEvent {
            time_beats,
            line_index,
            line_layer,
            kind,
            cut_direction: cut,
        }
    }

    #[test]
    fn class_mapping() {
        assert_eq!(event_class(&note(0.0, 0, 0, 0, 3)).unwrap(), 4);
        assert_eq!(event_class(&note(0.0, 0, 0, 1, 0)).unwrap(), 10);
        assert_eq!(event_class(&note(0.0, 0, 0, 1, 8)).unwrap(), 18);
        for cut in [0, 4, 8, 42] {
            assert_eq!(event_class(&note(0.0, 0, 0, 3, cut)).unwrap(), 19);
        }
    }

    #[test]
    fn class_mapping_has_no_collisions() {
        let mut seen = std::collections::HashSet::new();
        for kind in [0, 1] {
            for cut in 0..=8 {
                let class = event_class(&note(0.0, 0, 0, kind, cut)).unwrap();
                assert!((1..19).contains(&class));
                assert!(seen.insert(class));
            }
        }
    }

    #[test]
    fn unknown_type_is_fatal() {
        let err = event_class(&note(1.0, 0, 0, 2, 0)).unwrap_err();
        assert!(matches!(err, NoteGridError::DataIntegrity(_)));
        let err = decode_notes(&[note(0.0, 0, 0, 7, 0)], 120.0, 16_000.0, 2000, 10).unwrap_err();
        assert!(matches!(err, NoteGridError::DataIntegrity(_)));
    }

    #[test]
    fn cells_are_layer_major() {
        assert_eq!(grid_cell(&note(0.0, 1, 0, 0, 0)).unwrap(), 1);
        assert_eq!(grid_cell(&note(0.0, 3, 2, 0, 0)).unwrap(), 11);
        assert!(grid_cell(&note(0.0, 4, 0, 0, 0)).is_err());
        assert!(grid_cell(&note(0.0, 0, 3, 0, 0)).is_err());
    }

    #[test]
    fn out_of_range_notes_are_skipped() {
        // hop 2000 at 120 bpm: one beat = 8000 samples -> frame floor(8000 / 2001) = 3
        let notes = [
            note(1.0, 0, 0, 0, 1),
            note(100.0, 0, 0, 0, 1),
            note(-1.0, 0, 0, 0, 1),
            note(0.5, 2, 1, 1, 2),
        ];
        let decoded = decode_notes(&notes, 120.0, 16_000.0, 2000, 8).unwrap();
        assert_eq!(
            decoded,
            vec![
                DecodedNote {
                    frame: 3,
                    cell: 0,
                    class: 2
                },
                DecodedNote {
                    frame: 1,
                    cell: 6,
                    class: 12
                },
            ]
        );
    }

    #[test]
    fn empty_level_decodes_to_nothing() {
        assert!(decode_notes(&[], 120.0, 16_000.0, 2000, 0).unwrap().is_empty());
        assert!(decode_notes(&[], 0.0, 16_000.0, 2000, 0).is_err());
    }
}
