use crate::types::{FeatureMatrix, Level};
use crate::NoteGridError;
use ndarray::Array2;
use ndarray_npy::{read_npy, ReadNpyError};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Reads a level file. The handle is dropped before returning.
pub fn read_level(path: &Path) -> Result<Level, NoteGridError> {
    let file = File::open(path)
        .map_err(|e| NoteGridError::Io(format!("{}: {}", path.display(), e)))?;
    let level: Level = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| NoteGridError::DataIntegrity(format!("{}: {}", path.display(), e)))?;
    Ok(level)
}

/// Where offline preprocessing stores the features of `audio`:
/// `<audio path>_<feature name>_<feature size>.npy`.
pub fn precomputed_feature_path(audio: &Path, feature_name: &str, feature_size: usize) -> PathBuf {
    let mut name = audio.as_os_str().to_os_string();
    name.push(format!("_{}_{}.npy", feature_name, feature_size));
    PathBuf::from(name)
}

/// Loads a `[feature_dim, num_frames]` matrix stored as f32 or f64.
pub fn read_feature_matrix(path: &Path) -> Result<FeatureMatrix, NoteGridError> {
    if !path.is_file() {
        return Err(NoteGridError::Configuration(format!(
            "precomputed features missing at {}; run feature preprocessing first",
            path.display()
        )));
    }
    match read_npy::<_, Array2<f32>>(path) {
        Ok(matrix) => Ok(matrix),
        Err(ReadNpyError::WrongDescriptor(_)) => {
            let wide: Array2<f64> = read_npy(path)
                .map_err(|e| NoteGridError::Io(format!("{}: {}", path.display(), e)))?;
            Ok(wide.mapv(|v| v as f32))
        }
        Err(e) => Err(NoteGridError::Io(format!("{}: {}", path.display(), e))),
    }
}
