use crate::types::FeatureMatrix;
use crate::NoteGridError;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Parameters handed to a feature extractor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureRequest {
    pub sampling_rate: f64,
    pub hop_samples: usize,
    pub window_samples: usize,
    /// Rows expected in the returned matrix.
    pub feature_size: usize,
}

impl FeatureRequest {
    /// Window of four hops, as used for bpm-locked features.
    pub fn with_hop(sampling_rate: f64, hop_samples: usize, feature_size: usize) -> Self {
        Self {
            sampling_rate,
            hop_samples,
            window_samples: 4 * hop_samples,
            feature_size,
        }
    }
}

/// Audio decoding plus spectral features, `[feature_dim, num_frames]`.
pub trait FeatureExtractor {
    fn extract(&self, audio: &Path, request: &FeatureRequest) -> Result<FeatureMatrix, NoteGridError>;

    /// Frames `extract` would produce, for implementations that can read the audio
    /// length without extracting. `None` makes the caller extract once and keep the result.
    fn frame_count(
        &self,
        _audio: &Path,
        _request: &FeatureRequest,
    ) -> Result<Option<usize>, NoteGridError> {
        Ok(None)
    }
}

/// Per-song features, keyed by song index. The first value stored for an index wins.
#[derive(Debug, Default)]
pub struct FeatureCache {
    entries: HashMap<usize, Arc<FeatureMatrix>>,
}

impl FeatureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.entries.contains_key(&index)
    }

    pub fn insert(&mut self, index: usize, features: Arc<FeatureMatrix>) -> Arc<FeatureMatrix> {
        Arc::clone(self.entries.entry(index).or_insert(features))
    }

    pub fn get_or_try_insert_with<F>(
        &mut self,
        index: usize,
        load: F,
    ) -> Result<Arc<FeatureMatrix>, NoteGridError>
    where
        F: FnOnce() -> Result<FeatureMatrix, NoteGridError>,
    {
        if let Some(features) = self.entries.get(&index) {
            return Ok(Arc::clone(features));
        }
        let features = Arc::new(load()?);
        log::debug!(
            "cached features for song {} ({} x {})",
            index,
            features.nrows(),
            features.ncols()
        );
        Ok(self.insert(index, features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use std::cell::Cell;

    #[test]
    fn loads_once_per_index() {
        let mut cache = FeatureCache::new();
        let calls = Cell::new(0);
        let load = || {
            calls.set(calls.get() + 1);
            Ok(Array2::<f32>::zeros((3, 5)))
        };
        let first = cache.get_or_try_insert_with(2, load).unwrap();
        let second = cache
            .get_or_try_insert_with(2, || Ok(Array2::<f32>::ones((1, 1))))
            .unwrap();
        assert_eq!(calls.get(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.shape(), &[3, 5]);
    }

    #[test]
    fn failed_loads_leave_no_entry() {
        let mut cache = FeatureCache::new();
        let err = cache
            .get_or_try_insert_with(0, || Err(NoteGridError::Io("unreadable".to_string())))
            .unwrap_err();
        assert!(matches!(err, NoteGridError::Io(_)));
        assert!(!cache.contains(0));
        assert!(cache.is_empty());
    }

    #[test]
    fn first_insert_wins() {
        let mut cache = FeatureCache::new();
        cache.insert(1, Arc::new(Array2::<f32>::zeros((2, 2))));
        let kept = cache.insert(1, Arc::new(Array2::<f32>::zeros((4, 4))));
        assert_eq!(kept.shape(), &[2, 2]);
        assert_eq!(cache.len(), 1);
    }

    struct Fixed;

    impl FeatureExtractor for Fixed {
        fn extract(
            &self,
            _audio: &Path,
            request: &FeatureRequest,
        ) -> Result<FeatureMatrix, NoteGridError> {
            Ok(Array2::zeros((request.feature_size, 40)))
        }
    }

    #[test]
    fn frame_count_is_unknown_by_default() {
        let request = FeatureRequest::with_hop(16_000.0, 500, 20);
        assert_eq!(request.window_samples, 2000);
        assert_eq!(Fixed.frame_count(Path::new("a.ogg"), &request).unwrap(), None);
        assert_eq!(Fixed.extract(Path::new("a.ogg"), &request).unwrap().ncols(), 40);
    }
}
