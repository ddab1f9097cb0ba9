use crate::config::{validate_dataset_config, DatasetConfig, FeatureSource};
use crate::features::{FeatureCache, FeatureExtractor, FeatureRequest};
use crate::io::{precomputed_feature_path, read_feature_matrix};
use crate::types::{FeatureMatrix, Sample};
use crate::NoteGridError;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Produces training samples by song index.
///
/// Implementations cache features internally and are not meant to be shared
/// between threads; give each worker its own provider.
pub trait SampleProvider {
    fn get_sample(&mut self, index: usize) -> Result<Sample, NoteGridError>;
    fn corpus_size(&self) -> usize;
}

pub(crate) fn checked_config(config: &DatasetConfig) -> Result<(), NoteGridError> {
    validate_dataset_config(config)
        .map_err(|issue| NoteGridError::Configuration(format!("config {}", issue)))
}

pub(crate) fn sampling_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Result of [`FeatureStore::probe`].
#[derive(Debug)]
pub(crate) struct ProbedFeatures {
    pub(crate) frames: usize,
    features: Option<Arc<FeatureMatrix>>,
}

/// Where a provider's features come from, plus the cache in front of it.
pub(crate) struct FeatureStore {
    source: FeatureSource,
    extractor: Option<Box<dyn FeatureExtractor>>,
    feature_name: String,
    feature_size: usize,
    cache: FeatureCache,
    preloaded: HashMap<PathBuf, Arc<FeatureMatrix>>,
}

impl FeatureStore {
    pub(crate) fn new(
        config: &DatasetConfig,
        source: FeatureSource,
        extractor: Option<Box<dyn FeatureExtractor>>,
    ) -> Result<Self, NoteGridError> {
        if source == FeatureSource::OnDemand && extractor.is_none() {
            return Err(NoteGridError::Configuration(
                "on-demand features need a feature extractor".to_string(),
            ));
        }
        Ok(Self {
            source,
            extractor,
            feature_name: config.features.feature_name.clone(),
            feature_size: config.features.feature_size,
            cache: FeatureCache::new(),
            preloaded: HashMap::new(),
        })
    }

    /// Frame count of a corpus candidate, plus the features themselves when
    /// reading the count meant loading them.
    ///
    /// Nothing is cached until the candidate is accepted and passed to [`Self::commit`].
    pub(crate) fn probe(
        &self,
        audio: &Path,
        request: &FeatureRequest,
    ) -> Result<ProbedFeatures, NoteGridError> {
        match self.source {
            FeatureSource::OnDemand => {
                let extractor = self.extractor.as_deref().ok_or_else(missing_extractor)?;
                if let Some(frames) = extractor.frame_count(audio, request)? {
                    return Ok(ProbedFeatures {
                        frames,
                        features: None,
                    });
                }
                let features = Arc::new(extractor.extract(audio, request)?);
                Ok(ProbedFeatures {
                    frames: features.ncols(),
                    features: Some(features),
                })
            }
            FeatureSource::PrecomputedLazy => Ok(ProbedFeatures {
                frames: self.read_precomputed(audio)?.ncols(),
                features: None,
            }),
            FeatureSource::PrecomputedEager => {
                let features = match self.preloaded.get(audio) {
                    Some(features) => Arc::clone(features),
                    None => Arc::new(self.read_precomputed(audio)?),
                };
                Ok(ProbedFeatures {
                    frames: features.ncols(),
                    features: Some(features),
                })
            }
        }
    }

    /// Keeps the probed features of an accepted candidate as song `index`.
    pub(crate) fn commit(&mut self, index: usize, audio: &Path, probed: ProbedFeatures) {
        let features = match probed.features {
            Some(features) => features,
            None => return,
        };
        if self.source == FeatureSource::PrecomputedEager {
            self.preloaded
                .entry(audio.to_path_buf())
                .or_insert_with(|| Arc::clone(&features));
        }
        self.cache.insert(index, features);
    }

    /// Features of song `index`, loaded on first access.
    pub(crate) fn features(
        &mut self,
        index: usize,
        audio: &Path,
        request: &FeatureRequest,
    ) -> Result<Arc<FeatureMatrix>, NoteGridError> {
        let source = self.source;
        let extractor = self.extractor.as_deref();
        let feature_name = &self.feature_name;
        let feature_size = self.feature_size;
        self.cache.get_or_try_insert_with(index, || match source {
            FeatureSource::OnDemand => match extractor {
                Some(extractor) => extractor.extract(audio, request),
                None => Err(missing_extractor()),
            },
            FeatureSource::PrecomputedLazy | FeatureSource::PrecomputedEager => {
                read_feature_matrix(&precomputed_feature_path(audio, feature_name, feature_size))
            }
        })
    }

    pub(crate) fn cached_songs(&self) -> usize {
        self.cache.len()
    }

    fn read_precomputed(&self, audio: &Path) -> Result<FeatureMatrix, NoteGridError> {
        read_feature_matrix(&precomputed_feature_path(
            audio,
            &self.feature_name,
            self.feature_size,
        ))
    }
}

fn missing_extractor() -> NoteGridError {
    NoteGridError::Configuration("no feature extractor configured".to_string())
}
