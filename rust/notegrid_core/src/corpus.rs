use crate::types::{ProgressEvent, ProgressSink, ProgressStage};
use crate::NoteGridError;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// How many difficulties an audio asset contributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelMatch {
    /// The first configured difficulty present.
    First,
    /// One sample per configured difficulty present.
    All,
}

/// An audio asset paired with one level file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusEntry {
    pub audio: PathBuf,
    pub level: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CorpusIndex {
    entries: Vec<CorpusEntry>,
}

impl CorpusIndex {
    /// Scans `root` for `*.<extension>` assets and pairs each with sibling
    /// `<difficulty>.json` files.
    pub fn discover(
        root: &Path,
        extension: &str,
        difficulties: &[String],
        policy: LevelMatch,
    ) -> Result<Vec<CorpusEntry>, NoteGridError> {
        if !root.is_dir() {
            return Err(NoteGridError::Configuration(format!(
                "invalid directory: {}",
                root.display()
            )));
        }

        let mut audio_files: Vec<PathBuf> = WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| {
                path.extension()
                    .map(|ext| ext.eq_ignore_ascii_case(extension))
                    .unwrap_or(false)
            })
            .collect();
        audio_files.sort_by(|a, b| a.parent().cmp(&b.parent()).then_with(|| a.cmp(b)));

        let mut entries = Vec::new();
        for audio in audio_files {
            let dir = audio.parent().unwrap_or(root);
            let mut matched = false;
            for difficulty in difficulties {
                let level = dir.join(format!("{}.json", difficulty));
                if !level.is_file() {
                    continue;
                }
                matched = true;
                entries.push(CorpusEntry {
                    audio: audio.clone(),
                    level,
                });
                if policy == LevelMatch::First {
                    break;
                }
            }
            if !matched {
                log::debug!("no level for {}; skipping", audio.display());
            }
        }
        Ok(entries)
    }

    /// Keeps the candidates `accept` approves and refuses to build an empty index.
    pub fn build<F>(
        candidates: Vec<CorpusEntry>,
        mut accept: F,
        progress: &mut dyn ProgressSink,
    ) -> Result<Self, NoteGridError>
    where
        F: FnMut(usize, &CorpusEntry) -> Result<bool, NoteGridError>,
    {
        let total = candidates.len().max(1) as f32;
        let mut entries = Vec::with_capacity(candidates.len());
        for (i, entry) in candidates.into_iter().enumerate() {
            if accept(entries.len(), &entry)? {
                entries.push(entry);
            } else {
                log::info!(
                    "excluding {} with {}: too short",
                    entry.audio.display(),
                    entry.level.display()
                );
            }
            progress.on_progress(ProgressEvent {
                stage: ProgressStage::Validate,
                progress: (i as f32 + 1.0) / total,
            });
        }
        if entries.is_empty() {
            return Err(NoteGridError::Configuration(
                "no audio file with a matching level survived filtering".to_string(),
            ));
        }
        log::info!("corpus holds {} songs", entries.len());
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, index: usize) -> Result<&CorpusEntry, NoteGridError> {
        self.entries.get(index).ok_or_else(|| {
            NoteGridError::InvalidInput(format!(
                "song index {} out of range for {} songs",
                index,
                self.entries.len()
            ))
        })
    }

    pub fn entries(&self) -> &[CorpusEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NoopProgressSink;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn first_match_takes_one_level_per_song() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("b/song.ogg"));
        touch(&dir.path().join("b/Hard.json"));
        touch(&dir.path().join("b/Expert.json"));
        touch(&dir.path().join("a/song.ogg"));
        touch(&dir.path().join("a/Expert.json"));
        touch(&dir.path().join("c/song.ogg"));
        touch(&dir.path().join("c/Easy.json"));

        let entries = CorpusIndex::discover(
            dir.path(),
            "ogg",
            &names(&["Expert", "Hard"]),
            LevelMatch::First,
        )
        .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].audio, dir.path().join("a/song.ogg"));
        assert_eq!(entries[1].level, dir.path().join("b/Expert.json"));
    }

    #[test]
    fn all_match_registers_each_difficulty() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("x/track.ogg"));
        touch(&dir.path().join("x/Hard.json"));
        touch(&dir.path().join("x/Expert.json"));

        let entries = CorpusIndex::discover(
            dir.path(),
            "ogg",
            &names(&["Hard", "Expert"]),
            LevelMatch::All,
        )
        .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].audio, entries[1].audio);
        assert_eq!(entries[0].level, dir.path().join("x/Hard.json"));
        assert_eq!(entries[1].level, dir.path().join("x/Expert.json"));
    }

    #[test]
    fn invalid_root_is_a_configuration_error() {
        let err = CorpusIndex::discover(
            Path::new("/definitely/not/here"),
            "ogg",
            &names(&["Expert"]),
            LevelMatch::First,
        )
        .unwrap_err();
        assert!(matches!(err, NoteGridError::Configuration(_)));
    }

    #[test]
    fn empty_index_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("only/song.ogg"));
        let candidates =
            CorpusIndex::discover(dir.path(), "ogg", &names(&["Expert"]), LevelMatch::First)
                .unwrap();
        assert!(candidates.is_empty());
        let err = CorpusIndex::build(candidates, |_, _| Ok(true), &mut NoopProgressSink)
            .unwrap_err();
        assert!(matches!(err, NoteGridError::Configuration(_)));
    }

    #[test]
    fn build_filters_and_reports_progress() {
        let candidates = vec![
            CorpusEntry {
                audio: PathBuf::from("a.ogg"),
                level: PathBuf::from("a.json"),
            },
            CorpusEntry {
                audio: PathBuf::from("b.ogg"),
                level: PathBuf::from("b.json"),
            },
        ];
        let mut seen = Vec::new();
        let mut sink = |event: ProgressEvent| seen.push(event.progress);
        let index = CorpusIndex::build(
            candidates,
            |next, entry| {
                assert_eq!(next, 0);
                Ok(entry.audio != Path::new("a.ogg"))
            },
            &mut sink,
        )
        .unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.entry(0).unwrap().audio, PathBuf::from("b.ogg"));
        assert!(index.entry(1).is_err());
        assert_eq!(seen, vec![0.5, 1.0]);
    }
}
