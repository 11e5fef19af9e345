//! Per-entity artifact persistence.
//!
//! Each [`ConsolidatedArtifact`] is stored as pretty-printed JSON:
//!
//! ```text
//! <root>/
//! └── 2025-03-21/
//!     ├── Aries.json
//!     ├── Taurus.json
//!     └── ...
//! ```

use std::path::PathBuf;

use tracing::{debug, instrument};

use starbrief_shared::{ConsolidatedArtifact, Entity, Result, RunDate, StarbriefError};

/// Writes and reads consolidated artifacts under a root directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding all artifacts for `date`.
    pub fn date_dir(&self, date: RunDate) -> PathBuf {
        self.root.join(date.to_string())
    }

    /// Path of the artifact for `(date, entity)`.
    pub fn artifact_path(&self, date: RunDate, entity: &Entity) -> Result<PathBuf> {
        validate_file_stem(entity)?;
        Ok(self.date_dir(date).join(format!("{entity}.json")))
    }

    /// Create the directory for `date`. Failure here is fatal for a run.
    pub fn prepare(&self, date: RunDate) -> Result<PathBuf> {
        let dir = self.date_dir(date);
        std::fs::create_dir_all(&dir).map_err(|e| StarbriefError::io(&dir, e))?;
        Ok(dir)
    }

    /// Persist one artifact atomically (write to temp, then rename).
    #[instrument(skip_all, fields(entity = %artifact.entity, date = %artifact.date))]
    pub fn write(&self, artifact: &ConsolidatedArtifact) -> Result<PathBuf> {
        let target = self.artifact_path(artifact.date, &artifact.entity)?;
        let dir = self.prepare(artifact.date)?;
        let temp = dir.join(format!(".{}.json.tmp", artifact.entity));

        let json = serde_json::to_string_pretty(artifact)?;
        std::fs::write(&temp, json).map_err(|e| StarbriefError::io(&temp, e))?;
        std::fs::rename(&temp, &target).map_err(|e| {
            let _ = std::fs::remove_file(&temp);
            StarbriefError::io(&target, e)
        })?;

        debug!(path = %target.display(), "artifact written");
        Ok(target)
    }

    /// Load a previously written artifact.
    pub fn read(&self, date: RunDate, entity: &Entity) -> Result<ConsolidatedArtifact> {
        let path = self.artifact_path(date, entity)?;
        let content = std::fs::read_to_string(&path).map_err(|e| StarbriefError::io(&path, e))?;
        serde_json::from_str(&content).map_err(|e| {
            StarbriefError::validation(format!("invalid artifact {}: {e}", path.display()))
        })
    }
}

/// Entity ids become file names, so they must not escape the date directory.
fn validate_file_stem(entity: &Entity) -> Result<()> {
    let id = entity.as_str();
    if id.trim().is_empty()
        || id.contains(['/', '\\'])
        || id == "."
        || id == ".."
        || id.starts_with('.')
    {
        return Err(StarbriefError::validation(format!(
            "entity '{id}' cannot be used as an artifact file name"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use starbrief_shared::{Source, SourceRef, SourceSummary, SummaryRecord};

    fn temp_root(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("sb-artifacts-{tag}-{}", uuid::Uuid::now_v7()))
    }

    fn date() -> RunDate {
        RunDate::from_ymd_opt(2025, 3, 21).unwrap()
    }

    fn sample(entity: &str) -> ConsolidatedArtifact {
        ConsolidatedArtifact {
            entity: Entity::new(entity),
            date: date(),
            sources: vec![SourceRef {
                interpreter: Source::new("horoscope.com"),
                source_url: "https://www.horoscope.com/aries".into(),
            }],
            summaries: vec![SourceSummary {
                summary: SummaryRecord {
                    tone: "bright".into(),
                    final_summary: "Go.".into(),
                    ..Default::default()
                },
                interpreter: Source::new("horoscope.com"),
                source_url: "https://www.horoscope.com/aries".into(),
            }],
            merged: SummaryRecord {
                final_summary: "Go.".into(),
                ..Default::default()
            },
        }
    }

    #[test]
    fn write_then_read() {
        let root = temp_root("rw");
        let store = ArtifactStore::new(&root);

        let artifact = sample("Aries");
        let path = store.write(&artifact).unwrap();
        assert_eq!(path, root.join("2025-03-21").join("Aries.json"));
        assert!(path.exists());

        let loaded = store.read(date(), &Entity::new("Aries")).unwrap();
        assert_eq!(loaded, artifact);

        // No temp files left behind.
        let leftovers: Vec<_> = std::fs::read_dir(store.date_dir(date()))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn rewrite_replaces_existing_file() {
        let root = temp_root("overwrite");
        let store = ArtifactStore::new(&root);

        store.write(&sample("Leo")).unwrap();
        let mut updated = sample("Leo");
        updated.merged.final_summary = "Changed.".into();
        store.write(&updated).unwrap();

        let loaded = store.read(date(), &Entity::new("Leo")).unwrap();
        assert_eq!(loaded.merged.final_summary, "Changed.");

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn rejects_path_like_entities() {
        let store = ArtifactStore::new(temp_root("reject"));
        for bad in ["../evil", "a/b", "", "..", ".hidden"] {
            assert!(
                store.artifact_path(date(), &Entity::new(bad)).is_err(),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn prepare_creates_date_dir() {
        let root = temp_root("prepare");
        let store = ArtifactStore::new(&root);
        let dir = store.prepare(date()).unwrap();
        assert!(dir.is_dir());
        assert!(dir.ends_with("2025-03-21"));
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn read_missing_artifact_is_io_error() {
        let store = ArtifactStore::new(temp_root("missing"));
        let err = store.read(date(), &Entity::new("Pisces")).unwrap_err();
        assert!(matches!(err, StarbriefError::Io { .. }));
    }
}
