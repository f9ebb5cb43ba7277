//! Durable artifact storage

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use uuid::Uuid;

use super::SynthesisArtifact;
use crate::db::{ArtifactIndex, DbPool};
use crate::{Error, Result};

/// Artifact contents and metadata to be committed
#[derive(Debug, Clone, Copy)]
pub struct NewArtifact<'a> {
    pub slot: &'a str,
    pub profile_id: &'a str,
    pub text: &'a str,
    pub backend: &'a str,
    /// Encoded WAV bytes
    pub audio: &'a [u8],
}

/// Storage for synthesized audio
///
/// `write` must not make an artifact visible through `get` or `list_slot`
/// until its audio is completely stored.
pub trait ArtifactStore: Send + Sync {
    /// Durably store a new artifact and return its record
    ///
    /// # Errors
    ///
    /// Returns error if the audio or its index entry cannot be written
    fn write(&self, artifact: NewArtifact<'_>) -> Result<SynthesisArtifact>;

    /// Get an artifact by id
    ///
    /// # Errors
    ///
    /// Returns error if the index cannot be read
    fn get(&self, id: &str) -> Result<Option<SynthesisArtifact>>;

    /// Artifacts in a slot, oldest first
    ///
    /// # Errors
    ///
    /// Returns error if the index cannot be read
    fn list_slot(&self, slot: &str) -> Result<Vec<SynthesisArtifact>>;

    /// Remove an artifact, returning whether it existed
    ///
    /// # Errors
    ///
    /// Returns error if the artifact cannot be removed
    fn delete(&self, id: &str) -> Result<bool>;

    /// Read an artifact's audio bytes
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read
    fn read_audio(&self, artifact: &SynthesisArtifact) -> Result<Vec<u8>>;
}

/// Artifact files under a root directory, indexed in `SQLite`
///
/// Files live at `<root>/<slot>/<id>.wav`. The index row is written only
/// after the file has been synced and renamed into place.
#[derive(Clone)]
pub struct SqliteArtifactStore {
    index: ArtifactIndex,
    root: PathBuf,
}

impl SqliteArtifactStore {
    /// Create a store rooted at `root`
    ///
    /// # Errors
    ///
    /// Returns error if the root directory cannot be created
    pub fn new(pool: DbPool, root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;

        Ok(Self {
            index: ArtifactIndex::new(pool),
            root,
        })
    }

    /// Root directory of artifact files
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn slot_dir(&self, slot: &str) -> PathBuf {
        self.root.join(slot_dir_name(slot))
    }
}

impl ArtifactStore for SqliteArtifactStore {
    fn write(&self, artifact: NewArtifact<'_>) -> Result<SynthesisArtifact> {
        let dir = self.slot_dir(artifact.slot);
        std::fs::create_dir_all(&dir)?;

        let id = Uuid::new_v4().to_string();
        let path = dir.join(format!("{id}.wav"));

        // Stage in the slot directory so the rename stays on one filesystem
        let mut staged = tempfile::Builder::new()
            .prefix(".staging-")
            .suffix(".wav")
            .tempfile_in(&dir)?;
        staged.write_all(artifact.audio)?;
        staged.as_file().sync_all()?;
        staged.persist(&path).map_err(|e| Error::Io(e.error))?;
        sync_dir(&dir)?;

        let record = SynthesisArtifact {
            id,
            slot: artifact.slot.to_string(),
            profile_id: artifact.profile_id.to_string(),
            text: artifact.text.to_string(),
            backend: artifact.backend.to_string(),
            path,
            created_at: Utc::now(),
        };

        if let Err(e) = self.index.insert(&record) {
            if let Err(remove) = std::fs::remove_file(&record.path) {
                tracing::warn!(path = %record.path.display(), error = %remove, "failed to remove unindexed artifact");
            }
            return Err(e);
        }

        tracing::debug!(artifact_id = %record.id, slot = %record.slot, bytes = artifact.audio.len(), "artifact written");
        Ok(record)
    }

    fn get(&self, id: &str) -> Result<Option<SynthesisArtifact>> {
        self.index.get(id)
    }

    fn list_slot(&self, slot: &str) -> Result<Vec<SynthesisArtifact>> {
        self.index.list_slot(slot)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let Some(artifact) = self.index.get(id)? else {
            return Ok(false);
        };

        // Drop the index row first so a half-deleted artifact is never listed
        if !self.index.delete(id)? {
            return Ok(false);
        }

        match std::fs::remove_file(&artifact.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(artifact_id = %id, path = %artifact.path.display(), error = %e, "orphaned artifact file");
            }
        }

        tracing::debug!(artifact_id = %id, "artifact deleted");
        Ok(true)
    }

    fn read_audio(&self, artifact: &SynthesisArtifact) -> Result<Vec<u8>> {
        Ok(std::fs::read(&artifact.path)?)
    }
}

/// Flush a directory so renames into it survive a crash
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    std::fs::File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

/// Filesystem-safe directory name for a slot
fn slot_dir_name(slot: &str) -> String {
    let name: String = slot
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if name.is_empty() { "_".to_string() } else { name }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    fn store(dir: &Path) -> SqliteArtifactStore {
        SqliteArtifactStore::new(init_memory().unwrap(), dir.join("artifacts")).unwrap()
    }

    fn new_artifact<'a>(slot: &'a str, audio: &'a [u8]) -> NewArtifact<'a> {
        NewArtifact {
            slot,
            profile_id: "voice-1",
            text: "hello",
            backend: "say",
            audio,
        }
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let artifact = store.write(new_artifact("latest", b"RIFF1234")).unwrap();
        assert!(artifact.path.starts_with(store.root()));
        assert_eq!(store.read_audio(&artifact).unwrap(), b"RIFF1234");
        assert_eq!(store.get(&artifact.id).unwrap(), Some(artifact.clone()));
        assert_eq!(store.list_slot("latest").unwrap(), vec![artifact]);
    }

    #[test]
    fn test_no_staging_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.write(new_artifact("latest", b"abc")).unwrap();

        let names: Vec<String> = std::fs::read_dir(store.root().join("latest"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].ends_with(".wav"));
        assert!(!names[0].starts_with(".staging-"));
    }

    #[test]
    fn test_sync_dir_flushes_slot_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let artifact = store.write(new_artifact("fresh", b"abc")).unwrap();

        let slot_dir = artifact.path.parent().unwrap();
        assert_eq!(slot_dir, store.root().join("fresh"));
        sync_dir(slot_dir).unwrap();
        assert!(sync_dir(&slot_dir.join("missing")).is_err() || cfg!(not(unix)));
    }

    #[test]
    fn test_delete_removes_file_and_row() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let artifact = store.write(new_artifact("latest", b"abc")).unwrap();

        assert!(store.delete(&artifact.id).unwrap());
        assert!(!artifact.path.exists());
        assert!(store.list_slot("latest").unwrap().is_empty());
        assert!(!store.delete(&artifact.id).unwrap());
    }

    #[test]
    fn test_slot_names_are_sanitized() {
        assert_eq!(slot_dir_name("../etc"), "___etc");
        assert_eq!(slot_dir_name(""), "_");
        assert_eq!(slot_dir_name("chat-42_a"), "chat-42_a");

        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let artifact = store.write(new_artifact("../escape", b"abc")).unwrap();
        assert!(artifact.path.starts_with(store.root()));
        assert_eq!(artifact.slot, "../escape");
    }
}
