//! Synthesis artifact index

use std::path::PathBuf;

use rusqlite::OptionalExtension;

use super::{DbPool, connection, parse_timestamp};
use crate::Result;
use crate::synthesis::SynthesisArtifact;

const COLUMNS: &str = "id, slot, profile_id, text, backend, path, created_at";

/// Index of artifact files, one row per committed artifact
#[derive(Clone)]
pub struct ArtifactIndex {
    pool: DbPool,
}

impl ArtifactIndex {
    /// Create a new artifact index
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Record a fully written artifact
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn insert(&self, artifact: &SynthesisArtifact) -> Result<()> {
        let conn = connection(&self.pool)?;

        conn.execute(
            r"
            INSERT INTO synthesis_artifacts (id, slot, profile_id, text, backend, path, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
            rusqlite::params![
                artifact.id,
                artifact.slot,
                artifact.profile_id,
                artifact.text,
                artifact.backend,
                artifact.path.to_string_lossy(),
                artifact.created_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    /// Get an artifact by id
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get(&self, id: &str) -> Result<Option<SynthesisArtifact>> {
        let conn = connection(&self.pool)?;

        let artifact = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM synthesis_artifacts WHERE id = ?1"),
                rusqlite::params![id],
                Self::row_to_artifact,
            )
            .optional()?;

        Ok(artifact)
    }

    /// Artifacts in a slot, oldest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list_slot(&self, slot: &str) -> Result<Vec<SynthesisArtifact>> {
        let conn = connection(&self.pool)?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM synthesis_artifacts WHERE slot = ?1 ORDER BY seq"
        ))?;
        let rows = stmt.query_map(rusqlite::params![slot], Self::row_to_artifact)?;

        let mut artifacts = Vec::new();
        for row in rows {
            artifacts.push(row?);
        }

        Ok(artifacts)
    }

    /// Remove an artifact's row
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn delete(&self, id: &str) -> Result<bool> {
        let conn = connection(&self.pool)?;

        let rows = conn.execute(
            "DELETE FROM synthesis_artifacts WHERE id = ?1",
            rusqlite::params![id],
        )?;

        Ok(rows > 0)
    }

    fn row_to_artifact(row: &rusqlite::Row<'_>) -> rusqlite::Result<SynthesisArtifact> {
        let path: String = row.get(5)?;
        let created_at: String = row.get(6)?;

        Ok(SynthesisArtifact {
            id: row.get(0)?,
            slot: row.get(1)?,
            profile_id: row.get(2)?,
            text: row.get(3)?,
            backend: row.get(4)?,
            path: PathBuf::from(path),
            created_at: parse_timestamp(6, &created_at)?,
        })
    }
}
