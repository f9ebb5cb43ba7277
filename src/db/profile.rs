//! Voice profile repository

use chrono::Utc;
use rusqlite::OptionalExtension;
use uuid::Uuid;

use super::{DbPool, connection, parse_timestamp};
use crate::backend::SystemVoice;
use crate::profile::{
    ExternalVoice, Provenance, RECORDED_PREFIX, VoiceEmbedding, VoiceProfile, system_profile_id,
};
use crate::{Error, Result};

const COLUMNS: &str =
    "id, name, description, provenance, embedding, sample_rate, external_voice, created_at";

/// Profile repository for CRUD operations on voice profiles
#[derive(Clone)]
pub struct ProfileRepo {
    pool: DbPool,
}

impl ProfileRepo {
    /// Create a new profile repository
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Persist a profile built from recorded samples
    ///
    /// The id is derived from the row's `AUTOINCREMENT` sequence, so ids of
    /// deleted profiles are never handed out again.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn insert_recorded(
        &self,
        name: &str,
        description: Option<&str>,
        embedding: &VoiceEmbedding,
        sample_rate: u32,
    ) -> Result<VoiceProfile> {
        let mut conn = connection(&self.pool)?;
        let tx = conn.transaction()?;

        let created_at = Utc::now();
        let provenance = serde_json::to_string(&Provenance::Recorded)?;
        let embedding_json = serde_json::to_string(embedding)?;
        let placeholder = format!("pending:{}", Uuid::new_v4());

        tx.execute(
            r"
            INSERT INTO voice_profiles (
                id, name, description, provenance, embedding, sample_rate, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
            rusqlite::params![
                placeholder,
                name,
                description,
                provenance,
                embedding_json,
                sample_rate,
                created_at.to_rfc3339(),
            ],
        )?;

        let seq = tx.last_insert_rowid();
        let id = format!("{RECORDED_PREFIX}{seq}");
        tx.execute(
            "UPDATE voice_profiles SET id = ?1 WHERE seq = ?2",
            rusqlite::params![id, seq],
        )?;
        tx.commit()?;

        tracing::info!(profile_id = %id, name = %name, "recorded profile created");

        Ok(VoiceProfile {
            id,
            name: name.to_string(),
            description: description.map(str::to_string),
            embedding: Some(embedding.clone()),
            sample_rate,
            provenance: Provenance::Recorded,
            external_voice: None,
            created_at,
        })
    }

    /// Persist a pass-through profile for a backend's system voice
    ///
    /// Returns `None` if the profile already exists; existing rows are never
    /// modified.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn insert_system(
        &self,
        backend: &str,
        voice: &SystemVoice,
        sample_rate: u32,
    ) -> Result<Option<VoiceProfile>> {
        let conn = connection(&self.pool)?;

        let id = system_profile_id(backend, &voice.id);
        let created_at = Utc::now();
        let provenance = Provenance::SystemVoice {
            backend: backend.to_string(),
            voice_id: voice.id.clone(),
        };

        let rows = conn.execute(
            r"
            INSERT OR IGNORE INTO voice_profiles (
                id, name, description, provenance, sample_rate, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            rusqlite::params![
                id,
                voice.name,
                voice.description,
                serde_json::to_string(&provenance)?,
                sample_rate,
                created_at.to_rfc3339(),
            ],
        )?;

        if rows == 0 {
            return Ok(None);
        }

        tracing::debug!(profile_id = %id, "system voice profile created");

        Ok(Some(VoiceProfile {
            id,
            name: voice.name.clone(),
            description: voice.description.clone(),
            embedding: None,
            sample_rate,
            provenance,
            external_voice: None,
            created_at,
        }))
    }

    /// Get a profile by id
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get(&self, id: &str) -> Result<Option<VoiceProfile>> {
        let conn = connection(&self.pool)?;

        let profile = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM voice_profiles WHERE id = ?1"),
                rusqlite::params![id],
                Self::row_to_profile,
            )
            .optional()?;

        Ok(profile)
    }

    /// List all profiles in creation order
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list(&self) -> Result<Vec<VoiceProfile>> {
        let conn = connection(&self.pool)?;

        let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM voice_profiles ORDER BY seq"))?;
        let rows = stmt.query_map([], Self::row_to_profile)?;

        let mut profiles = Vec::new();
        for row in rows {
            profiles.push(row?);
        }

        Ok(profiles)
    }

    /// Delete a profile by id
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn delete(&self, id: &str) -> Result<bool> {
        let conn = connection(&self.pool)?;

        let rows = conn.execute(
            "DELETE FROM voice_profiles WHERE id = ?1",
            rusqlite::params![id],
        )?;

        if rows > 0 {
            tracing::info!(profile_id = %id, "profile deleted");
        }

        Ok(rows > 0)
    }

    /// Attach an external voice handle to a profile
    ///
    /// # Errors
    ///
    /// - `NotFound` if the profile does not exist
    /// - `HandleAlreadyAttached` if the profile already has a handle
    pub fn attach_external_voice(&self, id: &str, voice: &ExternalVoice) -> Result<VoiceProfile> {
        {
            let conn = connection(&self.pool)?;
            let rows = conn.execute(
                "UPDATE voice_profiles SET external_voice = ?1 WHERE id = ?2 AND external_voice IS NULL",
                rusqlite::params![serde_json::to_string(voice)?, id],
            )?;

            if rows == 0 {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM voice_profiles WHERE id = ?1)",
                    rusqlite::params![id],
                    |row| row.get(0),
                )?;
                return Err(if exists {
                    Error::HandleAlreadyAttached(id.to_string())
                } else {
                    Error::NotFound(format!("profile {id}"))
                });
            }
        }

        tracing::info!(profile_id = %id, backend = %voice.backend, "external voice attached");

        self.get(id)?
            .ok_or_else(|| Error::NotFound(format!("profile {id}")))
    }

    /// Convert a database row to a `VoiceProfile`
    fn row_to_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<VoiceProfile> {
        let provenance: String = row.get(3)?;
        let embedding: Option<String> = row.get(4)?;
        let external_voice: Option<String> = row.get(6)?;
        let created_at: String = row.get(7)?;

        Ok(VoiceProfile {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            provenance: from_json(3, &provenance)?,
            embedding: embedding.as_deref().map(|s| from_json(4, s)).transpose()?,
            sample_rate: row.get(5)?,
            external_voice: external_voice.as_deref().map(|s| from_json(6, s)).transpose()?,
            created_at: parse_timestamp(7, &created_at)?,
        })
    }
}

fn from_json<T: serde::de::DeserializeOwned>(column: usize, value: &str) -> rusqlite::Result<T> {
    serde_json::from_str(value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    fn embedding() -> VoiceEmbedding {
        VoiceEmbedding {
            cepstral_mean: vec![1.0; 13],
            avg_pitch: 180.0,
            pitch_range: 40.0,
            tempo: 110.0,
            energy_mean: 0.2,
            spectral_centroid_mean: 1500.0,
            total_duration: 3.0,
            sample_count: 2,
        }
    }

    fn repo() -> ProfileRepo {
        ProfileRepo::new(init_memory().unwrap())
    }

    #[test]
    fn test_insert_and_get_recorded() {
        let repo = repo();
        let created = repo
            .insert_recorded("Ada", Some("narration"), &embedding(), 22050)
            .unwrap();

        assert_eq!(created.id, "voice-1");
        let loaded = repo.get(&created.id).unwrap().unwrap();
        assert_eq!(loaded.name, "Ada");
        assert_eq!(loaded.description.as_deref(), Some("narration"));
        assert_eq!(loaded.embedding, Some(embedding()));
        assert_eq!(loaded.provenance, Provenance::Recorded);
        assert_eq!(loaded.created_at, created.created_at);
    }

    #[test]
    fn test_recorded_ids_are_not_reused() {
        let repo = repo();
        let first = repo.insert_recorded("a", None, &embedding(), 22050).unwrap();
        let second = repo.insert_recorded("b", None, &embedding(), 22050).unwrap();
        assert!(repo.delete(&second.id).unwrap());

        let third = repo.insert_recorded("c", None, &embedding(), 22050).unwrap();
        assert_ne!(third.id, first.id);
        assert_ne!(third.id, second.id);
        assert_eq!(third.id, "voice-3");
    }

    #[test]
    fn test_system_insert_is_idempotent() {
        let repo = repo();
        let voice = SystemVoice::new("alex", "Alex");

        let created = repo.insert_system("say", &voice, 22050).unwrap().unwrap();
        assert_eq!(created.id, "system:say:alex");
        assert!(created.embedding.is_none());

        assert!(repo.insert_system("say", &voice, 22050).unwrap().is_none());
        assert_eq!(repo.list().unwrap().len(), 1);
    }

    #[test]
    fn test_attach_external_voice_once() {
        let repo = repo();
        let profile = repo.insert_recorded("a", None, &embedding(), 22050).unwrap();
        let voice = ExternalVoice {
            backend: "elevenlabs".to_string(),
            handle: "abc123".to_string(),
        };

        let updated = repo.attach_external_voice(&profile.id, &voice).unwrap();
        assert_eq!(updated.external_voice, Some(voice.clone()));

        assert!(matches!(
            repo.attach_external_voice(&profile.id, &voice),
            Err(Error::HandleAlreadyAttached(_))
        ));
        assert!(matches!(
            repo.attach_external_voice("voice-99", &voice),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_get_missing_and_delete_missing() {
        let repo = repo();
        assert!(repo.get("voice-1").unwrap().is_none());
        assert!(!repo.delete("voice-1").unwrap());
    }
}
