//! Voice profiles
//!
//! A profile is either recorded (built from audio samples, carrying an
//! embedding) or a pass-through for a voice a synthesis backend already
//! provides. Recorded profiles may later acquire one external voice handle
//! from a cloning backend.

mod aggregate;
mod builder;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use aggregate::aggregate;
pub use builder::{BuiltProfile, EnrollmentOutcome, ProfileBuilder, SkippedSample};

/// Prefix of recorded profile ids
pub const RECORDED_PREFIX: &str = "voice-";

/// Prefix of pass-through profile ids
pub const SYSTEM_PREFIX: &str = "system:";

/// Where a profile's voice comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Provenance {
    /// Built from recorded audio samples
    Recorded,

    /// Voice supplied by a synthesis backend
    SystemVoice { backend: String, voice_id: String },
}

/// Voice registered with an external cloning backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalVoice {
    pub backend: String,
    pub handle: String,
}

/// Fixed-shape acoustic summary stored on a recorded profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceEmbedding {
    /// Mean cepstral coefficients
    pub cepstral_mean: Vec<f32>,
    pub avg_pitch: f32,
    pub pitch_range: f32,
    pub tempo: f32,
    pub energy_mean: f32,
    pub spectral_centroid_mean: f32,
    /// Total seconds of audio across contributing samples
    pub total_duration: f32,
    /// Number of samples that contributed
    pub sample_count: usize,
}

/// Persisted voice profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceProfile {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub embedding: Option<VoiceEmbedding>,
    pub sample_rate: u32,
    pub provenance: Provenance,
    pub external_voice: Option<ExternalVoice>,
    pub created_at: DateTime<Utc>,
}

/// Id of the pass-through profile for a backend's voice
#[must_use]
pub fn system_profile_id(backend: &str, voice_id: &str) -> String {
    format!("{SYSTEM_PREFIX}{backend}:{voice_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_ids_never_look_recorded() {
        let id = system_profile_id("say", "voice-1");
        assert_eq!(id, "system:say:voice-1");
        assert!(!id.starts_with(RECORDED_PREFIX));
    }

    #[test]
    fn test_provenance_serialization() {
        let json = serde_json::to_string(&Provenance::SystemVoice {
            backend: "say".to_string(),
            voice_id: "alex".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"system_voice","backend":"say","voice_id":"alex"}"#);

        let recorded: Provenance = serde_json::from_str(r#"{"type":"recorded"}"#).unwrap();
        assert_eq!(recorded, Provenance::Recorded);
    }
}
