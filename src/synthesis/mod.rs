//! Text-to-speech routing and artifact retention
//!
//! A [`SynthesisRouter`] resolves a profile to a backend and voice
//! reference, renders the text exactly once, and stores the result as the
//! newest artifact of a slot. Earlier artifacts in the slot are removed only
//! after the new one is committed.

mod router;
mod store;

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use router::{DEFAULT_CACHE_SIZE, ResolvedVoice, SynthesisRouter};
pub use store::{ArtifactStore, NewArtifact, SqliteArtifactStore};

/// Default slot when a request names none
pub const DEFAULT_SLOT: &str = "latest";

/// A request to render text with a profile's voice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisRequest {
    pub profile_id: String,
    pub text: String,
    /// Backend to use instead of the configured priority order
    pub backend_preference: Option<String>,
    /// Artifact slot the result replaces
    pub slot: String,
}

impl SynthesisRequest {
    /// Create a request for the default slot with no backend preference
    #[must_use]
    pub fn new(profile_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            profile_id: profile_id.into(),
            text: text.into(),
            backend_preference: None,
            slot: DEFAULT_SLOT.to_string(),
        }
    }

    /// Set the target slot
    #[must_use]
    pub fn in_slot(mut self, slot: impl Into<String>) -> Self {
        self.slot = slot.into();
        self
    }

    /// Prefer a specific backend
    #[must_use]
    pub fn prefer(mut self, backend: impl Into<String>) -> Self {
        self.backend_preference = Some(backend.into());
        self
    }
}

/// A committed synthesis result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisArtifact {
    pub id: String,
    pub slot: String,
    pub profile_id: String,
    pub text: String,
    pub backend: String,
    /// 16-bit mono WAV file
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle of a synthesis request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Requested,
    BackendSelected,
    Dispatched,
    Completed,
    Failed,
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Requested => "requested",
            Self::BackendSelected => "backend_selected",
            Self::Dispatched => "dispatched",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}
