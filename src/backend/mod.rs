//! Synthesis and cloning backend adapters
//!
//! Each speech service implements [`RenderBackend`] (and optionally
//! [`CloningBackend`]) and is registered by name in a [`BackendRegistry`].
//! Backends never see profiles; they receive a plain voice reference.

mod registry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::BoxError;

pub use registry::BackendRegistry;

/// A voice a backend offers without enrollment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemVoice {
    /// Backend-specific voice identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// Optional description (language, gender, style)
    pub description: Option<String>,
}

impl SystemVoice {
    /// Create a system voice with no description
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
        }
    }
}

/// Audio handed to a cloning backend during enrollment
#[derive(Debug, Clone)]
pub struct EnrollmentSample {
    /// Label of the original sample
    pub label: String,

    /// 16-bit mono WAV at the profile sample rate
    pub wav: Vec<u8>,
}

/// Voices a backend provides out of the box
pub trait SystemVoiceCatalog {
    /// List the backend's built-in voices
    ///
    /// Default implementation reports none
    fn system_voices(&self) -> Vec<SystemVoice> {
        Vec::new()
    }
}

/// Text-to-speech rendering capability
#[async_trait]
pub trait RenderBackend: SystemVoiceCatalog + Send + Sync {
    /// Registry name of the backend
    fn name(&self) -> &str;

    /// Render `text` with the given voice reference into encoded audio (WAV or MP3)
    ///
    /// The voice reference is either a system voice id or an enrollment handle.
    async fn render(&self, text: &str, voice_reference: &str) -> Result<Vec<u8>, BoxError>;
}

/// Voice cloning capability
#[async_trait]
pub trait CloningBackend: Send + Sync {
    /// Registry name of the backend; handles it returns are rendered by the
    /// render backend of the same name
    fn name(&self) -> &str;

    /// Register a new voice from samples and return its handle
    async fn enroll(&self, name: &str, samples: &[EnrollmentSample]) -> Result<String, BoxError>;
}
