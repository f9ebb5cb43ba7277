//! Beacon Voiceprint - voice profiles and profile-driven speech synthesis
//!
//! This library provides:
//! - Audio ingestion (decode, resample, downmix, peak-normalize)
//! - Acoustic feature extraction (MFCC, pitch, tempo, energy, centroid)
//! - Voice profile construction, persistence and cloning enrollment
//! - Synthesis routing to pluggable backends with slot-based retention
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  Raw audio samples                   │
//! │        WAV  │  MP3  │  interleaved PCM               │
//! └────────────────────┬────────────────────────────────┘
//!                      │ ingest + extract
//! ┌────────────────────▼────────────────────────────────┐
//! │                 ProfileBuilder                       │
//! │   aggregate  │  ProfileRepo  │  CloningBackend       │
//! └────────────────────┬────────────────────────────────┘
//!                      │ VoiceProfile
//! ┌────────────────────▼────────────────────────────────┐
//! │                SynthesisRouter                       │
//! │   RenderBackend  │  ArtifactStore  │  slots          │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod logging;
pub mod profile;
pub mod session;
pub mod synthesis;

pub use audio::{SampleSource, Waveform, ingest};
pub use backend::{
    BackendRegistry, CloningBackend, EnrollmentSample, RenderBackend, SystemVoice,
    SystemVoiceCatalog,
};
pub use config::Config;
pub use db::{DbConn, DbPool, ProfileRepo};
pub use error::{BoxError, Error, Result, SynthesisCause};
pub use features::{FeatureBundle, extract};
pub use profile::{
    BuiltProfile, EnrollmentOutcome, ExternalVoice, ProfileBuilder, Provenance, SkippedSample,
    VoiceEmbedding, VoiceProfile,
};
pub use session::VoiceSession;
pub use synthesis::{
    ArtifactStore, SqliteArtifactStore, SynthesisArtifact, SynthesisRequest, SynthesisRouter,
};
