//! Error types for voice profile construction and synthesis routing

use thiserror::Error;

/// Result type alias for voiceprint operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error returned by external backends
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while building profiles or synthesizing speech
#[derive(Debug, Error)]
pub enum Error {
    /// Audio container or codec could not be decoded
    #[error("unsupported audio format for {sample}: {reason}")]
    UnsupportedFormat { sample: String, reason: String },

    /// Audio contains no signal (peak amplitude is zero)
    #[error("silent audio: {sample}")]
    SilentAudio { sample: String },

    /// Waveform violates its invariants (empty or non-finite samples)
    #[error("invalid waveform: {0}")]
    InvalidWaveform(String),

    /// Acoustic feature extraction failed
    #[error("feature extraction failed: {0}")]
    FeatureExtraction(String),

    /// No sample survived ingestion and extraction
    #[error("no valid samples ({skipped} skipped)")]
    NoValidSamples { skipped: usize },

    /// Cloning backend rejected the enrollment
    #[error("enrollment with {backend} failed: {cause}")]
    EnrollmentFailed {
        backend: String,
        #[source]
        cause: BoxError,
    },

    /// Recorded profile has no external voice handle to synthesize with
    #[error("profile {profile_id} has no external voice handle for {backend}")]
    BackendHandleMissing { profile_id: String, backend: String },

    /// Requested backend cannot render the profile
    #[error("backend {backend} is incompatible with profile {profile_id}: {reason}")]
    IncompatibleBackend {
        profile_id: String,
        backend: String,
        reason: String,
    },

    /// Backend render call failed or was cancelled
    #[error("synthesis with {backend} failed: {cause}")]
    SynthesisFailed {
        backend: String,
        #[source]
        cause: SynthesisCause,
    },

    /// External voice handle already attached to a profile
    #[error("profile {0} already has an external voice handle")]
    HandleAlreadyAttached(String),

    /// Resampling error
    #[error("resample error: {0}")]
    Resample(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Underlying reason a synthesis request failed
#[derive(Debug, Error)]
pub enum SynthesisCause {
    /// Backend returned an error
    #[error("{0}")]
    Backend(#[source] BoxError),

    /// Caller deadline elapsed before the backend finished
    #[error("cancelled")]
    Cancelled,

    /// Backend output could not be decoded to audio
    #[error("unusable output: {0}")]
    Output(String),
}

impl Error {
    /// Build a `SynthesisFailed` error from a backend name and cause
    #[must_use]
    pub fn synthesis(backend: &str, cause: SynthesisCause) -> Self {
        Self::SynthesisFailed {
            backend: backend.to_string(),
            cause,
        }
    }
}
