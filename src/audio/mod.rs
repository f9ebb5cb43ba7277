//! Audio ingestion
//!
//! Decodes raw samples, resamples to the canonical rate, downmixes to mono
//! and peak-normalizes. Nothing here touches the filesystem except reading
//! a `SampleSource::Path`.

mod decode;
mod ingest;
mod resample;
mod wav;

use std::path::PathBuf;

use crate::{Error, Result};

pub use decode::{DecodedAudio, decode};
pub use ingest::{ingest, peak_normalize};
pub use resample::resample;
pub use wav::encode_wav;

/// Canonical sample rate for voice profiles
pub const DEFAULT_SAMPLE_RATE: u32 = 22050;

/// A raw audio sample supplied by the caller
#[derive(Debug, Clone)]
pub enum SampleSource {
    /// Audio file on disk (WAV or MP3)
    Path(PathBuf),

    /// Encoded audio held in memory (WAV or MP3)
    Bytes { label: String, data: Vec<u8> },

    /// Interleaved PCM with a declared rate and channel count
    Pcm {
        label: String,
        samples: Vec<f32>,
        channels: u16,
        sample_rate: u32,
    },
}

impl SampleSource {
    /// Create a source from a file path
    #[must_use]
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    /// Create a source from encoded bytes
    #[must_use]
    pub fn bytes(label: impl Into<String>, data: Vec<u8>) -> Self {
        Self::Bytes {
            label: label.into(),
            data,
        }
    }

    /// Create a mono PCM source
    #[must_use]
    pub fn mono(label: impl Into<String>, samples: Vec<f32>, sample_rate: u32) -> Self {
        Self::Pcm {
            label: label.into(),
            samples,
            channels: 1,
            sample_rate,
        }
    }

    /// Human-readable identifier used in logs and errors
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Bytes { label, .. } | Self::Pcm { label, .. } => label.clone(),
        }
    }
}

/// Mono audio at a known sample rate
///
/// Always non-empty with finite samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Waveform {
    /// Create a waveform, validating its invariants
    ///
    /// # Errors
    ///
    /// Returns error if the samples are empty or contain NaN/inf, or the rate is zero
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(Error::InvalidWaveform("sample rate is zero".to_string()));
        }
        if samples.is_empty() {
            return Err(Error::InvalidWaveform("no samples".to_string()));
        }
        if let Some(pos) = samples.iter().position(|s| !s.is_finite()) {
            return Err(Error::InvalidWaveform(format!(
                "non-finite sample at index {pos}"
            )));
        }

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Sample values
    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sample rate in Hz
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Channel count (always mono)
    #[must_use]
    pub const fn channels(&self) -> u16 {
        1
    }

    /// Number of samples
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false; kept for API symmetry with `len`
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waveform_rejects_empty() {
        assert!(matches!(
            Waveform::new(Vec::new(), 22050),
            Err(Error::InvalidWaveform(_))
        ));
    }

    #[test]
    fn test_waveform_rejects_nan() {
        let result = Waveform::new(vec![0.1, f32::NAN, 0.2], 22050);
        assert!(matches!(result, Err(Error::InvalidWaveform(_))));
    }

    #[test]
    fn test_waveform_duration() {
        let waveform = Waveform::new(vec![0.5; 11025], 22050).unwrap();
        assert!((waveform.duration_secs() - 0.5).abs() < f32::EPSILON);
        assert_eq!(waveform.channels(), 1);
    }

    #[test]
    fn test_source_labels() {
        assert_eq!(SampleSource::path("/tmp/a.wav").label(), "/tmp/a.wav");
        assert_eq!(SampleSource::bytes("upload", vec![]).label(), "upload");
    }
}
