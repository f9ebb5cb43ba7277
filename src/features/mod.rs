//! Acoustic feature extraction
//!
//! Every per-frame series in a [`FeatureBundle`] is computed over the same
//! framing: windows of [`FRAME_LENGTH`] samples advanced by [`HOP_LENGTH`],
//! without centering or padding. Frame counts therefore match within one
//! bundle but differ between clips of different durations, so consumers
//! must reduce the time axis before comparing bundles.

mod pitch;
mod rhythm;
mod spectral;

use serde::{Deserialize, Serialize};

use crate::audio::Waveform;
use crate::{Error, Result};

pub use pitch::{PITCH_MAX_HZ, PITCH_MIN_HZ, PitchFrame};

/// Analysis window length in samples
pub const FRAME_LENGTH: usize = 2048;

/// Hop between consecutive windows in samples
pub const HOP_LENGTH: usize = 512;

/// Mel bands feeding the cepstral transform
pub const N_MELS: usize = 128;

/// Cepstral coefficients kept per frame
pub const N_MFCC: usize = 13;

/// Acoustic fingerprint of one audio sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureBundle {
    /// Cepstral coefficients, `[coefficient][frame]`
    pub mfcc: Vec<Vec<f32>>,

    /// Mean pitch of confidently voiced frames (Hz, 0 if none)
    pub avg_pitch: f32,

    /// Max minus min pitch over the same frames (Hz)
    pub pitch_range: f32,

    /// Spectral centroid per frame (Hz)
    pub spectral_centroid: Vec<f32>,

    /// Tempo of the onset envelope (BPM, 0 if none found)
    pub tempo: f32,

    /// RMS amplitude per frame
    pub energy: Vec<f32>,

    /// Clip duration in seconds
    pub duration: f32,

    /// Sample rate the features were computed at
    pub sample_rate: u32,
}

impl FeatureBundle {
    /// Number of analysis frames
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.energy.len()
    }

    /// Per-coefficient mean over time
    #[must_use]
    pub fn mfcc_mean(&self) -> Vec<f32> {
        self.mfcc.iter().map(|row| mean(row)).collect()
    }

    /// Mean RMS energy over time
    #[must_use]
    pub fn energy_mean(&self) -> f32 {
        mean(&self.energy)
    }

    /// Mean spectral centroid over time
    #[must_use]
    pub fn centroid_mean(&self) -> f32 {
        mean(&self.spectral_centroid)
    }
}

/// Number of full analysis frames in `len` samples
#[must_use]
pub const fn frame_count(len: usize) -> usize {
    if len < FRAME_LENGTH {
        0
    } else {
        (len - FRAME_LENGTH) / HOP_LENGTH + 1
    }
}

/// Extract the feature bundle of a normalized waveform
///
/// # Errors
///
/// Returns `FeatureExtraction` if the waveform is shorter than one analysis
/// window or a computed feature is not finite
#[allow(clippy::cast_precision_loss)]
pub fn extract(waveform: &Waveform) -> Result<FeatureBundle> {
    let samples = waveform.samples();
    let sample_rate = waveform.sample_rate();

    let num_frames = frame_count(samples.len());
    if num_frames == 0 {
        return Err(Error::FeatureExtraction(format!(
            "waveform has {} samples, need at least {FRAME_LENGTH}",
            samples.len()
        )));
    }

    let magnitudes = spectral::magnitude_spectrogram(samples, num_frames);
    let filterbank = spectral::mel_filterbank(sample_rate);
    let mel_db: Vec<Vec<f32>> = magnitudes
        .iter()
        .map(|frame| spectral::mel_db(frame, &filterbank))
        .collect();

    let basis = spectral::dct_basis();
    let mut mfcc = vec![Vec::with_capacity(num_frames); N_MFCC];
    for frame in &mel_db {
        for (row, value) in mfcc.iter_mut().zip(spectral::cepstrum(&basis, frame)) {
            row.push(value);
        }
    }

    let spectral_centroid: Vec<f32> = magnitudes
        .iter()
        .map(|frame| spectral::centroid(frame, sample_rate))
        .collect();

    let frames = || (0..num_frames).map(|f| &samples[f * HOP_LENGTH..f * HOP_LENGTH + FRAME_LENGTH]);
    let energy: Vec<f32> = frames().map(spectral::rms).collect();

    let tracker = pitch::PitchTracker::new(FRAME_LENGTH, sample_rate);
    let pitch_frames: Vec<PitchFrame> = frames().map(|frame| tracker.track(frame)).collect();
    let (avg_pitch, pitch_range) = pitch::summarize(&pitch_frames);

    let onset = rhythm::onset_strength(&mel_db);
    let tempo = rhythm::estimate_tempo(&onset, sample_rate as f32 / HOP_LENGTH as f32);

    let bundle = FeatureBundle {
        mfcc,
        avg_pitch,
        pitch_range,
        spectral_centroid,
        tempo,
        energy,
        duration: waveform.duration_secs(),
        sample_rate,
    };
    validate(&bundle)?;

    tracing::debug!(
        frames = num_frames,
        avg_pitch = bundle.avg_pitch,
        pitch_range = bundle.pitch_range,
        tempo = bundle.tempo,
        duration = bundle.duration,
        "extracted features"
    );

    Ok(bundle)
}

fn validate(bundle: &FeatureBundle) -> Result<()> {
    let scalars = [
        bundle.avg_pitch,
        bundle.pitch_range,
        bundle.tempo,
        bundle.duration,
    ];
    let series = bundle
        .mfcc
        .iter()
        .flatten()
        .chain(&bundle.spectral_centroid)
        .chain(&bundle.energy);

    if scalars.iter().chain(series).all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(Error::FeatureExtraction(
            "non-finite feature value".to_string(),
        ))
    }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let sum: f64 = values.iter().map(|&v| f64::from(v)).sum();
    (sum / values.len() as f64) as f32
}
