//! Decode → resample → normalize pipeline

use super::{SampleSource, Waveform, decode, resample};
use crate::{Error, Result};

/// Load a sample as a peak-normalized mono waveform at `target_rate`
///
/// # Errors
///
/// - `UnsupportedFormat` if the input cannot be decoded
/// - `SilentAudio` if every sample is zero
/// - `Io` if a path cannot be read
pub fn ingest(source: &SampleSource, target_rate: u32) -> Result<Waveform> {
    let label = source.label();
    let decoded = decode(source)?;

    if decoded.samples.is_empty() {
        return Err(Error::UnsupportedFormat {
            sample: label,
            reason: "no audio frames".to_string(),
        });
    }
    if decoded.samples.iter().any(|s| !s.is_finite()) {
        return Err(Error::UnsupportedFormat {
            sample: label,
            reason: "non-finite samples".to_string(),
        });
    }

    let mut samples = resample(&decoded.samples, decoded.sample_rate, target_rate)?;
    if samples.is_empty() {
        return Err(Error::UnsupportedFormat {
            sample: label,
            reason: "too short to resample".to_string(),
        });
    }

    peak_normalize(&mut samples, &label)?;

    tracing::debug!(
        sample = %label,
        source_rate = decoded.sample_rate,
        source_channels = decoded.source_channels,
        target_rate,
        samples = samples.len(),
        "ingested sample"
    );

    Waveform::new(samples, target_rate)
}

/// Divide samples by their peak absolute value
///
/// # Errors
///
/// Returns `SilentAudio` if the peak is zero
pub fn peak_normalize(samples: &mut [f32], label: &str) -> Result<()> {
    let peak = samples.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()));
    if peak <= 0.0 {
        return Err(Error::SilentAudio {
            sample: label.to_string(),
        });
    }

    for sample in samples.iter_mut() {
        *sample /= peak;
    }

    Ok(())
}
