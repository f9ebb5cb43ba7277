//! Sample rate conversion using rubato

use rubato::{FftFixedIn, Resampler};

use crate::{Error, Result};

/// Input frames per resampler chunk
const CHUNK_SIZE: usize = 1024;

/// FFT sub-chunks per chunk
const SUB_CHUNKS: usize = 2;

/// Resample mono audio from one rate to another
///
/// The output holds exactly `round(len * to_rate / from_rate)` samples; the
/// resampler's output delay is trimmed and the tail is flushed, so duration
/// is preserved to within one sample.
///
/// # Errors
///
/// Returns error if either rate is zero or the resampler fails
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == 0 || to_rate == 0 {
        return Err(Error::Resample(format!(
            "invalid rates {from_rate} -> {to_rate}"
        )));
    }
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let expected = expected_len(samples.len(), from_rate, to_rate);

    let mut resampler = FftFixedIn::<f64>::new(
        from_rate as usize,
        to_rate as usize,
        CHUNK_SIZE,
        SUB_CHUNKS,
        1,
    )
    .map_err(|e| Error::Resample(format!("resampler init failed: {e}")))?;

    let delay = resampler.output_delay();
    let input: Vec<f64> = samples.iter().map(|&s| f64::from(s)).collect();
    let mut output: Vec<f64> = Vec::with_capacity(expected + delay + CHUNK_SIZE);

    let mut chunks = input.chunks_exact(CHUNK_SIZE);
    for chunk in &mut chunks {
        let result = resampler
            .process(&[chunk], None)
            .map_err(|e| Error::Resample(e.to_string()))?;
        output.extend_from_slice(&result[0]);
    }

    let remainder = chunks.remainder();
    if !remainder.is_empty() {
        let result = resampler
            .process_partial(Some(&[remainder][..]), None)
            .map_err(|e| Error::Resample(e.to_string()))?;
        output.extend_from_slice(&result[0]);
    }

    // Flush until the delayed tail has been emitted
    while output.len() < expected + delay {
        let result = resampler
            .process_partial(None::<&[&[f64]]>, None)
            .map_err(|e| Error::Resample(e.to_string()))?;
        if result[0].is_empty() {
            break;
        }
        output.extend_from_slice(&result[0]);
    }

    let mut resampled: Vec<f32> = output
        .into_iter()
        .skip(delay)
        .take(expected)
        .map(|s| s as f32)
        .collect();
    resampled.resize(expected, 0.0);

    tracing::debug!(
        from_rate,
        to_rate,
        input = samples.len(),
        output = resampled.len(),
        "resampled audio"
    );

    Ok(resampled)
}

/// Number of output samples for a rate conversion, rounded to nearest
fn expected_len(len: usize, from_rate: u32, to_rate: u32) -> usize {
    let len = len as u128;
    let from = u128::from(from_rate);
    let to = u128::from(to_rate);
    usize::try_from((len * to + from / 2) / from).unwrap_or(usize::MAX)
}
