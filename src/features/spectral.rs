//! Short-time spectral analysis: magnitude spectrogram, mel bands, MFCCs

use std::f32::consts::PI;

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use super::{FRAME_LENGTH, HOP_LENGTH, N_MELS, N_MFCC};

/// Floor applied to mel power before converting to decibels
const POWER_FLOOR: f32 = 1e-10;

/// Periodic Hann window
#[allow(clippy::cast_precision_loss)]
fn hann_window(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / n as f32).cos())
        .collect()
}

/// Magnitude spectrum of each analysis frame, `[frame][bin]`
pub(crate) fn magnitude_spectrogram(samples: &[f32], num_frames: usize) -> Vec<Vec<f32>> {
    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(FRAME_LENGTH);
    let window = hann_window(FRAME_LENGTH);
    let bins = FRAME_LENGTH / 2 + 1;

    let mut buffer = vec![Complex::new(0.0_f32, 0.0); FRAME_LENGTH];
    let mut scratch = vec![Complex::new(0.0_f32, 0.0); fft.get_inplace_scratch_len()];

    (0..num_frames)
        .map(|f| {
            let frame = &samples[f * HOP_LENGTH..f * HOP_LENGTH + FRAME_LENGTH];
            for ((slot, &s), &w) in buffer.iter_mut().zip(frame).zip(&window) {
                *slot = Complex::new(s * w, 0.0);
            }
            fft.process_with_scratch(&mut buffer, &mut scratch);
            buffer[..bins].iter().map(|c| c.norm()).collect()
        })
        .collect()
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0_f32.powf(mel / 2595.0) - 1.0)
}

/// Triangular mel filterbank spanning 0 Hz to Nyquist, `[mel][bin]`
///
/// Each triangle is area-normalized so wide high-frequency bands do not
/// dominate the spectrum.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn mel_filterbank(sample_rate: u32) -> Vec<Vec<f32>> {
    let bins = FRAME_LENGTH / 2 + 1;
    let nyquist = sample_rate as f32 / 2.0;
    let mel_high = hz_to_mel(nyquist);

    let edges: Vec<f32> = (0..N_MELS + 2)
        .map(|i| mel_to_hz(i as f32 * mel_high / (N_MELS + 1) as f32))
        .collect();
    let bin_hz: Vec<f32> = (0..bins)
        .map(|k| k as f32 * sample_rate as f32 / FRAME_LENGTH as f32)
        .collect();

    (0..N_MELS)
        .map(|m| {
            let (left, center, right) = (edges[m], edges[m + 1], edges[m + 2]);
            let norm = 2.0 / (right - left);
            bin_hz
                .iter()
                .map(|&f| {
                    let rising = (f - left) / (center - left);
                    let falling = (right - f) / (right - center);
                    rising.min(falling).max(0.0) * norm
                })
                .collect()
        })
        .collect()
}

/// Mel band power in decibels for one magnitude frame
pub(crate) fn mel_db(magnitudes: &[f32], filterbank: &[Vec<f32>]) -> Vec<f32> {
    filterbank
        .iter()
        .map(|filter| {
            let power: f32 = filter
                .iter()
                .zip(magnitudes)
                .map(|(&w, &m)| w * m * m)
                .sum();
            10.0 * power.max(POWER_FLOOR).log10()
        })
        .collect()
}

/// Orthonormal DCT-II basis, `[coefficient][mel]`
#[allow(clippy::cast_precision_loss)]
pub(crate) fn dct_basis() -> Vec<Vec<f32>> {
    let m = N_MELS as f32;
    (0..N_MFCC)
        .map(|k| {
            let scale = if k == 0 {
                (1.0 / m).sqrt()
            } else {
                (2.0 / m).sqrt()
            };
            (0..N_MELS)
                .map(|n| scale * (PI * k as f32 * (2.0 * n as f32 + 1.0) / (2.0 * m)).cos())
                .collect()
        })
        .collect()
}

/// Project a dB mel frame onto the DCT basis
pub(crate) fn cepstrum(basis: &[Vec<f32>], mel_db: &[f32]) -> Vec<f32> {
    basis
        .iter()
        .map(|row| row.iter().zip(mel_db).map(|(&b, &v)| b * v).sum())
        .collect()
}

/// Magnitude-weighted mean frequency of one frame, 0 for a silent frame
#[allow(clippy::cast_precision_loss)]
pub(crate) fn centroid(magnitudes: &[f32], sample_rate: u32) -> f32 {
    let bin_width = sample_rate as f32 / FRAME_LENGTH as f32;
    let total: f32 = magnitudes.iter().sum();
    if total <= f32::EPSILON {
        return 0.0;
    }

    let weighted: f32 = magnitudes
        .iter()
        .enumerate()
        .map(|(k, &m)| k as f32 * bin_width * m)
        .sum();
    weighted / total
}

/// Root-mean-square amplitude of one frame
#[allow(clippy::cast_precision_loss)]
pub(crate) fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum: f32 = frame.iter().map(|s| s * s).sum();
    (sum / frame.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_hann_window_endpoints() {
        let w = hann_window(8);
        assert!(w[0].abs() < 1e-6);
        assert!((w[4] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_spectrum_peaks_at_tone() {
        let rate = 22050;
        let samples = sine(1000.0, rate, FRAME_LENGTH);
        let spectrum = magnitude_spectrogram(&samples, 1);

        let peak_bin = spectrum[0]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(k, _)| k)
            .unwrap();
        let peak_hz = peak_bin as f32 * rate as f32 / FRAME_LENGTH as f32;
        assert!((peak_hz - 1000.0).abs() < 11.0, "peak at {peak_hz}");
    }

    #[test]
    fn test_centroid_tracks_tone() {
        let rate = 22050;
        let samples = sine(2000.0, rate, FRAME_LENGTH);
        let spectrum = magnitude_spectrogram(&samples, 1);
        let c = centroid(&spectrum[0], rate);
        assert!((c - 2000.0).abs() < 100.0, "centroid {c}");
    }

    #[test]
    fn test_filterbank_shape() {
        let fb = mel_filterbank(22050);
        assert_eq!(fb.len(), N_MELS);
        assert!(fb.iter().all(|f| f.len() == FRAME_LENGTH / 2 + 1));
        assert!(fb.iter().flatten().all(|&w| w >= 0.0));
    }

    #[test]
    fn test_dct_basis_is_orthonormal() {
        let basis = dct_basis();
        for (i, a) in basis.iter().enumerate() {
            for (j, b) in basis.iter().enumerate() {
                let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((dot - expected).abs() < 1e-4, "({i},{j}) = {dot}");
            }
        }
    }

    #[test]
    fn test_rms_of_constant() {
        assert!((rms(&[0.5; 64]) - 0.5).abs() < 1e-6);
        assert!(rms(&[]).abs() < f32::EPSILON);
    }
}
