//! Frame-wise pitch tracking by normalized autocorrelation

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// Lowest pitch searched (Hz)
pub const PITCH_MIN_HZ: f32 = 60.0;

/// Highest pitch searched (Hz)
pub const PITCH_MAX_HZ: f32 = 1000.0;

/// A local peak must reach this fraction of the strongest peak to be chosen
const PEAK_RATIO: f32 = 0.9;

/// Frames with less total energy than this are treated as unvoiced
const SILENCE_ENERGY: f32 = 1e-10;

/// Pitch estimate for one analysis frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchFrame {
    /// Fundamental frequency in Hz (0 when unvoiced)
    pub frequency: f32,

    /// Normalized autocorrelation at the chosen lag, in `[0, 1]`
    pub confidence: f32,
}

impl PitchFrame {
    const UNVOICED: Self = Self {
        frequency: 0.0,
        confidence: 0.0,
    };
}

/// Autocorrelation pitch tracker for fixed-length frames
pub(crate) struct PitchTracker {
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    fft_len: usize,
    min_lag: usize,
    max_lag: usize,
    sample_rate: f32,
}

impl PitchTracker {
    /// Create a tracker for frames of `frame_len` samples at `sample_rate`
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub(crate) fn new(frame_len: usize, sample_rate: u32) -> Self {
        let fft_len = (2 * frame_len).next_power_of_two();
        let mut planner = FftPlanner::<f32>::new();
        let sample_rate = sample_rate as f32;

        let min_lag = ((sample_rate / PITCH_MAX_HZ).floor() as usize).max(2);
        let max_lag = ((sample_rate / PITCH_MIN_HZ).ceil() as usize).min(frame_len.saturating_sub(2));

        Self {
            forward: planner.plan_fft_forward(fft_len),
            inverse: planner.plan_fft_inverse(fft_len),
            fft_len,
            min_lag,
            max_lag,
            sample_rate,
        }
    }

    /// Estimate the pitch of one frame
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn track(&self, frame: &[f32]) -> PitchFrame {
        let n = frame.len();
        if self.min_lag >= self.max_lag || n <= self.max_lag + 1 {
            return PitchFrame::UNVOICED;
        }

        // Prefix sums of squared samples give the energy of any window
        let mut cumulative = Vec::with_capacity(n + 1);
        cumulative.push(0.0_f32);
        for &s in frame {
            let last = cumulative[cumulative.len() - 1];
            cumulative.push(last + s * s);
        }
        if cumulative[n] < SILENCE_ENERGY {
            return PitchFrame::UNVOICED;
        }

        let raw = self.autocorrelate(frame);
        let normalized = |lag: usize| {
            let head = cumulative[n - lag];
            let tail = cumulative[n] - cumulative[lag];
            let denom = (head * tail).sqrt();
            if denom <= f32::EPSILON {
                0.0
            } else {
                raw[lag] / denom
            }
        };

        let r: Vec<f32> = (self.min_lag - 1..=self.max_lag + 1).map(normalized).collect();
        let at = |lag: usize| r[lag + 1 - self.min_lag];

        let peaks: Vec<usize> = (self.min_lag..=self.max_lag)
            .filter(|&lag| at(lag) > at(lag - 1) && at(lag) >= at(lag + 1))
            .collect();
        let best = peaks.iter().map(|&lag| at(lag)).fold(0.0_f32, f32::max);
        if best <= 0.0 {
            return PitchFrame::UNVOICED;
        }

        let Some(&lag) = peaks.iter().find(|&&lag| at(lag) >= PEAK_RATIO * best) else {
            return PitchFrame::UNVOICED;
        };

        // Parabolic interpolation around the chosen lag
        let (prev, curr, next) = (at(lag - 1), at(lag), at(lag + 1));
        let curvature = prev - 2.0 * curr + next;
        let offset = if curvature.abs() > f32::EPSILON {
            (0.5 * (prev - next) / curvature).clamp(-0.5, 0.5)
        } else {
            0.0
        };

        PitchFrame {
            frequency: self.sample_rate / (lag as f32 + offset),
            confidence: curr.clamp(0.0, 1.0),
        }
    }

    /// Raw (unnormalized) autocorrelation via zero-padded FFT
    #[allow(clippy::cast_precision_loss)]
    fn autocorrelate(&self, frame: &[f32]) -> Vec<f32> {
        let mut buffer = vec![Complex::new(0.0_f32, 0.0); self.fft_len];
        for (slot, &s) in buffer.iter_mut().zip(frame) {
            *slot = Complex::new(s, 0.0);
        }

        self.forward.process(&mut buffer);
        for c in &mut buffer {
            *c = Complex::new(c.norm_sqr(), 0.0);
        }
        self.inverse.process(&mut buffer);

        let scale = self.fft_len as f32;
        buffer[..frame.len()].iter().map(|c| c.re / scale).collect()
    }
}

/// Average pitch and pitch range over confidently voiced frames
///
/// Only frames whose confidence is strictly above the clip's median
/// confidence contribute. Returns `(0.0, 0.0)` when no frame qualifies.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn summarize(frames: &[PitchFrame]) -> (f32, f32) {
    if frames.is_empty() {
        return (0.0, 0.0);
    }

    let threshold = median(frames.iter().map(|f| f.confidence).collect());
    let voiced: Vec<f32> = frames
        .iter()
        .filter(|f| f.confidence > threshold && f.frequency > 0.0)
        .map(|f| f.frequency)
        .collect();

    if voiced.is_empty() {
        return (0.0, 0.0);
    }

    let sum: f64 = voiced.iter().map(|&f| f64::from(f)).sum();
    #[allow(clippy::cast_possible_truncation)]
    let avg = (sum / voiced.len() as f64) as f32;
    let (min, max) = voiced
        .iter()
        .fold((f32::MAX, f32::MIN), |(lo, hi), &f| (lo.min(f), hi.max(f)));

    (avg, max - min)
}

/// Median with the two middle values averaged for even lengths
fn median(mut values: Vec<f32>) -> f32 {
    values.sort_by(f32::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        f32::midpoint(values[mid - 1], values[mid])
    } else {
        values[mid]
    }
}
