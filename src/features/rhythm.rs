//! Onset strength and tempo estimation

/// Slowest tempo considered (BPM)
const TEMPO_MIN_BPM: f32 = 30.0;

/// Fastest tempo considered (BPM)
const TEMPO_MAX_BPM: f32 = 300.0;

/// Center of the log-normal tempo prior (BPM)
const TEMPO_PRIOR_BPM: f32 = 120.0;

/// Onset envelopes with less variance than this are treated as flat
const FLAT_VARIANCE: f32 = 1e-6;

/// Spectral flux onset envelope from dB mel frames
///
/// Each value is the mean positive increase across mel bands relative to
/// the previous frame; the first frame has no predecessor and is 0.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn onset_strength(mel_db: &[Vec<f32>]) -> Vec<f32> {
    let mut envelope = Vec::with_capacity(mel_db.len());
    if mel_db.is_empty() {
        return envelope;
    }

    envelope.push(0.0);
    for pair in mel_db.windows(2) {
        let bands = pair[1].len().max(1) as f32;
        let rise: f32 = pair[1]
            .iter()
            .zip(&pair[0])
            .map(|(&now, &before)| (now - before).max(0.0))
            .sum();
        envelope.push(rise / bands);
    }

    envelope
}

/// Estimate tempo in beats per minute from an onset envelope
///
/// Picks the lag maximizing the overlap-normalized autocorrelation of the
/// mean-removed envelope (smoothed over neighbouring lags) weighted by a
/// log-normal prior around 120 BPM. Returns 0 when the envelope is flat or
/// too short to contain one period.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub(crate) fn estimate_tempo(onset: &[f32], frame_rate: f32) -> f32 {
    let n = onset.len();
    if n < 4 || frame_rate <= 0.0 {
        return 0.0;
    }

    let mean = onset.iter().sum::<f32>() / n as f32;
    let centered: Vec<f32> = onset.iter().map(|v| v - mean).collect();
    let variance = centered.iter().map(|v| v * v).sum::<f32>() / n as f32;
    if variance < FLAT_VARIANCE {
        return 0.0;
    }

    let min_lag = ((60.0 * frame_rate / TEMPO_MAX_BPM).floor() as usize).max(1);
    let max_lag = ((60.0 * frame_rate / TEMPO_MIN_BPM).ceil() as usize).min(n - 2);
    if min_lag > max_lag {
        return 0.0;
    }

    let autocorr: Vec<f32> = (0..=max_lag + 1)
        .map(|lag| {
            let sum: f32 = centered[..n - lag]
                .iter()
                .zip(&centered[lag..])
                .map(|(a, b)| a * b)
                .sum();
            sum / (n - lag) as f32
        })
        .collect();

    let mut best: Option<(usize, f32)> = None;
    for lag in min_lag..=max_lag {
        let smoothed = autocorr[lag - 1] + autocorr[lag] + autocorr[lag + 1];
        let score = smoothed * tempo_prior(60.0 * frame_rate / lag as f32);
        if score > 0.0 && best.is_none_or(|(_, s)| score > s) {
            best = Some((lag, score));
        }
    }

    best.map_or(0.0, |(lag, _)| 60.0 * frame_rate / lag as f32)
}

/// Log-normal weight centered on 120 BPM with one octave of spread
fn tempo_prior(bpm: f32) -> f32 {
    let octaves = (bpm / TEMPO_PRIOR_BPM).log2();
    (-0.5 * octaves * octaves).exp()
}
