//! Cross-sample aggregation of feature bundles

use super::VoiceEmbedding;
use crate::features::{FeatureBundle, N_MFCC};

/// Aggregate feature bundles into a single embedding
///
/// Each bundle is first reduced over its time axis (cepstral means, energy
/// and centroid means); the per-sample summaries are then averaged with
/// equal weight. Returns `None` for an empty slice.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn aggregate(bundles: &[FeatureBundle]) -> Option<VoiceEmbedding> {
    if bundles.is_empty() {
        return None;
    }

    let mut cepstral = [0.0_f64; N_MFCC];
    let mut pitch = 0.0_f64;
    let mut range = 0.0_f64;
    let mut tempo = 0.0_f64;
    let mut energy = 0.0_f64;
    let mut centroid = 0.0_f64;
    let mut total_duration = 0.0_f64;

    for bundle in bundles {
        for (acc, value) in cepstral.iter_mut().zip(bundle.mfcc_mean()) {
            *acc += f64::from(value);
        }
        pitch += f64::from(bundle.avg_pitch);
        range += f64::from(bundle.pitch_range);
        tempo += f64::from(bundle.tempo);
        energy += f64::from(bundle.energy_mean());
        centroid += f64::from(bundle.centroid_mean());
        total_duration += f64::from(bundle.duration);
    }

    let n = bundles.len() as f64;
    let avg = |sum: f64| (sum / n) as f32;

    Some(VoiceEmbedding {
        cepstral_mean: cepstral.iter().map(|&sum| avg(sum)).collect(),
        avg_pitch: avg(pitch),
        pitch_range: avg(range),
        tempo: avg(tempo),
        energy_mean: avg(energy),
        spectral_centroid_mean: avg(centroid),
        total_duration: total_duration as f32,
        sample_count: bundles.len(),
    })
}
