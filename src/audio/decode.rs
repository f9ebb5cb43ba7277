//! Container sniffing and decoding to mono PCM

use std::io::Cursor;

use super::SampleSource;
use crate::{Error, Result};

/// Decoded audio, downmixed to mono at its native rate
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Mono samples
    pub samples: Vec<f32>,

    /// Native sample rate
    pub sample_rate: u32,

    /// Channel count of the source before downmixing
    pub source_channels: u16,
}

/// Decode a sample source without resampling or normalization
///
/// Multi-channel audio is downmixed by averaging all channels.
///
/// # Errors
///
/// Returns `UnsupportedFormat` if the container is not recognized or cannot
/// be parsed, and `Io` if a path cannot be read
pub fn decode(source: &SampleSource) -> Result<DecodedAudio> {
    let label = source.label();
    match source {
        SampleSource::Path(path) => {
            let data = std::fs::read(path)?;
            decode_bytes(&label, &data)
        }
        SampleSource::Bytes { data, .. } => decode_bytes(&label, data),
        SampleSource::Pcm {
            samples,
            channels,
            sample_rate,
            ..
        } => decode_pcm(&label, samples, *channels, *sample_rate),
    }
}

fn decode_bytes(label: &str, data: &[u8]) -> Result<DecodedAudio> {
    if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WAVE" {
        decode_wav(label, data)
    } else if looks_like_mp3(data) {
        decode_mp3(label, data)
    } else {
        Err(unsupported(label, "unrecognized container"))
    }
}

fn decode_pcm(label: &str, samples: &[f32], channels: u16, sample_rate: u32) -> Result<DecodedAudio> {
    if channels == 0 {
        return Err(unsupported(label, "declared zero channels"));
    }
    if sample_rate == 0 {
        return Err(unsupported(label, "declared zero sample rate"));
    }
    if samples.len() % usize::from(channels) != 0 {
        return Err(unsupported(
            label,
            "sample count is not a multiple of the channel count",
        ));
    }

    Ok(DecodedAudio {
        samples: downmix(samples, channels),
        sample_rate,
        source_channels: channels,
    })
}

/// Decode RIFF/WAVE bytes using hound
fn decode_wav(label: &str, data: &[u8]) -> Result<DecodedAudio> {
    let mut reader =
        hound::WavReader::new(Cursor::new(data)).map_err(|e| unsupported(label, &e.to_string()))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| unsupported(label, &e.to_string()))?,
        hound::SampleFormat::Int => {
            let scale = f32::powi(2.0, i32::from(spec.bits_per_sample) - 1);
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| int_to_f32(v, scale)))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| unsupported(label, &e.to_string()))?
        }
    };

    tracing::debug!(
        sample = label,
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        bits = spec.bits_per_sample,
        "decoded wav"
    );

    decode_pcm(label, &interleaved, spec.channels, spec.sample_rate)
}

/// Decode MP3 bytes using minimp3
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn decode_mp3(label: &str, data: &[u8]) -> Result<DecodedAudio> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(data));
    let mut samples: Vec<f32> = Vec::new();
    let mut sample_rate = 0_u32;
    let mut source_channels = 0_u16;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if frame.channels == 0 {
                    continue;
                }
                sample_rate = frame.sample_rate as u32;
                source_channels = frame.channels as u16;

                for chunk in frame.data.chunks(frame.channels) {
                    let sum: f32 = chunk.iter().map(|&s| f32::from(s) / 32768.0).sum();
                    samples.push(sum / chunk.len() as f32);
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(unsupported(label, &format!("MP3 decode error: {e}"))),
        }
    }

    if samples.is_empty() || sample_rate == 0 {
        return Err(unsupported(label, "no MP3 frames found"));
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
        source_channels,
    })
}

/// Average interleaved channels into one
#[allow(clippy::cast_precision_loss)]
fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels == 1 {
        return samples.to_vec();
    }

    let channels = usize::from(channels);
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn int_to_f32(value: i32, scale: f32) -> f32 {
    value as f32 / scale
}

fn looks_like_mp3(data: &[u8]) -> bool {
    data.starts_with(b"ID3") || (data.len() >= 2 && data[0] == 0xFF && data[1] & 0xE0 == 0xE0)
}

fn unsupported(label: &str, reason: &str) -> Error {
    Error::UnsupportedFormat {
        sample: label.to_string(),
        reason: reason.to_string(),
    }
}
