//! WAV encoding for enrollment staging and synthesis artifacts

use crate::{Error, Result};

/// Encode mono f32 samples as 16-bit PCM WAV bytes
///
/// Samples outside `[-1.0, 1.0]` are clipped.
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| Error::InvalidWaveform(e.to_string()))?;

        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::InvalidWaveform(e.to_string()))?;
        }

        writer
            .finalize()
            .map_err(|e| Error::InvalidWaveform(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
