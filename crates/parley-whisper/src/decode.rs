//! Decoding of uploaded audio files into mono PCM.
//!
//! Uploads arrive as encoded files (mp3, wav). symphonia probes the container,
//! decodes every packet of the first audio track and the channels are averaged
//! down to mono. [`DecodedAudio::to_whisper_input`] resamples to the 16 kHz
//! rate Whisper models are trained on.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use parley_core::error::ParleyError;

/// Sample rate expected by Whisper models.
pub const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// Mono PCM samples in [-1.0, 1.0].
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Resample to [`WHISPER_SAMPLE_RATE`].
    pub fn to_whisper_input(&self) -> Vec<f32> {
        resample(&self.samples, self.sample_rate, WHISPER_SAMPLE_RATE)
    }
}

fn decode_err(context: &str, err: impl std::fmt::Display) -> ParleyError {
    ParleyError::Transcription(format!("{}: {}", context, err))
}

/// Decode an encoded audio file held in memory.
///
/// `extension` is a probe hint only; the container is detected from content.
pub fn decode_audio(bytes: Vec<u8>, extension: Option<&str>) -> Result<DecodedAudio, ParleyError> {
    if bytes.is_empty() {
        return Err(ParleyError::Transcription(
            "Cannot decode empty audio file".to_string(),
        ));
    }

    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| decode_err("Unsupported audio format", e))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| ParleyError::Transcription("No audio track found".to_string()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| ParleyError::Transcription("Audio track has no sample rate".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| decode_err("Unsupported audio codec", e))?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(decode_err("Failed to read audio packet", e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::debug!(error = %e, "Skipping corrupt audio packet");
                continue;
            }
            Err(e) => return Err(decode_err("Failed to decode audio", e)),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count().max(1);
        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);

        samples.extend(
            buffer
                .samples()
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32),
        );
    }

    if samples.is_empty() {
        return Err(ParleyError::Transcription(
            "Audio file contains no samples".to_string(),
        ));
    }

    tracing::debug!(
        samples = samples.len(),
        sample_rate,
        "Audio decoded to mono PCM"
    );

    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}

/// Simple linear resampling from one sample rate to another.
///
/// Linear interpolation is sufficient for speech destined for Whisper.
pub fn resample(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || input.is_empty() || from_rate == 0 || to_rate == 0 {
        return input.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (input.len() as f64 / ratio).ceil() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_idx = i as f64 * ratio;
        let idx0 = (src_idx.floor() as usize).min(input.len() - 1);
        let idx1 = (idx0 + 1).min(input.len() - 1);
        let frac = (src_idx - idx0 as f64) as f32;

        output.push(input[idx0] * (1.0 - frac) + input[idx1] * frac);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(sample_rate: u32, channels: u16, frames: usize) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..frames {
                let value = ((i as f32 * 0.05).sin() * 8000.0) as i16;
                for _ in 0..channels {
                    writer.write_sample(value).unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_decode_mono_wav() {
        let audio = decode_audio(wav_bytes(16_000, 1, 16_000), Some("wav")).unwrap();
        assert_eq!(audio.sample_rate, 16_000);
        assert_eq!(audio.samples.len(), 16_000);
        assert!((audio.duration_secs() - 1.0).abs() < 0.01);
        assert!(audio.samples.iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    #[test]
    fn test_decode_stereo_wav_downmixes() {
        let audio = decode_audio(wav_bytes(8_000, 2, 4_000), None).unwrap();
        assert_eq!(audio.sample_rate, 8_000);
        assert_eq!(audio.samples.len(), 4_000);
    }

    #[test]
    fn test_decode_empty_input_fails() {
        let err = decode_audio(Vec::new(), Some("mp3")).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_decode_garbage_fails() {
        let result = decode_audio(b"definitely not audio".to_vec(), Some("wav"));
        assert!(result.is_err());
    }

    #[test]
    fn test_to_whisper_input_upsamples() {
        let audio = decode_audio(wav_bytes(8_000, 1, 8_000), Some("wav")).unwrap();
        let resampled = audio.to_whisper_input();
        assert_eq!(resampled.len(), 16_000);
    }

    #[test]
    fn test_resample_identity() {
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(resample(&input, 16_000, 16_000), input);
    }

    #[test]
    fn test_resample_downsample_halves_length() {
        let input = vec![0.5f32; 48_000];
        let output = resample(&input, 48_000, 16_000);
        assert_eq!(output.len(), 16_000);
        assert!(output.iter().all(|s| (s - 0.5).abs() < f32::EPSILON));
    }

    #[test]
    fn test_resample_empty() {
        assert!(resample(&[], 44_100, 16_000).is_empty());
    }
}
