//! Parley Whisper crate - audio decoding and speech-to-text transcription.
//!
//! Provides a trait-based abstraction for transcription, a whisper.cpp
//! implementation behind the `whisper` feature, a mock for tests and
//! model-less deployments, and decoding of uploaded audio files into the
//! 16 kHz mono PCM the model expects.

use std::future::Future;

use parley_core::error::ParleyError;

pub mod decode;
pub mod whisper_service;

pub use decode::{decode_audio, resample, DecodedAudio, WHISPER_SAMPLE_RATE};
pub use whisper_service::WhisperService;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the Whisper transcription engine.
#[derive(Debug, Clone)]
pub struct WhisperConfig {
    /// Path to the GGML model file.
    pub model_path: String,
    /// Language code for transcription (e.g., "en", "auto").
    pub language: String,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            model_path: String::new(),
            language: "en".to_string(),
        }
    }
}

impl From<&parley_core::config::TranscriptionConfig> for WhisperConfig {
    fn from(config: &parley_core::config::TranscriptionConfig) -> Self {
        Self {
            model_path: config.model_path.clone(),
            language: config.language.clone(),
        }
    }
}

// =============================================================================
// Result types
// =============================================================================

/// A single time-aligned segment within a transcription.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Start time in seconds from the beginning of the audio.
    pub start: f32,
    /// End time in seconds from the beginning of the audio.
    pub end: f32,
    pub text: String,
}

/// The complete result of a transcription operation.
#[derive(Debug, Clone)]
pub struct TranscriptionResult {
    /// Full transcribed text.
    pub text: String,
    pub segments: Vec<Segment>,
    /// Detected or specified language.
    pub language: String,
    /// Total audio duration in seconds.
    pub duration_secs: f32,
}

// =============================================================================
// Trait
// =============================================================================

/// Service for transcribing audio data to text.
pub trait TranscriptionService: Send + Sync {
    /// Transcribe PCM samples in [-1.0, 1.0] recorded at `sample_rate` Hz.
    fn transcribe(
        &self,
        audio_data: &[f32],
        sample_rate: u32,
    ) -> impl Future<Output = Result<TranscriptionResult, ParleyError>> + Send;
}

// =============================================================================
// Mock implementation
// =============================================================================

/// Transcription service that returns a fixed transcript.
///
/// Used in tests and when no model file is configured.
#[derive(Debug, Clone)]
pub struct MockTranscriptionService {
    text: String,
}

impl Default for MockTranscriptionService {
    fn default() -> Self {
        Self {
            text: "[mock transcription]".to_string(),
        }
    }
}

impl MockTranscriptionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock that always answers with `text`.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl TranscriptionService for MockTranscriptionService {
    async fn transcribe(
        &self,
        audio_data: &[f32],
        sample_rate: u32,
    ) -> Result<TranscriptionResult, ParleyError> {
        if audio_data.is_empty() {
            return Err(ParleyError::Transcription(
                "Cannot transcribe empty audio data".to_string(),
            ));
        }

        if sample_rate == 0 {
            return Err(ParleyError::Transcription(
                "Sample rate must be greater than 0".to_string(),
            ));
        }

        let duration_secs = audio_data.len() as f32 / sample_rate as f32;

        tracing::debug!(duration_secs, sample_rate, "Mock transcription generated");

        Ok(TranscriptionResult {
            text: self.text.clone(),
            segments: vec![Segment {
                start: 0.0,
                end: duration_secs,
                text: self.text.clone(),
            }],
            language: "en".to_string(),
            duration_secs,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_transcription_basic() {
        let service = MockTranscriptionService::new();
        let audio = vec![0.0f32; 16000];
        let result = service.transcribe(&audio, 16000).await.unwrap();

        assert_eq!(result.text, "[mock transcription]");
        assert_eq!(result.language, "en");
        assert!((result.duration_secs - 1.0).abs() < 0.01);
        assert_eq!(result.segments.len(), 1);
    }

    #[tokio::test]
    async fn test_mock_transcription_custom_text() {
        let service = MockTranscriptionService::with_text("hello there");
        let result = service.transcribe(&[0.1; 800], 8000).await.unwrap();
        assert_eq!(result.text, "hello there");
        assert!((result.segments[0].end - 0.1).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_mock_transcription_empty_audio() {
        let service = MockTranscriptionService::new();
        let result = service.transcribe(&[], 16000).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_mock_transcription_zero_sample_rate() {
        let service = MockTranscriptionService::new();
        let result = service.transcribe(&[0.0; 100], 0).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_whisper_config_from_core_config() {
        let core = parley_core::config::TranscriptionConfig {
            model_path: "/models/ggml-base.bin".to_string(),
            language: "auto".to_string(),
            ..Default::default()
        };
        let config = WhisperConfig::from(&core);
        assert_eq!(config.model_path, "/models/ggml-base.bin");
        assert_eq!(config.language, "auto");
    }
}
