//! Whisper transcription service via whisper-rs (whisper.cpp bindings).
//!
//! When compiled with the `whisper` feature, loads a GGML model file once and
//! runs inference on a blocking thread for each request. Without the feature,
//! every transcription fails with a descriptive error.

#[cfg(feature = "whisper")]
use std::path::Path;
#[cfg(feature = "whisper")]
use std::sync::Arc;

use parley_core::error::ParleyError;

#[cfg(feature = "whisper")]
use crate::decode::{resample, WHISPER_SAMPLE_RATE};
#[cfg(feature = "whisper")]
use crate::Segment;
use crate::{TranscriptionResult, TranscriptionService, WhisperConfig};

/// Whisper transcription service backed by whisper.cpp.
///
/// The loaded model context is shared across requests.
pub struct WhisperService {
    #[cfg(feature = "whisper")]
    ctx: Arc<whisper_rs::WhisperContext>,
    config: WhisperConfig,
}

impl WhisperService {
    /// Load a GGML model file.
    ///
    /// # Errors
    /// Returns `ParleyError::Transcription` if the model file doesn't exist
    /// or fails to load.
    #[cfg(feature = "whisper")]
    pub fn new(config: WhisperConfig) -> Result<Self, ParleyError> {
        use whisper_rs::{WhisperContext, WhisperContextParameters};

        let model_path = &config.model_path;
        if !Path::new(model_path).exists() {
            return Err(ParleyError::Transcription(format!(
                "Whisper model file not found: {}",
                model_path
            )));
        }

        tracing::info!(model = %model_path, lang = %config.language, "Loading Whisper model");

        let params = WhisperContextParameters::default();
        let ctx = WhisperContext::new_with_params(model_path, params).map_err(|e| {
            ParleyError::Transcription(format!("Failed to load Whisper model: {}", e))
        })?;

        tracing::info!("Whisper model loaded");
        Ok(Self {
            ctx: Arc::new(ctx),
            config,
        })
    }

    /// Stub constructor when the `whisper` feature is disabled.
    #[cfg(not(feature = "whisper"))]
    pub fn new(config: WhisperConfig) -> Result<Self, ParleyError> {
        tracing::warn!("WhisperService created without `whisper` feature; transcription will fail");
        Ok(Self { config })
    }

    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }
}

// ---------------------------------------------------------------------------
// Real implementation (whisper feature enabled)
// ---------------------------------------------------------------------------

#[cfg(feature = "whisper")]
fn run_inference(
    ctx: &whisper_rs::WhisperContext,
    language: Option<&str>,
    samples: &[f32],
) -> Result<(String, Vec<Segment>), ParleyError> {
    use whisper_rs::{FullParams, SamplingStrategy};

    let mut state = ctx.create_state().map_err(|e| {
        ParleyError::Transcription(format!("Failed to create Whisper state: {}", e))
    })?;

    let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
    params.set_language(language);
    params.set_print_progress(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);
    params.set_single_segment(false);

    state
        .full(params, samples)
        .map_err(|e| ParleyError::Transcription(format!("Whisper inference failed: {}", e)))?;

    let n_segments = state.full_n_segments().map_err(|e| {
        ParleyError::Transcription(format!("Failed to get segment count: {}", e))
    })?;

    let mut segments = Vec::with_capacity(n_segments.max(0) as usize);
    let mut full_text = String::new();

    for i in 0..n_segments {
        let text = state.full_get_segment_text(i).map_err(|e| {
            ParleyError::Transcription(format!("Failed to get segment {} text: {}", i, e))
        })?;
        // Centiseconds.
        let t0 = state.full_get_segment_t0(i).map_err(|e| {
            ParleyError::Transcription(format!("Failed to get segment {} t0: {}", i, e))
        })?;
        let t1 = state.full_get_segment_t1(i).map_err(|e| {
            ParleyError::Transcription(format!("Failed to get segment {} t1: {}", i, e))
        })?;

        if !full_text.is_empty() {
            full_text.push(' ');
        }
        full_text.push_str(text.trim());

        segments.push(Segment {
            start: t0 as f32 / 100.0,
            end: t1 as f32 / 100.0,
            text: text.trim().to_string(),
        });
    }

    Ok((full_text, segments))
}

#[cfg(feature = "whisper")]
impl TranscriptionService for WhisperService {
    async fn transcribe(
        &self,
        audio_data: &[f32],
        sample_rate: u32,
    ) -> Result<TranscriptionResult, ParleyError> {
        if audio_data.is_empty() {
            return Err(ParleyError::Transcription(
                "Cannot transcribe empty audio data".into(),
            ));
        }

        if sample_rate == 0 {
            return Err(ParleyError::Transcription(
                "Sample rate must be greater than 0".into(),
            ));
        }

        let samples_16k = resample(audio_data, sample_rate, WHISPER_SAMPLE_RATE);
        let duration_secs = samples_16k.len() as f32 / WHISPER_SAMPLE_RATE as f32;
        let language = if self.config.language == "auto" {
            None
        } else {
            Some(self.config.language.clone())
        };

        tracing::debug!(samples = samples_16k.len(), duration_secs, "Starting Whisper transcription");

        // whisper.cpp is CPU-bound; keep it off the async workers.
        let ctx = Arc::clone(&self.ctx);
        let lang_for_task = language.clone();
        let (text, segments) = tokio::task::spawn_blocking(move || {
            run_inference(&ctx, lang_for_task.as_deref(), &samples_16k)
        })
        .await
        .map_err(|e| ParleyError::Transcription(format!("Whisper task panicked: {}", e)))??;

        tracing::info!(
            segments = segments.len(),
            text_len = text.len(),
            "Transcription complete"
        );

        Ok(TranscriptionResult {
            text,
            segments,
            language: language.unwrap_or_else(|| "auto".to_string()),
            duration_secs,
        })
    }
}

// ---------------------------------------------------------------------------
// Stub implementation (whisper feature disabled)
// ---------------------------------------------------------------------------

#[cfg(not(feature = "whisper"))]
impl TranscriptionService for WhisperService {
    async fn transcribe(
        &self,
        _audio_data: &[f32],
        _sample_rate: u32,
    ) -> Result<TranscriptionResult, ParleyError> {
        Err(ParleyError::Transcription(
            "Whisper transcription requires the `whisper` feature to be enabled".into(),
        ))
    }
}
