//! Audio handler: decode, transcribe locally, then respond to the transcript.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use parley_whisper::{decode_audio, TranscriptionService, WHISPER_SAMPLE_RATE};

use crate::classifier::BranchKind;
use crate::error::ChatError;
use crate::gemini::{LanguageModel, Part};
use crate::handler::{BranchHandler, BranchRequest};

pub struct AudioHandler<T> {
    transcriber: Arc<T>,
    model: Arc<dyn LanguageModel>,
    model_name: String,
}

impl<T: TranscriptionService> AudioHandler<T> {
    pub fn new(transcriber: Arc<T>, model: Arc<dyn LanguageModel>, model_name: String) -> Self {
        Self {
            transcriber,
            model,
            model_name,
        }
    }
}

#[async_trait]
impl<T> BranchHandler for AudioHandler<T>
where
    T: TranscriptionService + 'static,
{
    fn kind(&self) -> BranchKind {
        BranchKind::Audio
    }

    async fn handle(&self, request: &BranchRequest<'_>) -> Result<String, ChatError> {
        let upload = request.require_upload()?;
        let bytes = upload.bytes.clone();
        let extension = upload.extension();

        let samples = tokio::task::spawn_blocking(move || {
            decode_audio(bytes, extension.as_deref()).map(|audio| audio.to_whisper_input())
        })
        .await
        .map_err(|e| ChatError::Transcription(format!("audio decoding aborted: {}", e)))??;

        let result = self
            .transcriber
            .transcribe(&samples, WHISPER_SAMPLE_RATE)
            .await?;
        let transcript = result.text.trim();
        if transcript.is_empty() {
            return Err(ChatError::Transcription(
                "no speech was recognized in the recording".to_string(),
            ));
        }
        info!(
            file = %upload.file_name,
            duration_secs = result.duration_secs,
            "Transcribed audio upload"
        );

        let prompt = format!("Summarize or respond to this transcript:\n{}", transcript);
        self.model
            .generate(&self.model_name, vec![Part::Text(prompt)])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Branch;
    use crate::testing::{wav_bytes, MockModel};
    use parley_core::types::Upload;
    use parley_whisper::MockTranscriptionService;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_transcript_sent_to_model() {
        let model = Arc::new(MockModel::replying("They asked about lunch."));
        let handler = AudioHandler::new(
            Arc::new(MockTranscriptionService::with_text("what is for lunch")),
            model.clone(),
            "chat-model".to_string(),
        );
        let cancel = CancellationToken::new();
        let upload = Upload::new("memo.wav", "audio/wav", wav_bytes(0.5));
        let request = BranchRequest {
            branch: &Branch::Audio,
            text: None,
            upload: Some(&upload),
            cancel: &cancel,
        };

        let reply = handler.handle(&request).await.unwrap();
        assert_eq!(reply, "They asked about lunch.");
        assert_eq!(
            model.last_prompt_text(),
            vec!["Summarize or respond to this transcript:\nwhat is for lunch".to_string()]
        );
    }

    #[tokio::test]
    async fn test_undecodable_audio_is_transcription_error() {
        let model = Arc::new(MockModel::replying("unused"));
        let handler = AudioHandler::new(
            Arc::new(MockTranscriptionService::new()),
            model.clone(),
            "chat-model".to_string(),
        );
        let cancel = CancellationToken::new();
        let upload = Upload::new("memo.mp3", "audio/mpeg", b"definitely not audio".to_vec());
        let request = BranchRequest {
            branch: &Branch::Audio,
            text: None,
            upload: Some(&upload),
            cancel: &cancel,
        };

        let err = handler.handle(&request).await.unwrap_err();
        assert!(matches!(err, ChatError::Transcription(_)));
        assert!(model.calls().is_empty());
    }

    #[tokio::test]
    async fn test_blank_transcript_rejected() {
        let handler = AudioHandler::new(
            Arc::new(MockTranscriptionService::with_text("  ")),
            Arc::new(MockModel::replying("unused")),
            "chat-model".to_string(),
        );
        let cancel = CancellationToken::new();
        let upload = Upload::new("silence.wav", "audio/wav", wav_bytes(0.2));
        let request = BranchRequest {
            branch: &Branch::Audio,
            text: None,
            upload: Some(&upload),
            cancel: &cancel,
        };
        let err = handler.handle(&request).await.unwrap_err();
        assert!(err.to_string().contains("no speech"));
    }
}
