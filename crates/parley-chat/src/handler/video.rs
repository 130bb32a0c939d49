//! Video handler.
//!
//! The video is uploaded to the model's file store, which processes it
//! asynchronously. The handler polls until the file leaves the processing
//! state, bounded by a deadline and the turn's cancellation token, and then
//! asks the video model for a summary.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::classifier::BranchKind;
use crate::error::ChatError;
use crate::gemini::{FileState, FileStore, LanguageModel, Part, RemoteFile};
use crate::handler::{BranchHandler, BranchRequest, VideoPolling};

const VIDEO_PROMPT: &str = "Summarize this uploaded video";

pub struct VideoHandler {
    files: Arc<dyn FileStore>,
    model: Arc<dyn LanguageModel>,
    model_name: String,
    polling: VideoPolling,
}

impl VideoHandler {
    pub fn new(
        files: Arc<dyn FileStore>,
        model: Arc<dyn LanguageModel>,
        model_name: String,
        polling: VideoPolling,
    ) -> Self {
        Self {
            files,
            model,
            model_name,
            polling,
        }
    }
}

/// Poll `file` until it is no longer processing.
///
/// Returns [`ChatError::Timeout`] once `timeout` has elapsed and
/// [`ChatError::Cancelled`] as soon as `cancel` fires.
pub async fn wait_until_active(
    files: &dyn FileStore,
    mut file: RemoteFile,
    poll_interval: Duration,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<RemoteFile, ChatError> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match file.state {
            FileState::Processing => {}
            FileState::Failed => {
                return Err(ChatError::Model(format!(
                    "remote processing of {} failed",
                    file.name
                )));
            }
            FileState::Active | FileState::Unspecified => return Ok(file),
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(ChatError::Cancelled),
            _ = tokio::time::sleep_until(deadline) => {
                return Err(ChatError::Timeout(timeout.as_secs()));
            }
            _ = tokio::time::sleep(poll_interval) => {}
        }

        debug!(file = %file.name, "Polling remote file state");
        file = files.get(&file.name).await?;
    }
}

#[async_trait]
impl BranchHandler for VideoHandler {
    fn kind(&self) -> BranchKind {
        BranchKind::Video
    }

    async fn handle(&self, request: &BranchRequest<'_>) -> Result<String, ChatError> {
        let upload = request.require_upload()?;
        let uploaded = self
            .files
            .upload(&upload.file_name, &upload.media_type, upload.bytes.clone())
            .await?;
        info!(file = %uploaded.name, "Uploaded video for processing");

        let file = wait_until_active(
            self.files.as_ref(),
            uploaded,
            self.polling.interval,
            self.polling.timeout,
            request.cancel,
        )
        .await?;

        let mime_type = if file.mime_type.is_empty() {
            upload.media_type.clone()
        } else {
            file.mime_type.clone()
        };
        let parts = vec![
            Part::FileData {
                mime_type,
                file_uri: file.uri,
            },
            Part::text(VIDEO_PROMPT),
        ];
        self.model.generate(&self.model_name, parts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Branch;
    use crate::testing::{MockFileStore, MockModel};
    use parley_core::types::Upload;

    fn polling(interval_ms: u64, timeout_ms: u64) -> VideoPolling {
        VideoPolling {
            interval: Duration::from_millis(interval_ms),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    fn clip() -> Upload {
        Upload::new("clip.mp4", "video/mp4", vec![0u8; 16])
    }

    #[tokio::test]
    async fn test_polls_until_active_then_summarizes() {
        let files = Arc::new(MockFileStore::with_states(&[
            FileState::Processing,
            FileState::Processing,
            FileState::Active,
        ]));
        let model = Arc::new(MockModel::replying("A short clip of a beach."));
        let handler = VideoHandler::new(
            files.clone(),
            model.clone(),
            "video-model".to_string(),
            polling(5, 2_000),
        );
        let cancel = CancellationToken::new();
        let upload = clip();
        let request = BranchRequest {
            branch: &Branch::Video,
            text: None,
            upload: Some(&upload),
            cancel: &cancel,
        };

        let reply = handler.handle(&request).await.unwrap();
        assert_eq!(reply, "A short clip of a beach.");
        assert_eq!(files.get_count(), 2);

        let calls = model.calls();
        assert_eq!(calls[0].0, "video-model");
        assert_eq!(
            calls[0].1,
            vec![
                Part::FileData {
                    mime_type: "video/mp4".to_string(),
                    file_uri: "https://files.example/mock".to_string(),
                },
                Part::text("Summarize this uploaded video"),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_processing_is_error() {
        let files = Arc::new(MockFileStore::with_states(&[
            FileState::Processing,
            FileState::Failed,
        ]));
        let model = Arc::new(MockModel::replying("unused"));
        let handler =
            VideoHandler::new(files, model.clone(), "video-model".to_string(), polling(5, 2_000));
        let cancel = CancellationToken::new();
        let upload = clip();
        let request = BranchRequest {
            branch: &Branch::Video,
            text: None,
            upload: Some(&upload),
            cancel: &cancel,
        };

        let err = handler.handle(&request).await.unwrap_err();
        assert!(err.to_string().contains("failed"));
        assert!(model.calls().is_empty());
    }

    #[tokio::test]
    async fn test_poll_times_out() {
        let files = MockFileStore::with_states(&[FileState::Processing]);
        let cancel = CancellationToken::new();
        let file = files.upload("clip.mp4", "video/mp4", vec![]).await.unwrap();

        let err = wait_until_active(
            &files,
            file,
            Duration::from_millis(10),
            Duration::from_millis(50),
            &cancel,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ChatError::Timeout(_)));
        assert!(files.get_count() >= 1);
    }

    #[tokio::test]
    async fn test_poll_honours_cancellation() {
        let files = MockFileStore::with_states(&[FileState::Processing]);
        let cancel = CancellationToken::new();
        let file = files.upload("clip.mp4", "video/mp4", vec![]).await.unwrap();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = wait_until_active(
            &files,
            file,
            Duration::from_millis(10),
            Duration::from_secs(30),
            &cancel,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ChatError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_unspecified_state_proceeds() {
        let files = MockFileStore::with_states(&[FileState::Unspecified]);
        let cancel = CancellationToken::new();
        let file = files.upload("clip.mp4", "video/mp4", vec![]).await.unwrap();
        let ready = wait_until_active(
            &files,
            file,
            Duration::from_millis(10),
            Duration::from_millis(50),
            &cancel,
        )
        .await
        .unwrap();
        assert_eq!(ready.state, FileState::Unspecified);
        assert_eq!(files.get_count(), 0);
    }
}
