//! YouTube link handler: caption transcript, then a summary.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::classifier::{youtube_video_id, Branch, BranchKind};
use crate::error::ChatError;
use crate::gemini::{LanguageModel, Part};
use crate::handler::{BranchHandler, BranchRequest};
use crate::youtube::{join_segments, TranscriptSource};

pub struct YoutubeHandler {
    transcripts: Arc<dyn TranscriptSource>,
    model: Arc<dyn LanguageModel>,
    model_name: String,
}

impl YoutubeHandler {
    pub fn new(
        transcripts: Arc<dyn TranscriptSource>,
        model: Arc<dyn LanguageModel>,
        model_name: String,
    ) -> Self {
        Self {
            transcripts,
            model,
            model_name,
        }
    }
}

#[async_trait]
impl BranchHandler for YoutubeHandler {
    fn kind(&self) -> BranchKind {
        BranchKind::YoutubeLink
    }

    async fn handle(&self, request: &BranchRequest<'_>) -> Result<String, ChatError> {
        let video_id = match request.branch {
            Branch::YoutubeLink { video_id } => video_id.clone(),
            _ => request
                .text
                .and_then(youtube_video_id)
                .ok_or_else(|| ChatError::Transcript("no YouTube video id in message".to_string()))?,
        };

        let segments = self.transcripts.fetch(&video_id).await?;
        info!(video_id = %video_id, segments = segments.len(), "Fetched YouTube transcript");

        let prompt = format!(
            "Summarize and explain this YouTube video:\n{}",
            join_segments(&segments)
        );
        self.model
            .generate(&self.model_name, vec![Part::Text(prompt)])
            .await
    }
}
