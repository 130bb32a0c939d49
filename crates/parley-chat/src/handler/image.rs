//! Image handler.

use std::sync::Arc;

use async_trait::async_trait;

use crate::classifier::BranchKind;
use crate::error::ChatError;
use crate::gemini::{LanguageModel, Part};
use crate::handler::{BranchHandler, BranchRequest};

const DEFAULT_IMAGE_PROMPT: &str = "Describe this image";

/// Sends the user text (or a default prompt) and the image inline to the
/// vision model.
pub struct ImageHandler {
    model: Arc<dyn LanguageModel>,
    model_name: String,
}

impl ImageHandler {
    pub fn new(model: Arc<dyn LanguageModel>, model_name: String) -> Self {
        Self { model, model_name }
    }
}

#[async_trait]
impl BranchHandler for ImageHandler {
    fn kind(&self) -> BranchKind {
        BranchKind::Image
    }

    async fn handle(&self, request: &BranchRequest<'_>) -> Result<String, ChatError> {
        let upload = request.require_upload()?;
        let prompt = request
            .text
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_IMAGE_PROMPT);

        let parts = vec![
            Part::text(prompt),
            Part::InlineData {
                mime_type: upload.media_type.clone(),
                data: upload.bytes.clone(),
            },
        ];
        self.model.generate(&self.model_name, parts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Branch;
    use crate::testing::MockModel;
    use parley_core::types::Upload;
    use tokio_util::sync::CancellationToken;

    async fn run(text: Option<&str>) -> Vec<Part> {
        let model = Arc::new(MockModel::replying("A cat on a sofa."));
        let handler = ImageHandler::new(model.clone(), "vision-model".to_string());
        let cancel = CancellationToken::new();
        let upload = Upload::new("cat.png", "image/png", vec![0x89, 0x50, 0x4e, 0x47]);
        let request = BranchRequest {
            branch: &Branch::Image,
            text,
            upload: Some(&upload),
            cancel: &cancel,
        };

        assert_eq!(handler.handle(&request).await.unwrap(), "A cat on a sofa.");
        let calls = model.calls();
        assert_eq!(calls[0].0, "vision-model");
        calls[0].1.clone()
    }

    #[tokio::test]
    async fn test_default_prompt_when_no_text() {
        let parts = run(None).await;
        assert_eq!(parts[0], Part::text("Describe this image"));
        assert_eq!(
            parts[1],
            Part::InlineData {
                mime_type: "image/png".to_string(),
                data: vec![0x89, 0x50, 0x4e, 0x47],
            }
        );
    }

    #[tokio::test]
    async fn test_user_text_used_as_prompt() {
        let parts = run(Some("What breed is this?")).await;
        assert_eq!(parts[0], Part::text("What breed is this?"));
        assert_eq!(parts.len(), 2);
    }
}
