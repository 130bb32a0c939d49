//! Plain-text handler.

use std::sync::Arc;

use async_trait::async_trait;

use crate::classifier::BranchKind;
use crate::error::ChatError;
use crate::gemini::{LanguageModel, Part};
use crate::handler::{BranchHandler, BranchRequest};

/// Sends the user text to the chat model as is.
pub struct TextHandler {
    model: Arc<dyn LanguageModel>,
    model_name: String,
}

impl TextHandler {
    pub fn new(model: Arc<dyn LanguageModel>, model_name: String) -> Self {
        Self { model, model_name }
    }
}

#[async_trait]
impl BranchHandler for TextHandler {
    fn kind(&self) -> BranchKind {
        BranchKind::PlainText
    }

    async fn handle(&self, request: &BranchRequest<'_>) -> Result<String, ChatError> {
        let text = request
            .text
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ChatError::EmptyMessage)?;

        self.model
            .generate(&self.model_name, vec![Part::text(text)])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Branch;
    use crate::testing::MockModel;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_text_forwarded_to_chat_model() {
        let model = Arc::new(MockModel::replying("Hi! How can I help?"));
        let handler = TextHandler::new(model.clone(), "chat-model".to_string());
        let cancel = CancellationToken::new();
        let request = BranchRequest {
            branch: &Branch::PlainText,
            text: Some("hello"),
            upload: None,
            cancel: &cancel,
        };

        let reply = handler.handle(&request).await.unwrap();
        assert_eq!(reply, "Hi! How can I help?");

        let calls = model.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "chat-model");
        assert_eq!(calls[0].1, vec![Part::text("hello")]);
    }

    #[tokio::test]
    async fn test_missing_text_is_error() {
        let model = Arc::new(MockModel::replying("unused"));
        let handler = TextHandler::new(model.clone(), "chat-model".to_string());
        let cancel = CancellationToken::new();

        for text in [None, Some("   ")] {
            let request = BranchRequest {
                branch: &Branch::PlainText,
                text,
                upload: None,
                cancel: &cancel,
            };
            let err = handler.handle(&request).await.unwrap_err();
            assert!(matches!(err, ChatError::EmptyMessage));
        }
        assert!(model.calls().is_empty());
    }

    #[tokio::test]
    async fn test_model_failure_propagates() {
        let handler = TextHandler::new(
            Arc::new(MockModel::failing("quota exceeded")),
            "chat-model".to_string(),
        );
        let cancel = CancellationToken::new();
        let request = BranchRequest {
            branch: &Branch::PlainText,
            text: Some("hello"),
            upload: None,
            cancel: &cancel,
        };
        let err = handler.handle(&request).await.unwrap_err();
        assert_eq!(err.to_string(), "model error: quota exceeded");
    }
}
