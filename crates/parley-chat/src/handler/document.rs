//! Document handler: extract text, then summarize.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::classifier::{Branch, BranchKind, DocumentFormat};
use crate::document::extract_text;
use crate::error::ChatError;
use crate::gemini::{LanguageModel, Part};
use crate::handler::{BranchHandler, BranchRequest};

pub struct DocumentHandler {
    model: Arc<dyn LanguageModel>,
    model_name: String,
}

impl DocumentHandler {
    pub fn new(model: Arc<dyn LanguageModel>, model_name: String) -> Self {
        Self { model, model_name }
    }
}

#[async_trait]
impl BranchHandler for DocumentHandler {
    fn kind(&self) -> BranchKind {
        BranchKind::DocumentText
    }

    async fn handle(&self, request: &BranchRequest<'_>) -> Result<String, ChatError> {
        let upload = request.require_upload()?;
        let format = match request.branch {
            Branch::DocumentText { format } => *format,
            _ => upload
                .extension()
                .and_then(|ext| DocumentFormat::from_extension(&ext))
                .ok_or_else(|| {
                    ChatError::Document(format!("unsupported document: {}", upload.file_name))
                })?,
        };

        let bytes = upload.bytes.clone();
        let text = tokio::task::spawn_blocking(move || extract_text(format, &bytes))
            .await
            .map_err(|e| ChatError::Document(format!("text extraction aborted: {}", e)))??;
        info!(
            file = %upload.file_name,
            chars = text.chars().count(),
            "Extracted document text"
        );

        let prompt = format!("Summarize this document:\n{}", text);
        self.model
            .generate(&self.model_name, vec![Part::Text(prompt)])
            .await
    }
}
