//! Branch handler registry and trait definition.
//!
//! Each classifier branch has exactly one handler. A handler runs one
//! external pipeline and returns the reply text; failures are returned as
//! [`ChatError`] and recorded by the orchestrator as an error turn.

pub mod audio;
pub mod document;
pub mod image;
pub mod text;
pub mod video;
pub mod youtube;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use parley_core::config::{ModelConfig, VideoConfig};
use parley_core::types::Upload;
use parley_whisper::TranscriptionService;

use crate::classifier::{Branch, BranchKind};
use crate::error::ChatError;
use crate::gemini::{FileStore, LanguageModel};
use crate::youtube::TranscriptSource;

pub use audio::AudioHandler;
pub use document::DocumentHandler;
pub use image::ImageHandler;
pub use text::TextHandler;
pub use video::VideoHandler;
pub use youtube::YoutubeHandler;

/// Everything a handler gets to see of a turn.
#[derive(Debug, Clone, Copy)]
pub struct BranchRequest<'a> {
    pub branch: &'a Branch,
    pub text: Option<&'a str>,
    pub upload: Option<&'a Upload>,
    /// Fires when the turn is cancelled.
    pub cancel: &'a CancellationToken,
}

impl<'a> BranchRequest<'a> {
    pub(crate) fn require_upload(&self) -> Result<&'a Upload, ChatError> {
        self.upload
            .ok_or_else(|| ChatError::MissingUpload(self.branch.kind()))
    }
}

/// Trait implemented by every branch handler.
#[async_trait]
pub trait BranchHandler: Send + Sync {
    /// Which branch this handler serves.
    fn kind(&self) -> BranchKind;

    /// Run the pipeline and return the reply text.
    async fn handle(&self, request: &BranchRequest<'_>) -> Result<String, ChatError>;
}

/// Model names used by the handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelNames {
    pub chat: String,
    pub vision: String,
    pub video: String,
}

impl From<&ModelConfig> for ModelNames {
    fn from(config: &ModelConfig) -> Self {
        Self {
            chat: config.chat_model.clone(),
            vision: config.vision_model.clone(),
            video: config.video_model.clone(),
        }
    }
}

/// Polling bounds for remote video processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoPolling {
    pub interval: Duration,
    pub timeout: Duration,
}

impl From<&VideoConfig> for VideoPolling {
    fn from(config: &VideoConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.poll_interval_ms),
            timeout: Duration::from_secs(config.processing_timeout_secs),
        }
    }
}

/// Collaborators needed to build the default handler set.
pub struct HandlerDeps<T> {
    pub model: Arc<dyn LanguageModel>,
    pub files: Arc<dyn FileStore>,
    pub transcripts: Arc<dyn TranscriptSource>,
    pub transcriber: Arc<T>,
    pub models: ModelNames,
    pub polling: VideoPolling,
}

/// Registry mapping each branch to its handler.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<BranchKind, Arc<dyn BranchHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with one handler per branch.
    pub fn with_defaults<T>(deps: HandlerDeps<T>) -> Self
    where
        T: TranscriptionService + 'static,
    {
        let mut registry = Self::new();
        registry.register(Arc::new(YoutubeHandler::new(
            Arc::clone(&deps.transcripts),
            Arc::clone(&deps.model),
            deps.models.chat.clone(),
        )));
        registry.register(Arc::new(DocumentHandler::new(
            Arc::clone(&deps.model),
            deps.models.chat.clone(),
        )));
        registry.register(Arc::new(ImageHandler::new(
            Arc::clone(&deps.model),
            deps.models.vision.clone(),
        )));
        registry.register(Arc::new(AudioHandler::new(
            Arc::clone(&deps.transcriber),
            Arc::clone(&deps.model),
            deps.models.chat.clone(),
        )));
        registry.register(Arc::new(VideoHandler::new(
            Arc::clone(&deps.files),
            Arc::clone(&deps.model),
            deps.models.video.clone(),
            deps.polling,
        )));
        registry.register(Arc::new(TextHandler::new(
            Arc::clone(&deps.model),
            deps.models.chat,
        )));
        registry
    }

    /// Register a handler, replacing any previous handler for its branch.
    pub fn register(&mut self, handler: Arc<dyn BranchHandler>) {
        self.handlers.insert(handler.kind(), handler);
    }

    pub fn get(&self, kind: BranchKind) -> Option<Arc<dyn BranchHandler>> {
        self.handlers.get(&kind).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&'static str> = self.handlers.keys().map(|k| k.name()).collect();
        kinds.sort_unstable();
        f.debug_struct("HandlerRegistry").field("kinds", &kinds).finish()
    }
}
