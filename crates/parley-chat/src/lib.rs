//! Parley Chat crate - turn classification, branch dispatch, and the
//! conversation engine.
//!
//! A turn (text and/or one upload) is classified into exactly one branch,
//! handled by that branch's pipeline against the hosted model, and appended
//! to the session's conversation log. Replies can be spoken and the whole
//! log exported as PDF.

pub mod audit;
pub mod classifier;
pub mod conversation;
pub mod document;
pub mod error;
pub mod export;
pub mod gemini;
pub mod handler;
pub mod orchestrator;
pub mod speech;
pub mod youtube;

#[cfg(test)]
pub(crate) mod testing;

pub use audit::AuditSink;
pub use classifier::{classify, Branch, BranchKind, DocumentFormat};
pub use conversation::ConversationLog;
pub use error::ChatError;
pub use export::ExportOptions;
pub use gemini::{FileStore, GeminiClient, LanguageModel, Part, RemoteFile};
pub use handler::{BranchHandler, HandlerDeps, HandlerRegistry, ModelNames, VideoPolling};
pub use orchestrator::{ChatConfig, ChatOrchestrator, SessionView, TurnInput, TurnOutcome};
pub use speech::{GoogleTranslateTts, SpeechSynthesizer};
pub use youtube::{TranscriptSource, YoutubeTranscriptClient};
