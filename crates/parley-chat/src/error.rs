//! Error types for the chat engine.

use parley_core::error::ParleyError;

use crate::classifier::BranchKind;

/// Errors from the chat engine.
///
/// Handler failures (model, transcript, document, transcription, timeout,
/// cancellation) are turned into an error turn by the orchestrator. The
/// remaining variants reject a request before anything is appended.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("session not found: {0}")]
    SessionNotFound(uuid::Uuid),
    #[error("session {0} is already processing a turn")]
    Busy(uuid::Uuid),
    #[error("processing was cancelled")]
    Cancelled,
    #[error("remote processing did not finish within {0} seconds")]
    Timeout(u64),
    #[error("model error: {0}")]
    Model(String),
    #[error("transcript error: {0}")]
    Transcript(String),
    #[error("document error: {0}")]
    Document(String),
    #[error("transcription error: {0}")]
    Transcription(String),
    #[error("speech synthesis error: {0}")]
    Speech(String),
    #[error("export error: {0}")]
    Export(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("branch {0} requires an uploaded file")]
    MissingUpload(BranchKind),
    #[error("no handler registered for branch: {0}")]
    UnregisteredHandler(BranchKind),
}

impl From<ParleyError> for ChatError {
    fn from(err: ParleyError) -> Self {
        match err {
            ParleyError::Transcription(msg) => ChatError::Transcription(msg),
            ParleyError::Model(msg) => ChatError::Model(msg),
            other => ChatError::Storage(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Model(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_chat_error_display() {
        assert_eq!(ChatError::EmptyMessage.to_string(), "message cannot be empty");
        assert_eq!(
            ChatError::MessageTooLong(5000).to_string(),
            "message exceeds maximum length of 5000 characters"
        );

        let id = Uuid::new_v4();
        assert_eq!(
            ChatError::SessionNotFound(id).to_string(),
            format!("session not found: {}", id)
        );
        assert_eq!(
            ChatError::Busy(id).to_string(),
            format!("session {} is already processing a turn", id)
        );
        assert_eq!(ChatError::Cancelled.to_string(), "processing was cancelled");
        assert_eq!(
            ChatError::Timeout(300).to_string(),
            "remote processing did not finish within 300 seconds"
        );
        assert_eq!(
            ChatError::Model("quota exceeded".to_string()).to_string(),
            "model error: quota exceeded"
        );
        assert_eq!(
            ChatError::UnregisteredHandler(BranchKind::Video).to_string(),
            "no handler registered for branch: video"
        );
    }

    #[test]
    fn test_from_parley_error() {
        let err: ChatError = ParleyError::Transcription("no model".to_string()).into();
        assert!(matches!(err, ChatError::Transcription(_)));

        let err: ChatError = ParleyError::Model("bad key".to_string()).into();
        assert!(matches!(err, ChatError::Model(_)));

        let err: ChatError = ParleyError::Storage("disk full".to_string()).into();
        match err {
            ChatError::Storage(msg) => assert!(msg.contains("disk full")),
            other => panic!("unexpected variant: {:?}", other),
        }
    }
}
