use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Display format for turn timestamps.
pub const TURN_TIME_FORMAT: &str = "%H:%M";

// =============================================================================
// Enums
// =============================================================================

/// Author of a conversation turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Page colour scheme.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

// =============================================================================
// Conversation
// =============================================================================

/// One entry in the conversation log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    /// Local wall-clock time the turn was submitted, formatted `HH:MM`.
    pub timestamp: String,
    /// Set on the assistant turn recorded when a dispatch fails.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
}

impl Turn {
    pub fn user(text: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            timestamp: timestamp.into(),
            error: false,
        }
    }

    pub fn assistant(text: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            timestamp: timestamp.into(),
            error: false,
        }
    }

    /// Assistant turn carrying a user-visible failure message.
    pub fn error(message: impl std::fmt::Display, timestamp: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: format!("\u{274c} Error: {}", message),
            timestamp: timestamp.into(),
            error: true,
        }
    }
}

/// Current local time in the turn timestamp format.
pub fn turn_timestamp_now() -> String {
    Local::now().format(TURN_TIME_FORMAT).to_string()
}

/// Session-scoped toggles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    pub theme: Theme,
    /// Synthesize spoken audio for each assistant reply.
    pub audio_reply: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            audio_reply: true,
        }
    }
}

/// Partial update of [`SessionSettings`]; absent fields are left unchanged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsPatch {
    #[serde(default)]
    pub theme: Option<Theme>,
    #[serde(default)]
    pub audio_reply: Option<bool>,
}

impl SessionSettings {
    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(theme) = patch.theme {
            self.theme = theme;
        }
        if let Some(audio_reply) = patch.audio_reply {
            self.audio_reply = audio_reply;
        }
    }
}

// =============================================================================
// Uploads
// =============================================================================

/// File extensions accepted for upload.
pub const UPLOAD_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "bmp", "gif", "pdf", "docx", "txt", "mp3", "wav", "mp4", "mov", "avi",
];

/// A file submitted with a turn. Consumed by exactly one branch handler.
#[derive(Clone, PartialEq, Eq)]
pub struct Upload {
    pub file_name: String,
    /// Declared media type, e.g. `image/png`.
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(
        file_name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    /// Lowercased extension of the file name, without the dot.
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }

    pub fn has_extension(&self, candidates: &[&str]) -> bool {
        self.extension()
            .map(|ext| candidates.contains(&ext.as_str()))
            .unwrap_or(false)
    }

    /// Whether the file name carries one of [`UPLOAD_EXTENSIONS`].
    pub fn is_accepted(&self) -> bool {
        self.has_extension(UPLOAD_EXTENSIONS)
    }
}

impl std::fmt::Debug for Upload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upload")
            .field("file_name", &self.file_name)
            .field("media_type", &self.media_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

// =============================================================================
// Audit
// =============================================================================

/// A turn as recorded in the audit store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: Role,
    pub text: String,
    pub timestamp: String,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn from_turn(session_id: Uuid, turn: &Turn) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            role: turn.role,
            text: turn.text.clone(),
            timestamp: turn.timestamp.clone(),
            created_at: Utc::now(),
        }
    }
}
