//! Input classifier.
//!
//! Selects exactly one handling branch for a turn. The checks run in a fixed
//! priority order and the first match wins, so ties cannot occur:
//!
//! 1. a YouTube link in the text
//! 2. a document upload (`.pdf`, `.docx`, `.txt`)
//! 3. an `image/*` upload
//! 4. an `audio/*` upload
//! 5. a video upload (`.mp4`, `.mov`, `.avi`)
//! 6. plain text
//!
//! Anything unrecognized falls through to plain text.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use parley_core::types::Upload;

static YOUTUBE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:https?://)?(?:www\.|m\.|music\.)?(?:youtube\.com/(?:watch\?(?:[^\s#]*?&)?v=|shorts/|embed/|live/)|youtu\.be/)([A-Za-z0-9_-]{11})",
    )
    .expect("Invalid YouTube link regex")
});

pub const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "docx", "txt"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi"];

/// Structured document formats the document branch can read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Txt,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "docx" => Some(DocumentFormat::Docx),
            "txt" => Some(DocumentFormat::Txt),
            _ => None,
        }
    }
}

/// Branch identifier without payload; the key of the handler registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BranchKind {
    YoutubeLink,
    DocumentText,
    Image,
    Audio,
    Video,
    PlainText,
}

impl BranchKind {
    pub const ALL: [BranchKind; 6] = [
        BranchKind::YoutubeLink,
        BranchKind::DocumentText,
        BranchKind::Image,
        BranchKind::Audio,
        BranchKind::Video,
        BranchKind::PlainText,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BranchKind::YoutubeLink => "youtube-link",
            BranchKind::DocumentText => "document-text",
            BranchKind::Image => "image",
            BranchKind::Audio => "audio",
            BranchKind::Video => "video",
            BranchKind::PlainText => "plain-text",
        }
    }
}

impl std::fmt::Display for BranchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The handling branch chosen for a turn, with what the classifier learned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Branch {
    YoutubeLink { video_id: String },
    DocumentText { format: DocumentFormat },
    Image,
    Audio,
    Video,
    PlainText,
}

impl Branch {
    pub fn kind(&self) -> BranchKind {
        match self {
            Branch::YoutubeLink { .. } => BranchKind::YoutubeLink,
            Branch::DocumentText { .. } => BranchKind::DocumentText,
            Branch::Image => BranchKind::Image,
            Branch::Audio => BranchKind::Audio,
            Branch::Video => BranchKind::Video,
            Branch::PlainText => BranchKind::PlainText,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }
}

/// Extract the video id of the first YouTube link in `text`.
pub fn youtube_video_id(text: &str) -> Option<String> {
    YOUTUBE_LINK
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Choose the branch for a turn.
pub fn classify(text: Option<&str>, upload: Option<&Upload>) -> Branch {
    if let Some(video_id) = text.and_then(youtube_video_id) {
        return Branch::YoutubeLink { video_id };
    }

    let Some(upload) = upload else {
        return Branch::PlainText;
    };

    if let Some(format) = upload
        .extension()
        .and_then(|ext| DocumentFormat::from_extension(&ext))
    {
        return Branch::DocumentText { format };
    }

    let media_type = upload.media_type.to_ascii_lowercase();
    if media_type.starts_with("image/") {
        return Branch::Image;
    }
    if media_type.starts_with("audio/") {
        return Branch::Audio;
    }
    if upload.has_extension(VIDEO_EXTENSIONS) {
        return Branch::Video;
    }

    Branch::PlainText
}
