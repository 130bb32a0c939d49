//! Hosted model client.
//!
//! Two seams are exposed as traits so the handlers can be tested without the
//! network: [`LanguageModel`] generates a reply from a list of content parts,
//! and [`FileStore`] holds uploaded media the model can reference by URI.
//! [`GeminiClient`] implements both against the Gemini REST API.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ChatError;

// =============================================================================
// Content parts
// =============================================================================

/// One piece of a prompt.
#[derive(Clone, PartialEq, Eq)]
pub enum Part {
    Text(String),
    /// Raw bytes sent inline (base64 on the wire).
    InlineData { mime_type: String, data: Vec<u8> },
    /// Reference to a file previously uploaded to the [`FileStore`].
    FileData { mime_type: String, file_uri: String },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(text.into())
    }
}

impl std::fmt::Debug for Part {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Part::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Part::InlineData { mime_type, data } => f
                .debug_struct("InlineData")
                .field("mime_type", mime_type)
                .field("len", &data.len())
                .finish(),
            Part::FileData {
                mime_type,
                file_uri,
            } => f
                .debug_struct("FileData")
                .field("mime_type", mime_type)
                .field("file_uri", file_uri)
                .finish(),
        }
    }
}

/// Processing state of an uploaded file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    Processing,
    Active,
    Failed,
    #[default]
    #[serde(other)]
    Unspecified,
}

/// A file held by the model's file store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    /// Resource name, e.g. `files/abc123`.
    pub name: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub state: FileState,
}

// =============================================================================
// Traits
// =============================================================================

/// A hosted language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a single text reply for a one-turn prompt.
    async fn generate(&self, model: &str, parts: Vec<Part>) -> Result<String, ChatError>;
}

/// Remote storage for media the model reads by reference.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn upload(
        &self,
        display_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<RemoteFile, ChatError>;

    /// Fetch the current metadata of a file by resource name.
    async fn get(&self, name: &str) -> Result<RemoteFile, ChatError>;
}

// =============================================================================
// Wire format
// =============================================================================

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [WireContent<'a>; 1],
}

#[derive(Serialize)]
struct WireContent<'a> {
    role: &'static str,
    parts: Vec<WirePart<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum WirePart<'a> {
    Text(&'a str),
    InlineData {
        #[serde(rename = "mimeType")]
        mime_type: &'a str,
        data: String,
    },
    FileData {
        #[serde(rename = "mimeType")]
        mime_type: &'a str,
        #[serde(rename = "fileUri")]
        file_uri: &'a str,
    },
}

impl<'a> From<&'a Part> for WirePart<'a> {
    fn from(part: &'a Part) -> Self {
        match part {
            Part::Text(text) => WirePart::Text(text),
            Part::InlineData { mime_type, data } => WirePart::InlineData {
                mime_type,
                data: base64::engine::general_purpose::STANDARD.encode(data),
            },
            Part::FileData {
                mime_type,
                file_uri,
            } => WirePart::FileData {
                mime_type,
                file_uri,
            },
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Deserialize)]
struct FileEnvelope {
    file: RemoteFile,
}

/// Concatenated text of the first candidate.
fn reply_text(response: GenerateResponse) -> Result<String, ChatError> {
    if let Some(reason) = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        return Err(ChatError::Model(format!("prompt was blocked: {}", reason)));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| ChatError::Model("model returned no candidates".to_string()))?;

    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
        return Err(ChatError::Model(format!(
            "model returned no text (finish reason: {})",
            reason
        )));
    }
    Ok(text)
}

/// Error message from a non-success response body.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.status {
            Some(code) => format!("{} ({}, {})", envelope.error.message, status.as_u16(), code),
            None => format!("{} ({})", envelope.error.message, status.as_u16()),
        },
        Err(_) if body.trim().is_empty() => format!("request failed with status {}", status),
        Err(_) => format!("request failed with status {}: {}", status, body.trim()),
    }
}

// =============================================================================
// Client
// =============================================================================

/// Gemini REST client.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ChatError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(ChatError::Model(error_message(status, &body)))
    }
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(&self, model: &str, parts: Vec<Part>) -> Result<String, ChatError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.api_base, model);
        let request = GenerateRequest {
            contents: [WireContent {
                role: "user",
                parts: parts.iter().map(WirePart::from).collect(),
            }],
        };

        debug!(model = %model, parts = parts.len(), "Sending generateContent request");
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;
        let response = Self::check(response).await?;
        let body: GenerateResponse = response.json().await?;
        reply_text(body)
    }
}

#[async_trait]
impl FileStore for GeminiClient {
    async fn upload(
        &self,
        display_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<RemoteFile, ChatError> {
        let start_url = format!("{}/upload/v1beta/files", self.api_base);
        let response = self
            .client
            .post(&start_url)
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&serde_json::json!({ "file": { "display_name": display_name } }))
            .send()
            .await?;
        let response = Self::check(response).await?;

        let upload_url = response
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ChatError::Model("upload session URL missing from response".to_string()))?;

        debug!(display_name = %display_name, size = bytes.len(), "Uploading file");
        let response = self
            .client
            .post(&upload_url)
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Offset", 0)
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await?;
        let response = Self::check(response).await?;
        let envelope: FileEnvelope = response.json().await?;
        Ok(envelope.file)
    }

    async fn get(&self, name: &str) -> Result<RemoteFile, ChatError> {
        let url = format!("{}/v1beta/{}", self.api_base, name);
        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }
}
