//! Route handler functions for all API endpoints.
//!
//! Each handler extracts path parameters and bodies via axum extractors,
//! calls into the chat orchestrator, and returns JSON (or binary for the
//! speech and export downloads).

use axum::extract::multipart::Field;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use parley_chat::{SessionView, TurnInput, TurnOutcome};
use parley_core::types::{SessionSettings, SettingsPatch, Upload, UPLOAD_EXTENSIONS};

use crate::error::ApiError;
use crate::state::AppState;

const OCTET_STREAM: &str = "application/octet-stream";
pub const SPEECH_FILE_NAME: &str = "reply.mp3";
pub const EXPORT_FILE_NAME: &str = "chat_history.pdf";

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_sessions: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

// =============================================================================
// Handler functions
// =============================================================================

/// GET /health - liveness and basic counters.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_sessions: state.orchestrator.session_count(),
    })
}

/// GET / - serve the self-contained chat page.
pub async fn ui() -> impl IntoResponse {
    Html(parley_ui::CHAT_HTML)
}

/// POST /api/sessions - start a new session.
pub async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    let id = state.orchestrator.create_session()?;
    let view = state.orchestrator.snapshot(id)?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/sessions/{id} - conversation log and settings.
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    let id = parse_session_id(&id)?;
    Ok(Json(state.orchestrator.snapshot(id)?))
}

/// POST /api/sessions/{id}/turns - submit text and/or one file.
///
/// Multipart fields: `text` (optional) and `file` (optional). Unknown fields
/// are ignored. Handler failures come back as a 200 with an error turn.
pub async fn submit_turn(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<TurnOutcome>, ApiError> {
    let id = parse_session_id(&id)?;
    let mut input = TurnInput::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("text") => {
                let text = field.text().await.map_err(multipart_error)?;
                if !text.trim().is_empty() {
                    input.text = Some(text);
                }
            }
            Some("file") => {
                if let Some(upload) = read_upload(field).await? {
                    input.upload = Some(upload);
                }
            }
            _ => {}
        }
    }

    tracing::debug!(
        session_id = %id,
        has_text = input.text.is_some(),
        upload = ?input.upload.as_ref().map(|u| u.file_name.as_str()),
        "Turn received"
    );

    Ok(Json(state.orchestrator.submit_turn(id, input).await?))
}

/// POST /api/sessions/{id}/reset - clear the conversation log.
pub async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_session_id(&id)?;
    state.orchestrator.reset(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/sessions/{id}/cancel - abort the in-flight turn, if any.
pub async fn cancel_turn(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    let id = parse_session_id(&id)?;
    let cancelled = state.orchestrator.cancel(id)?;
    Ok(Json(CancelResponse { cancelled }))
}

/// PUT /api/sessions/{id}/settings - update theme and spoken-reply toggle.
pub async fn update_settings(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<SettingsPatch>,
) -> Result<Json<SessionSettings>, ApiError> {
    let id = parse_session_id(&id)?;
    Ok(Json(state.orchestrator.update_settings(id, patch)?))
}

/// GET /api/sessions/{id}/speech - audio of the latest assistant reply.
pub async fn speech(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_session_id(&id)?;
    let audio = state
        .orchestrator
        .latest_audio(id)?
        .ok_or_else(|| ApiError::NotFound("No reply audio available".to_string()))?;

    Ok(binary_response(
        "audio/mpeg",
        format!("inline; filename=\"{}\"", SPEECH_FILE_NAME),
        audio,
    ))
}

/// GET /api/sessions/{id}/export - the conversation log as a PDF download.
pub async fn export(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_session_id(&id)?;
    let pdf = state.orchestrator.export_pdf(id).await?;

    Ok(binary_response(
        "application/pdf",
        format!("attachment; filename=\"{}\"", EXPORT_FILE_NAME),
        pdf,
    ))
}

// =============================================================================
// Helpers
// =============================================================================

fn parse_session_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid session id: {}", raw)))
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::BadRequest(err.body_text())
    }
}

/// Read the `file` field into an [`Upload`].
///
/// Browsers send an empty, nameless part when no file was picked; that is
/// treated as no upload.
async fn read_upload(field: Field<'_>) -> Result<Option<Upload>, ApiError> {
    let file_name = field.file_name().unwrap_or_default().to_string();
    let declared = field.content_type().map(str::to_string);
    let bytes = field.bytes().await.map_err(multipart_error)?;

    if file_name.is_empty() && bytes.is_empty() {
        return Ok(None);
    }

    let media_type = media_type_for(&file_name, declared.as_deref());
    let upload = Upload::new(file_name, media_type, bytes.to_vec());
    if !upload.is_accepted() {
        return Err(ApiError::BadRequest(format!(
            "Unsupported file type: {}. Allowed types: {}",
            upload.file_name,
            UPLOAD_EXTENSIONS.join(", ")
        )));
    }
    Ok(Some(upload))
}

/// Declared media type, or one guessed from the extension when the client
/// sent none or a generic one.
fn media_type_for(file_name: &str, declared: Option<&str>) -> String {
    match declared {
        Some(mime) if !mime.is_empty() && mime != OCTET_STREAM => mime.to_string(),
        _ => mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    }
}

fn binary_response(content_type: &'static str, disposition: String, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}
