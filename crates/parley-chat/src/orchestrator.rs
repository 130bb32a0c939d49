//! Chat orchestrator: owns the sessions and runs turns through the pipeline.
//!
//! A turn is validated, appended as a user turn, classified, dispatched to
//! the branch handler, and answered with exactly one assistant turn (the
//! reply, or an error turn when the handler fails). Every appended turn is
//! copied to the audit sink; an audit failure only produces a warning.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use parley_core::config::ParleyConfig;
use parley_core::types::{
    turn_timestamp_now, AuditRecord, SessionSettings, SettingsPatch, Turn, Upload,
};

use crate::audit::AuditSink;
use crate::classifier::{classify, BranchKind};
use crate::conversation::ConversationLog;
use crate::error::ChatError;
use crate::export::{render_pdf, ExportOptions};
use crate::handler::{BranchRequest, HandlerRegistry};
use crate::speech::SpeechSynthesizer;

/// Orchestrator settings.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub max_message_chars: usize,
    pub session_timeout_minutes: u32,
    /// Initial value of each new session's audio toggle.
    pub audio_reply_default: bool,
    pub export: ExportOptions,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::from(&ParleyConfig::default())
    }
}

impl From<&ParleyConfig> for ChatConfig {
    fn from(config: &ParleyConfig) -> Self {
        Self {
            max_message_chars: config.session.max_message_chars,
            session_timeout_minutes: config.session.timeout_minutes,
            audio_reply_default: config.speech.enabled_by_default,
            export: ExportOptions::from(&config.export),
        }
    }
}

/// What the user submitted for one turn.
#[derive(Debug, Clone, Default)]
pub struct TurnInput {
    pub text: Option<String>,
    pub upload: Option<Upload>,
}

/// Result of a processed turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub branch: BranchKind,
    pub user: Turn,
    pub reply: Turn,
    /// Non-fatal problems (audit or speech failures) to show the user.
    pub warnings: Vec<String>,
    pub audio_available: bool,
}

/// Read-only view of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub turns: Vec<Turn>,
    pub settings: SessionSettings,
    pub audio_available: bool,
    pub started_at: DateTime<Utc>,
}

struct Session {
    log: ConversationLog,
    settings: SessionSettings,
    last_reply_audio: Option<Vec<u8>>,
    started_at: DateTime<Utc>,
    last_activity: Instant,
}

impl Session {
    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}

struct SessionSlot {
    /// Held for the whole duration of a turn.
    turn_lock: tokio::sync::Mutex<()>,
    state: Mutex<Session>,
    in_flight: Mutex<Option<CancellationToken>>,
}

impl SessionSlot {
    fn state(&self) -> Result<MutexGuard<'_, Session>, ChatError> {
        self.state
            .lock()
            .map_err(|e| ChatError::Storage(format!("session lock poisoned: {}", e)))
    }
}

/// Clears the in-flight token when the turn ends, however it ends.
struct InFlight<'a> {
    slot: &'a SessionSlot,
}

impl<'a> InFlight<'a> {
    fn start(slot: &'a SessionSlot, token: CancellationToken) -> Self {
        if let Ok(mut in_flight) = slot.in_flight.lock() {
            *in_flight = Some(token);
        }
        Self { slot }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Ok(mut in_flight) = self.slot.in_flight.lock() {
            *in_flight = None;
        }
    }
}

/// Central coordinator for chat sessions.
pub struct ChatOrchestrator {
    registry: HandlerRegistry,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
    audit: Option<Arc<dyn AuditSink>>,
    sessions: Mutex<HashMap<Uuid, Arc<SessionSlot>>>,
    config: ChatConfig,
}

impl ChatOrchestrator {
    pub fn new(registry: HandlerRegistry, config: ChatConfig) -> Self {
        Self {
            registry,
            speech: None,
            audit: None,
            sessions: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn with_speech(mut self, speech: Arc<dyn SpeechSynthesizer>) -> Self {
        self.speech = Some(speech);
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Create an empty session.
    pub fn create_session(&self) -> Result<Uuid, ChatError> {
        let id = Uuid::new_v4();
        let slot = SessionSlot {
            turn_lock: tokio::sync::Mutex::new(()),
            state: Mutex::new(Session {
                log: ConversationLog::new(),
                settings: SessionSettings {
                    audio_reply: self.config.audio_reply_default,
                    ..SessionSettings::default()
                },
                last_reply_audio: None,
                started_at: Utc::now(),
                last_activity: Instant::now(),
            }),
            in_flight: Mutex::new(None),
        };
        self.lock_sessions()?.insert(id, Arc::new(slot));
        info!(session_id = %id, "Created chat session");
        Ok(id)
    }

    pub fn snapshot(&self, id: Uuid) -> Result<SessionView, ChatError> {
        let slot = self.slot(id)?;
        let mut session = slot.state()?;
        session.touch();
        Ok(SessionView {
            id,
            turns: session.log.turns().to_vec(),
            settings: session.settings,
            audio_available: session.last_reply_audio.is_some(),
            started_at: session.started_at,
        })
    }

    /// Process one turn end to end.
    ///
    /// Input errors and [`ChatError::Busy`] are returned before anything is
    /// appended. Once the user turn is appended, the call always succeeds and
    /// handler failures are reported through an error turn.
    pub async fn submit_turn(&self, id: Uuid, input: TurnInput) -> Result<TurnOutcome, ChatError> {
        let text = input
            .text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());
        let upload = input.upload.as_ref();
        if text.is_none() && upload.is_none() {
            return Err(ChatError::EmptyMessage);
        }
        if let Some(text) = text {
            if text.chars().count() > self.config.max_message_chars {
                return Err(ChatError::MessageTooLong(self.config.max_message_chars));
            }
        }

        let slot = self.slot(id)?;
        let _turn = slot.turn_lock.try_lock().map_err(|_| ChatError::Busy(id))?;
        let cancel = CancellationToken::new();
        let _in_flight = InFlight::start(&slot, cancel.clone());

        let timestamp = turn_timestamp_now();
        let user_turn = match (text, upload) {
            (Some(text), _) => Turn::user(text, timestamp.clone()),
            (None, Some(upload)) => {
                Turn::user(format!("\u{1f4ce} Uploaded: {}", upload.file_name), timestamp.clone())
            }
            (None, None) => return Err(ChatError::EmptyMessage),
        };

        let mut warnings = Vec::new();
        let audio_reply = {
            let mut session = slot.state()?;
            session.log.append(user_turn.clone());
            session.touch();
            session.settings.audio_reply
        };
        self.audit_turn(id, &user_turn, &mut warnings).await;

        let branch = classify(text, upload);
        debug!(session_id = %id, branch = %branch.kind(), "Classified turn");

        let result = match self.registry.get(branch.kind()) {
            Some(handler) => {
                let request = BranchRequest {
                    branch: &branch,
                    text,
                    upload,
                    cancel: &cancel,
                };
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(ChatError::Cancelled),
                    result = handler.handle(&request) => result,
                }
            }
            None => Err(ChatError::UnregisteredHandler(branch.kind())),
        };

        let reply = match result {
            Ok(text) => Turn::assistant(text, timestamp),
            Err(e) => {
                warn!(session_id = %id, branch = %branch.kind(), error = %e, "Turn failed");
                Turn::error(e, timestamp)
            }
        };
        {
            let mut session = slot.state()?;
            session.log.append(reply.clone());
            session.touch();
        }
        self.audit_turn(id, &reply, &mut warnings).await;

        let audio = if audio_reply && !reply.error {
            self.speak(&reply.text, &mut warnings).await
        } else {
            None
        };
        let audio_available = audio.is_some();
        slot.state()?.last_reply_audio = audio;

        info!(
            session_id = %id,
            branch = %branch.kind(),
            failed = reply.error,
            "Turn completed"
        );
        Ok(TurnOutcome {
            branch: branch.kind(),
            user: user_turn,
            reply,
            warnings,
            audio_available,
        })
    }

    /// Clear the log and the latest reply audio. Rejected while a turn runs.
    pub fn reset(&self, id: Uuid) -> Result<(), ChatError> {
        let slot = self.slot(id)?;
        let _turn = slot.turn_lock.try_lock().map_err(|_| ChatError::Busy(id))?;
        let mut session = slot.state()?;
        session.log.reset();
        session.last_reply_audio = None;
        session.touch();
        info!(session_id = %id, "Reset chat session");
        Ok(())
    }

    /// Cancel the turn in flight, if any. Returns whether one was running.
    pub fn cancel(&self, id: Uuid) -> Result<bool, ChatError> {
        let slot = self.slot(id)?;
        let in_flight = slot
            .in_flight
            .lock()
            .map_err(|e| ChatError::Storage(format!("in-flight lock poisoned: {}", e)))?;
        match in_flight.as_ref() {
            Some(token) => {
                token.cancel();
                info!(session_id = %id, "Cancelled in-flight turn");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn update_settings(
        &self,
        id: Uuid,
        patch: SettingsPatch,
    ) -> Result<SessionSettings, ChatError> {
        let slot = self.slot(id)?;
        let mut session = slot.state()?;
        session.settings.apply(patch);
        session.touch();
        Ok(session.settings)
    }

    /// Audio of the most recent reply, when one was synthesized.
    pub fn latest_audio(&self, id: Uuid) -> Result<Option<Vec<u8>>, ChatError> {
        let slot = self.slot(id)?;
        let session = slot.state()?;
        Ok(session.last_reply_audio.clone())
    }

    /// Render the session's log as a PDF document.
    pub async fn export_pdf(&self, id: Uuid) -> Result<Vec<u8>, ChatError> {
        let turns = {
            let slot = self.slot(id)?;
            let mut session = slot.state()?;
            session.touch();
            session.log.turns().to_vec()
        };
        let options = self.config.export.clone();
        tokio::task::spawn_blocking(move || render_pdf(&turns, &options))
            .await
            .map_err(|e| ChatError::Export(format!("PDF rendering aborted: {}", e)))?
    }

    /// Drop sessions idle for longer than the configured timeout.
    pub fn evict_expired(&self) -> Result<usize, ChatError> {
        let max_idle = Duration::from_secs(u64::from(self.config.session_timeout_minutes) * 60);
        self.evict_idle(max_idle)
    }

    /// Drop sessions idle for longer than `max_idle`. Busy sessions are kept.
    pub fn evict_idle(&self, max_idle: Duration) -> Result<usize, ChatError> {
        let mut sessions = self.lock_sessions()?;
        let before = sessions.len();
        sessions.retain(|_, slot| {
            if slot.turn_lock.try_lock().is_err() {
                return true;
            }
            match slot.state.lock() {
                Ok(session) => session.last_activity.elapsed() <= max_idle,
                Err(_) => false,
            }
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(evicted, remaining = sessions.len(), "Evicted idle chat sessions");
        }
        Ok(evicted)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    // -- Private helpers --

    fn lock_sessions(&self) -> Result<MutexGuard<'_, HashMap<Uuid, Arc<SessionSlot>>>, ChatError> {
        self.sessions
            .lock()
            .map_err(|e| ChatError::Storage(format!("session map lock poisoned: {}", e)))
    }

    fn slot(&self, id: Uuid) -> Result<Arc<SessionSlot>, ChatError> {
        self.lock_sessions()?
            .get(&id)
            .cloned()
            .ok_or(ChatError::SessionNotFound(id))
    }

    async fn audit_turn(&self, id: Uuid, turn: &Turn, warnings: &mut Vec<String>) {
        let Some(audit) = &self.audit else {
            return;
        };
        if let Err(e) = audit.record(&AuditRecord::from_turn(id, turn)).await {
            warn!(session_id = %id, error = %e, "Failed to write audit record");
            warnings.push(format!(
                "\u{26a0}\u{fe0f} Failed to log message to audit store: {}",
                e
            ));
        }
    }

    async fn speak(&self, text: &str, warnings: &mut Vec<String>) -> Option<Vec<u8>> {
        let speech = self.speech.as_ref()?;
        match speech.synthesize(text).await {
            Ok(audio) => Some(audio),
            Err(e) => {
                warn!(error = %e, "Speech synthesis failed");
                warnings.push(format!("\u{26a0}\u{fe0f} Could not generate audio reply: {}", e));
                None
            }
        }
    }
}

impl std::fmt::Debug for ChatOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatOrchestrator")
            .field("registry", &self.registry)
            .field("speech", &self.speech.is_some())
            .field("audit", &self.audit.is_some())
            .field("sessions", &self.session_count())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
