//! Parley application binary - composition root.
//!
//! 1. Parse CLI flags and load configuration from TOML
//! 2. Initialize tracing
//! 3. Build the Gemini client, caption source, transcriber and speech service
//! 4. Open the audit database
//! 5. Start the session eviction loop and the axum server

mod cli;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use parley_api::{start_server, AppState};
use parley_chat::{
    ChatConfig, ChatOrchestrator, FileStore, GeminiClient, GoogleTranslateTts, HandlerDeps,
    HandlerRegistry, LanguageModel, ModelNames, TranscriptSource, VideoPolling,
    YoutubeTranscriptClient,
};
use parley_core::config::ParleyConfig;
use parley_storage::{AuditRepository, Database};
use parley_whisper::{MockTranscriptionService, TranscriptionService, WhisperConfig, WhisperService};

use crate::cli::{expand_home, CliArgs};

const EVICTION_INTERVAL: Duration = Duration::from_secs(60);

/// Remote collaborators shared by every branch handler.
struct Remotes {
    model: Arc<dyn LanguageModel>,
    files: Arc<dyn FileStore>,
    transcripts: Arc<dyn TranscriptSource>,
}

fn registry_with<T>(config: &ParleyConfig, remotes: &Remotes, transcriber: T) -> HandlerRegistry
where
    T: TranscriptionService + 'static,
{
    HandlerRegistry::with_defaults(HandlerDeps {
        model: Arc::clone(&remotes.model),
        files: Arc::clone(&remotes.files),
        transcripts: Arc::clone(&remotes.transcripts),
        transcriber: Arc::new(transcriber),
        models: ModelNames::from(&config.model),
        polling: VideoPolling::from(&config.video),
    })
}

/// Handler registry with Whisper when a model is configured, else the mock.
fn build_registry(config: &ParleyConfig, remotes: &Remotes) -> HandlerRegistry {
    if config.transcription.model_path.trim().is_empty() {
        tracing::warn!("No Whisper model configured; audio uploads use the mock transcriber");
        return registry_with(config, remotes, MockTranscriptionService::new());
    }
    match WhisperService::new(WhisperConfig::from(&config.transcription)) {
        Ok(whisper) => {
            tracing::info!(model = %config.transcription.model_path, "Whisper transcriber ready");
            registry_with(config, remotes, whisper)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Whisper unavailable; audio uploads use the mock transcriber");
            registry_with(config, remotes, MockTranscriptionService::new())
        }
    }
}

/// Periodically drop idle sessions.
async fn eviction_loop(orchestrator: Arc<ChatOrchestrator>) {
    let mut interval = tokio::time::interval(EVICTION_INTERVAL);
    loop {
        interval.tick().await;
        if let Err(e) = orchestrator.evict_expired() {
            tracing::warn!(error = %e, "Session eviction failed");
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read before tracing starts so its log level can apply.
    let config_file = args.resolve_config_path();
    let loaded = ParleyConfig::load(&config_file);
    let file_level = loaded
        .as_ref()
        .map(|c| c.general.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(args.resolve_log_filter(&file_level))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting Parley v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match loaded {
        Ok(config) => {
            tracing::info!(path = %config_file.display(), "Configuration loaded");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %config_file.display(),
                error = %e,
                "Failed to load config, using defaults"
            );
            ParleyConfig::default()
        }
    };
    config.api.port = args.resolve_port(config.api.port);
    config.api.host = args.resolve_host(&config.api.host);
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }

    // Remote services.
    let timeout = Duration::from_secs(config.model.request_timeout_secs);
    let api_key = std::env::var(&config.model.api_key_env).unwrap_or_default();
    if api_key.is_empty() {
        tracing::warn!(
            env = %config.model.api_key_env,
            "Model API key not set; every model request will fail"
        );
    }
    let gemini = Arc::new(GeminiClient::new(&config.model.api_base, api_key, timeout)?);
    let remotes = Remotes {
        model: gemini.clone(),
        files: gemini,
        transcripts: Arc::new(YoutubeTranscriptClient::new(
            config.transcription.caption_languages.clone(),
            timeout,
        )?),
    };
    let registry = build_registry(&config, &remotes);
    tracing::info!(handlers = registry.len(), "Branch handlers registered");

    let speech = GoogleTranslateTts::new(&config.speech.endpoint, &config.speech.language, timeout)?;
    let mut orchestrator =
        ChatOrchestrator::new(registry, ChatConfig::from(&config)).with_speech(Arc::new(speech));

    // Audit store.
    if config.audit.enabled {
        let data_dir = expand_home(&config.general.data_dir);
        if let Err(e) = std::fs::create_dir_all(&data_dir) {
            tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
            return Err(e.into());
        }
        let db_path = data_dir.join(&config.audit.db_file);
        let db = Database::new(&db_path)?;
        tracing::info!(path = %db_path.display(), "Audit database opened");
        orchestrator = orchestrator.with_audit(Arc::new(AuditRepository::new(Arc::new(db))));
    } else {
        tracing::info!("Audit log disabled in config");
    }

    let orchestrator = Arc::new(orchestrator);
    tokio::spawn(eviction_loop(Arc::clone(&orchestrator)));

    tracing::info!(
        "Chat page at http://{}:{}/",
        config.api.host,
        config.api.port
    );
    let state = AppState::new(config.clone(), orchestrator);
    if let Err(e) = start_server(&config, state, shutdown_signal()).await {
        tracing::error!(error = %e, "API server stopped");
        tracing::error!("Try: PARLEY_PORT={} parley", config.api.port.saturating_add(1));
        return Err(e.into());
    }

    Ok(())
}
