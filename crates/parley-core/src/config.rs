use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ParleyError, Result};

/// Top-level configuration for Parley.
///
/// Loaded from `~/.parley/config.toml` by default. Credentials are never read
/// from this file; `model.api_key_env` names the environment variable that
/// holds the model API key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParleyConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

impl ParleyConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ParleyConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject values that would make the service unusable.
    pub fn validate(&self) -> Result<()> {
        if self.video.poll_interval_ms == 0 {
            return Err(ParleyError::Config(
                "video.poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.video.processing_timeout_secs == 0 {
            return Err(ParleyError::Config(
                "video.processing_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.session.max_upload_mb == 0 {
            return Err(ParleyError::Config(
                "session.max_upload_mb must be greater than 0".to_string(),
            ));
        }
        if self.session.max_message_chars == 0 {
            return Err(ParleyError::Config(
                "session.max_message_chars must be greater than 0".to_string(),
            ));
        }
        if !(self.export.font_size.is_finite() && self.export.font_size > 0.0) {
            return Err(ParleyError::Config(
                "export.font_size must be a positive number".to_string(),
            ));
        }
        for (name, value) in [
            ("model.chat_model", &self.model.chat_model),
            ("model.vision_model", &self.model.vision_model),
            ("model.video_model", &self.model.video_model),
        ] {
            if value.trim().is_empty() {
                return Err(ParleyError::Config(format!("{} must not be empty", name)));
            }
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the audit database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.parley/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Maximum API requests per second across all clients.
    pub rate_limit_per_sec: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
            rate_limit_per_sec: 50,
        }
    }
}

/// Hosted language model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Base URL of the Gemini REST API.
    pub api_base: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Model for text prompts (chat, documents, transcripts).
    pub chat_model: String,
    /// Model for image prompts.
    pub vision_model: String,
    /// Model for uploaded video prompts.
    pub video_model: String,
    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com".to_string(),
            api_key_env: "GOOGLE_API_KEY".to_string(),
            chat_model: "gemini-1.5-flash".to_string(),
            vision_model: "gemini-2.0-flash-lite".to_string(),
            video_model: "gemini-2.0-flash-lite".to_string(),
            request_timeout_secs: 120,
        }
    }
}

/// Video upload processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Delay between file state polls.
    pub poll_interval_ms: u64,
    /// Upper bound on how long a file may stay in PROCESSING.
    pub processing_timeout_secs: u64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            processing_timeout_secs: 300,
        }
    }
}

/// Local speech-to-text settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// Path to a whisper.cpp GGML model file. Empty means use the mock.
    pub model_path: String,
    /// Language code, or "auto".
    pub language: String,
    /// Preferred YouTube caption languages, most preferred first.
    pub caption_languages: Vec<String>,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            model_path: String::new(),
            language: "en".to_string(),
            caption_languages: vec!["en".to_string()],
        }
    }
}

/// Text-to-speech settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Whether new sessions start with spoken replies enabled.
    pub enabled_by_default: bool,
    /// Language passed to the synthesizer.
    pub language: String,
    /// Synthesis endpoint.
    pub endpoint: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled_by_default: true,
            language: "en".to_string(),
            endpoint: "https://translate.google.com/translate_tts".to_string(),
        }
    }
}

/// Audit log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Whether turns are recorded to the audit database.
    pub enabled: bool,
    /// Database file name inside `general.data_dir`.
    pub db_file: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            db_file: "audit.db".to_string(),
        }
    }
}

/// Session lifetime and input limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle minutes after which a session is discarded.
    pub timeout_minutes: u32,
    /// Maximum upload size in megabytes.
    pub max_upload_mb: usize,
    /// Maximum length of typed text in characters.
    pub max_message_chars: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_minutes: 120,
            max_upload_mb: 200,
            max_message_chars: 20_000,
        }
    }
}

/// Chat export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Prefix for user turns in the exported document.
    pub user_label: String,
    /// Prefix for assistant turns in the exported document.
    pub assistant_label: String,
    /// Body font size in points.
    pub font_size: f32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            user_label: "You".to_string(),
            assistant_label: "Gemini".to_string(),
            font_size: 12.0,
        }
    }
}
