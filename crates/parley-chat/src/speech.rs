//! Spoken replies.
//!
//! [`GoogleTranslateTts`] uses the public translate TTS endpoint, which only
//! accepts short inputs. Long replies are split into chunks on word
//! boundaries and the returned MP3 streams are concatenated; MP3 frames are
//! self-delimiting so the result plays as one file.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::ChatError;

/// Maximum characters per TTS request.
pub const MAX_CHUNK_CHARS: usize = 200;

/// Converts reply text into audio bytes (MP3).
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ChatError>;
}

/// Split `text` into chunks of at most `max_chars` characters, breaking on
/// whitespace where possible.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() { word_len } else { word_len + 1 };
        if current_len + needed > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Google Translate text-to-speech client.
#[derive(Debug, Clone)]
pub struct GoogleTranslateTts {
    client: reqwest::Client,
    endpoint: String,
    language: String,
}

impl GoogleTranslateTts {
    pub fn new(
        endpoint: impl Into<String>,
        language: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0")
            .build()
            .map_err(|e| ChatError::Speech(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            language: language.into(),
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTranslateTts {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ChatError> {
        let chunks = chunk_text(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(ChatError::Speech("nothing to speak".to_string()));
        }

        let total = chunks.len().to_string();
        let mut audio = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            let idx = idx.to_string();
            let textlen = chunk.chars().count().to_string();
            let response = self
                .client
                .get(&self.endpoint)
                .query(&[
                    ("ie", "UTF-8"),
                    ("q", chunk.as_str()),
                    ("tl", self.language.as_str()),
                    ("client", "tw-ob"),
                    ("total", total.as_str()),
                    ("idx", idx.as_str()),
                    ("textlen", textlen.as_str()),
                ])
                .send()
                .await
                .map_err(|e| ChatError::Speech(e.to_string()))?;

            if !response.status().is_success() {
                return Err(ChatError::Speech(format!(
                    "TTS request failed with status {}",
                    response.status()
                )));
            }
            let bytes = response
                .bytes()
                .await
                .map_err(|e| ChatError::Speech(e.to_string()))?;
            audio.extend_from_slice(&bytes);
        }

        debug!(chunks = chunks.len(), bytes = audio.len(), "Synthesized reply audio");
        Ok(audio)
    }
}
