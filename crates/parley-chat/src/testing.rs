//! In-memory doubles for the external collaborators, shared by unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ChatError;
use crate::gemini::{FileState, FileStore, LanguageModel, Part, RemoteFile};
use crate::youtube::{CaptionSegment, TranscriptSource};

/// Language model that answers every prompt with a fixed reply.
pub struct MockModel {
    reply: Result<String, String>,
    delay: Duration,
    calls: Mutex<Vec<(String, Vec<Part>)>>,
}

impl MockModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<(String, Vec<Part>)> {
        self.calls.lock().unwrap().clone()
    }

    /// Text parts of the most recent prompt, in order.
    pub fn last_prompt_text(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .last()
            .map(|(_, parts)| {
                parts
                    .iter()
                    .filter_map(|p| match p {
                        Part::Text(t) => Some(t.clone()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn generate(&self, model: &str, parts: Vec<Part>) -> Result<String, ChatError> {
        self.calls.lock().unwrap().push((model.to_string(), parts));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.reply.clone().map_err(ChatError::Model)
    }
}

/// File store whose `get` walks through a scripted list of states.
pub struct MockFileStore {
    states: Mutex<VecDeque<FileState>>,
    last_state: FileState,
    pub gets: Mutex<usize>,
}

impl MockFileStore {
    /// `states[0]` is returned by `upload`, later entries by successive `get`s.
    /// Once exhausted, the last state repeats.
    pub fn with_states(states: &[FileState]) -> Self {
        Self {
            states: Mutex::new(states.iter().copied().collect()),
            last_state: states.last().copied().unwrap_or(FileState::Active),
            gets: Mutex::new(0),
        }
    }

    fn next_file(&self) -> RemoteFile {
        let state = self
            .states
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.last_state);
        RemoteFile {
            name: "files/mock".to_string(),
            uri: "https://files.example/mock".to_string(),
            mime_type: "video/mp4".to_string(),
            state,
        }
    }

    pub fn get_count(&self) -> usize {
        *self.gets.lock().unwrap()
    }
}

#[async_trait]
impl FileStore for MockFileStore {
    async fn upload(
        &self,
        _display_name: &str,
        _mime_type: &str,
        _bytes: Vec<u8>,
    ) -> Result<RemoteFile, ChatError> {
        Ok(self.next_file())
    }

    async fn get(&self, _name: &str) -> Result<RemoteFile, ChatError> {
        *self.gets.lock().unwrap() += 1;
        Ok(self.next_file())
    }
}

/// Transcript source returning fixed segments, or an error when empty.
pub struct MockTranscripts {
    segments: Vec<CaptionSegment>,
}

impl MockTranscripts {
    pub fn with_lines(lines: &[&str]) -> Self {
        Self {
            segments: lines
                .iter()
                .enumerate()
                .map(|(i, text)| CaptionSegment {
                    start: i as f64,
                    duration: 1.0,
                    text: text.to_string(),
                })
                .collect(),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            segments: Vec::new(),
        }
    }
}

#[async_trait]
impl TranscriptSource for MockTranscripts {
    async fn fetch(&self, _video_id: &str) -> Result<Vec<CaptionSegment>, ChatError> {
        if self.segments.is_empty() {
            return Err(ChatError::Transcript(
                "no captions are available for this video".to_string(),
            ));
        }
        Ok(self.segments.clone())
    }
}

/// A short mono 16 kHz WAV file.
pub fn wav_bytes(seconds: f32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        let n = (16_000.0 * seconds) as usize;
        for i in 0..n {
            let t = i as f32 / 16_000.0;
            let sample = (t * 440.0 * std::f32::consts::TAU).sin() * 0.3;
            writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}
