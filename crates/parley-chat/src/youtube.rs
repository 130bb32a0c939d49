//! YouTube caption retrieval.
//!
//! The watch page embeds the player response, which lists the caption tracks
//! of the video. The preferred track is fetched as timed-text XML and turned
//! into [`CaptionSegment`]s.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::ChatError;

/// One caption line with its timing in seconds.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptionSegment {
    pub start: f64,
    pub duration: f64,
    pub text: String,
}

/// Source of caption transcripts for a video id.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    async fn fetch(&self, video_id: &str) -> Result<Vec<CaptionSegment>, ChatError>;
}

/// Join caption segments into a single transcript.
pub fn join_segments(segments: &[CaptionSegment]) -> String {
    segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

// =============================================================================
// Caption track discovery
// =============================================================================

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionTrack {
    base_url: String,
    #[serde(default)]
    language_code: String,
    /// `asr` for auto-generated tracks.
    #[serde(default)]
    kind: Option<String>,
}

const TRACKS_MARKER: &str = "\"captionTracks\":";

/// Caption track list embedded in a watch page.
fn caption_tracks(page: &str) -> Result<Vec<CaptionTrack>, ChatError> {
    let start = page.find(TRACKS_MARKER).ok_or_else(|| {
        ChatError::Transcript("no captions are available for this video".to_string())
    })?;
    let rest = &page[start + TRACKS_MARKER.len()..];

    serde_json::Deserializer::from_str(rest)
        .into_iter::<Vec<CaptionTrack>>()
        .next()
        .ok_or_else(|| ChatError::Transcript("caption track list is empty".to_string()))?
        .map_err(|e| ChatError::Transcript(format!("malformed caption track list: {}", e)))
}

/// Preferred track: a manual track in a preferred language, then any track in
/// a preferred language, then the first manual track, then the first track.
fn choose_track<'a>(tracks: &'a [CaptionTrack], languages: &[String]) -> Option<&'a CaptionTrack> {
    let manual = |t: &&CaptionTrack| t.kind.as_deref() != Some("asr");
    for lang in languages {
        let in_lang = |t: &&CaptionTrack| t.language_code.eq_ignore_ascii_case(lang);
        if let Some(track) = tracks.iter().filter(in_lang).find(manual) {
            return Some(track);
        }
        if let Some(track) = tracks.iter().find(in_lang) {
            return Some(track);
        }
    }
    tracks.iter().find(manual).or_else(|| tracks.first())
}

// =============================================================================
// Timed-text parsing
// =============================================================================

#[derive(Debug, Deserialize)]
struct TimedText {
    #[serde(rename = "text", default)]
    lines: Vec<TimedLine>,
}

#[derive(Debug, Deserialize)]
struct TimedLine {
    #[serde(rename = "@start")]
    start: f64,
    #[serde(rename = "@dur", default)]
    dur: f64,
    #[serde(rename = "$text", default)]
    text: String,
}

/// Parse a timed-text document into segments.
///
/// Caption text is HTML-escaped inside the XML, so it is unescaped a second
/// time after XML decoding. Empty lines are dropped.
pub fn parse_timed_text(xml: &str) -> Result<Vec<CaptionSegment>, ChatError> {
    let doc: TimedText = quick_xml::de::from_str(xml)
        .map_err(|e| ChatError::Transcript(format!("malformed caption document: {}", e)))?;

    Ok(doc
        .lines
        .into_iter()
        .filter_map(|line| {
            let text = match quick_xml::escape::unescape(&line.text) {
                Ok(unescaped) => unescaped.into_owned(),
                Err(_) => line.text,
            };
            let text = text.replace('\n', " ").trim().to_string();
            (!text.is_empty()).then_some(CaptionSegment {
                start: line.start,
                duration: line.dur,
                text,
            })
        })
        .collect())
}

// =============================================================================
// Client
// =============================================================================

/// Fetches captions from youtube.com.
#[derive(Debug, Clone)]
pub struct YoutubeTranscriptClient {
    client: reqwest::Client,
    base_url: String,
    languages: Vec<String>,
}

impl YoutubeTranscriptClient {
    pub fn new(languages: Vec<String>, timeout: Duration) -> Result<Self, ChatError> {
        Self::with_base_url("https://www.youtube.com", languages, timeout)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        languages: Vec<String>,
        timeout: Duration,
    ) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChatError::Transcript(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            languages,
        })
    }

    async fn get_text(&self, url: &str) -> Result<String, ChatError> {
        let response = self
            .client
            .get(url)
            .header("Accept-Language", "en-US,en;q=0.8")
            .send()
            .await
            .map_err(|e| ChatError::Transcript(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ChatError::Transcript(format!(
                "request failed with status {}",
                response.status()
            )));
        }
        response
            .text()
            .await
            .map_err(|e| ChatError::Transcript(e.to_string()))
    }
}

#[async_trait]
impl TranscriptSource for YoutubeTranscriptClient {
    async fn fetch(&self, video_id: &str) -> Result<Vec<CaptionSegment>, ChatError> {
        let page_url = format!("{}/watch?v={}", self.base_url, video_id);
        let page = self.get_text(&page_url).await?;

        let tracks = caption_tracks(&page)?;
        let track = choose_track(&tracks, &self.languages).ok_or_else(|| {
            ChatError::Transcript("no captions are available for this video".to_string())
        })?;
        debug!(video_id = %video_id, language = %track.language_code, "Fetching caption track");

        let xml = self.get_text(&track.base_url).await?;
        let segments = parse_timed_text(&xml)?;
        if segments.is_empty() {
            return Err(ChatError::Transcript("caption track is empty".to_string()));
        }
        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::Router;

    const SAMPLE_XML: &str = r#"<?xml version="1.0" encoding="utf-8" ?><transcript><text start="0.5" dur="1.54">Hey there</text><text start="2.1" dur="2">it&amp;#39;s a
test</text><text start="4.2" dur="1"></text><text start="5" dur="0.5">Tom &amp;amp; Jerry</text></transcript>"#;

    fn track(lang: &str, kind: Option<&str>) -> CaptionTrack {
        CaptionTrack {
            base_url: format!("https://example/{}/{}", lang, kind.unwrap_or("manual")),
            language_code: lang.to_string(),
            kind: kind.map(str::to_string),
        }
    }

    #[test]
    fn test_parse_timed_text() {
        let segments = parse_timed_text(SAMPLE_XML).unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].text, "Hey there");
        assert_eq!(segments[0].start, 0.5);
        assert_eq!(segments[0].duration, 1.54);
        assert_eq!(segments[1].text, "it's a test");
        assert_eq!(segments[2].text, "Tom & Jerry");
    }

    #[test]
    fn test_parse_malformed_xml() {
        let err = parse_timed_text("<transcript><text start=").unwrap_err();
        assert!(matches!(err, ChatError::Transcript(_)));
    }

    #[test]
    fn test_join_segments() {
        let segments = parse_timed_text(SAMPLE_XML).unwrap();
        assert_eq!(join_segments(&segments), "Hey there it's a test Tom & Jerry");
    }

    #[test]
    fn test_caption_tracks_from_page() {
        let page = r#"<script>var ytInitialPlayerResponse = {"captions":{"playerCaptionsTracklistRenderer":{"captionTracks":[{"baseUrl":"https://www.youtube.com/api/timedtext?v=abc&lang=en","name":{"simpleText":"English"},"languageCode":"en","kind":"asr"}],"audioTracks":[]}}};</script>"#;
        let tracks = caption_tracks(page).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(
            tracks[0].base_url,
            "https://www.youtube.com/api/timedtext?v=abc&lang=en"
        );
        assert_eq!(tracks[0].kind.as_deref(), Some("asr"));
    }

    #[test]
    fn test_page_without_captions() {
        let err = caption_tracks("<html>no player here</html>").unwrap_err();
        assert!(err.to_string().contains("no captions"));
    }

    #[test]
    fn test_choose_track_preference() {
        let tracks = vec![
            track("de", None),
            track("en", Some("asr")),
            track("en", None),
        ];
        let langs = vec!["en".to_string()];
        assert_eq!(
            choose_track(&tracks, &langs).unwrap().base_url,
            "https://example/en/manual"
        );
        assert_eq!(
            choose_track(&tracks[..2], &langs).unwrap().kind.as_deref(),
            Some("asr")
        );
        assert_eq!(
            choose_track(&tracks, &["fr".to_string()]).unwrap().language_code,
            "de"
        );
        assert!(choose_track(&[], &langs).is_none());
    }

    #[tokio::test]
    async fn test_fetch_against_fake_site() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let page = format!(
            r#"<html>"captionTracks":[{{"baseUrl":"{}/timedtext","languageCode":"en"}}]</html>"#,
            base
        );
        let app = Router::new()
            .route(
                "/watch",
                get(move || {
                    let page = page.clone();
                    async move { page }
                }),
            )
            .route("/timedtext", get(|| async { SAMPLE_XML }));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = YoutubeTranscriptClient::with_base_url(
            &base,
            vec!["en".to_string()],
            Duration::from_secs(5),
        )
        .unwrap();
        let segments = client.fetch("dQw4w9WgXcQ").await.unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].text, "Hey there");
    }
}
