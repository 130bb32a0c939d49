//! Chat page embedding.
//!
//! The page talks to the session API under `/api/sessions`. It keeps the
//! session id in `localStorage` and creates a new session when the stored
//! one has expired.

/// The complete self-contained chat page.
///
/// - message box and a single file picker restricted to the upload allow-list
/// - conversation bubbles with timestamps; error turns are highlighted
/// - theme and audio-reply toggles, reset, cancel, and PDF export
/// - an audio player for the latest spoken reply
pub const CHAT_HTML: &str = include_str!("../assets/chat.html");

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::types::UPLOAD_EXTENSIONS;

    #[test]
    fn chat_html_is_valid_html() {
        assert!(CHAT_HTML.starts_with("<!DOCTYPE html>"));
        assert!(CHAT_HTML.contains("<html"));
        assert!(CHAT_HTML.contains("</html>"));
    }

    #[test]
    fn chat_html_accepts_every_allowed_extension() {
        let accept = CHAT_HTML
            .split("accept=\"")
            .nth(1)
            .and_then(|rest| rest.split('"').next())
            .expect("file input has an accept attribute");
        for ext in UPLOAD_EXTENSIONS {
            assert!(
                accept.split(',').any(|a| a == format!(".{}", ext)),
                "missing .{} in accept list",
                ext
            );
        }
    }

    #[test]
    fn chat_html_uses_session_api() {
        for path in [
            "/api/sessions",
            "/turns",
            "/reset",
            "/cancel",
            "/settings",
            "/speech",
            "/export",
        ] {
            assert!(CHAT_HTML.contains(path), "page does not call {}", path);
        }
    }

    #[test]
    fn chat_html_has_controls() {
        for id in [
            "id=\"message\"",
            "id=\"file\"",
            "id=\"send\"",
            "id=\"cancel\"",
            "id=\"reset\"",
            "id=\"export\"",
            "id=\"theme\"",
            "id=\"audio-toggle\"",
            "id=\"reply-audio\"",
        ] {
            assert!(CHAT_HTML.contains(id), "missing control {}", id);
        }
    }

    #[test]
    fn chat_html_has_no_external_scripts() {
        assert!(!CHAT_HTML.contains("<script src="));
        assert!(!CHAT_HTML.contains("<link rel=\"stylesheet\""));
    }
}
