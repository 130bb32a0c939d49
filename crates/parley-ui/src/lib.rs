//! Parley UI crate - the embedded single-page chat interface.
//!
//! The page is one self-contained HTML file with inline CSS and JavaScript,
//! embedded at compile time via `include_str!` and served by the API crate.
//!
//! ```rust,ignore
//! use parley_ui::CHAT_HTML;
//!
//! async fn ui_handler() -> axum::response::Html<&'static str> {
//!     axum::response::Html(CHAT_HTML)
//! }
//! ```

pub mod page;

pub use page::CHAT_HTML;
