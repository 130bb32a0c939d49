//! Parley API crate - axum HTTP server and route handlers.
//!
//! Serves the chat page and the session API: creating sessions, submitting
//! turns (multipart text and file), reset, cancel, settings, the latest
//! spoken reply, and PDF export of the conversation.

pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
