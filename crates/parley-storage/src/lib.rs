//! Parley Storage crate - SQLite audit log of conversation turns.
//!
//! Provides a WAL-mode SQLite database with migrations and the repository
//! that records every user and assistant turn for later inspection.

pub mod audit;
pub mod db;
pub mod migrations;

pub use audit::AuditRepository;
pub use db::Database;
