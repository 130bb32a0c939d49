//! Audit log repository.
//!
//! Every appended turn is written here with its session id. Rows are only
//! ever inserted; a session reset does not touch the audit history.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use uuid::Uuid;

use parley_core::error::ParleyError;
use parley_core::types::{AuditRecord, Role};

use crate::db::Database;

/// Repository for audit records.
#[derive(Debug, Clone)]
pub struct AuditRepository {
    db: Arc<Database>,
}

impl AuditRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Append one record.
    pub fn insert(&self, record: &AuditRecord) -> Result<(), ParleyError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO audit_turns (id, session_id, role, text, timestamp, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    record.id.to_string(),
                    record.session_id.to_string(),
                    record.role.as_str(),
                    record.text,
                    record.timestamp,
                    record.created_at.timestamp(),
                ],
            )
            .map_err(|e| ParleyError::Storage(format!("Failed to save audit record: {}", e)))?;
            Ok(())
        })
    }

    /// All records of one session in insertion order.
    pub fn find_by_session(&self, session_id: Uuid) -> Result<Vec<AuditRecord>, ParleyError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, session_id, role, text, timestamp, created_at
                     FROM audit_turns WHERE session_id = ?1
                     ORDER BY seq ASC",
                )
                .map_err(|e| ParleyError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![session_id.to_string()], |row| {
                    Ok(row_to_record(row))
                })
                .map_err(|e| ParleyError::Storage(e.to_string()))?;

            let mut records = Vec::new();
            for row in rows {
                records.push(row.map_err(|e| ParleyError::Storage(e.to_string()))??);
            }
            Ok(records)
        })
    }

    /// Total number of recorded turns.
    pub fn count(&self) -> Result<u64, ParleyError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM audit_turns", [], |row| row.get(0))
                .map_err(|e| ParleyError::Storage(e.to_string()))?;
            Ok(count.max(0) as u64)
        })
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> Result<AuditRecord, ParleyError> {
    let get_err = |e: rusqlite::Error| ParleyError::Storage(e.to_string());

    let id: String = row.get(0).map_err(get_err)?;
    let session_id: String = row.get(1).map_err(get_err)?;
    let role: String = row.get(2).map_err(get_err)?;
    let text: String = row.get(3).map_err(get_err)?;
    let timestamp: String = row.get(4).map_err(get_err)?;
    let created_at: i64 = row.get(5).map_err(get_err)?;

    let parse_uuid = |s: &str| {
        Uuid::parse_str(s).map_err(|e| ParleyError::Storage(format!("Invalid UUID {}: {}", s, e)))
    };
    let role = match role.as_str() {
        "user" => Role::User,
        "assistant" => Role::Assistant,
        other => {
            return Err(ParleyError::Storage(format!("Unknown role: {}", other)));
        }
    };

    Ok(AuditRecord {
        id: parse_uuid(&id)?,
        session_id: parse_uuid(&session_id)?,
        role,
        text,
        timestamp,
        created_at: Utc
            .timestamp_opt(created_at, 0)
            .single()
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::types::Turn;

    fn repo() -> AuditRepository {
        AuditRepository::new(Arc::new(Database::in_memory().unwrap()))
    }

    #[test]
    fn test_insert_and_find_preserves_order() {
        let repo = repo();
        let session = Uuid::new_v4();
        let turns = [
            Turn::user("first", "10:00"),
            Turn::assistant("second", "10:00"),
            Turn::user("third", "10:01"),
        ];
        for turn in &turns {
            repo.insert(&AuditRecord::from_turn(session, turn)).unwrap();
        }

        let records = repo.find_by_session(session).unwrap();
        let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
        assert_eq!(records[1].role, Role::Assistant);
        assert_eq!(records[2].timestamp, "10:01");
    }

    #[test]
    fn test_sessions_are_separated() {
        let repo = repo();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        repo.insert(&AuditRecord::from_turn(a, &Turn::user("a1", "09:00")))
            .unwrap();
        repo.insert(&AuditRecord::from_turn(b, &Turn::user("b1", "09:00")))
            .unwrap();

        assert_eq!(repo.find_by_session(a).unwrap().len(), 1);
        assert_eq!(repo.find_by_session(b).unwrap()[0].text, "b1");
        assert_eq!(repo.count().unwrap(), 2);
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let repo = repo();
        let record = AuditRecord::from_turn(Uuid::new_v4(), &Turn::user("x", "09:00"));
        repo.insert(&record).unwrap();
        let err = repo.insert(&record).unwrap_err();
        assert!(matches!(err, ParleyError::Storage(_)));
    }

    #[test]
    fn test_unknown_session_is_empty() {
        assert!(repo().find_by_session(Uuid::new_v4()).unwrap().is_empty());
    }
}
