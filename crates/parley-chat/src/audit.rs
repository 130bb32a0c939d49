//! Audit sink seam.

use async_trait::async_trait;

use parley_core::types::AuditRecord;
use parley_storage::AuditRepository;

use crate::error::ChatError;

/// Destination for the audit copy of every appended turn.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: &AuditRecord) -> Result<(), ChatError>;
}

#[async_trait]
impl AuditSink for AuditRepository {
    async fn record(&self, record: &AuditRecord) -> Result<(), ChatError> {
        let repo = self.clone();
        let record = record.clone();
        tokio::task::spawn_blocking(move || repo.insert(&record))
            .await
            .map_err(|e| ChatError::Storage(format!("audit write aborted: {}", e)))??;
        Ok(())
    }
}
