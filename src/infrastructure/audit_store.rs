//! Persistence seam for exchange records

use crate::domain::exchange::ExchangeRecord;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditStoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Audit store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to serialize exchange record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid audit table name: {0}")]
    InvalidTable(String),
}

/// Durable home for exchange records
///
/// Implementations must be safe to call concurrently from the audit worker;
/// a failed insert is reported to the caller and never retried here.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn insert(&self, record: &ExchangeRecord) -> Result<(), AuditStoreError>;
}

/// In-process store used by tests and local runs without a database
#[derive(Debug, Default)]
pub struct MemoryAuditStore {
    records: Mutex<Vec<ExchangeRecord>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything inserted so far
    pub fn records(&self) -> Vec<ExchangeRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn insert(&self, record: &ExchangeRecord) -> Result<(), AuditStoreError> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}
