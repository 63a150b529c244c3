//! In-process audit trail.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::domain::AuditRecord;
use crate::domain::ports::{AuditSink, AuditSinkError};

/// Append-only record list; can be switched into a failing mode.
#[derive(Default)]
pub struct InMemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
    rejecting: Mutex<bool>,
}

impl InMemoryAuditSink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every record written so far, in write order.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Reject every subsequent write.
    pub fn set_rejecting(&self, rejecting: bool) {
        *self.rejecting.lock().unwrap_or_else(PoisonError::into_inner) = rejecting;
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn record(&self, record: &AuditRecord) -> Result<(), AuditSinkError> {
        if *self.rejecting.lock().unwrap_or_else(PoisonError::into_inner) {
            return Err(AuditSinkError::write("audit sink is rejecting writes"));
        }
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}
