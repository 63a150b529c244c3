//! Port for the append-only audit trail.

use async_trait::async_trait;

use crate::domain::AuditRecord;

use super::define_port_error;

define_port_error! {
    /// Errors raised by audit sink adapters.
    pub enum AuditSinkError {
        /// Sink connection could not be established.
        Connection { message: String } =>
            "audit sink connection failed: {message}",
        /// The write was rejected.
        Write { message: String } =>
            "audit sink write failed: {message}",
    }
}

/// Append-only audit record sink shared by auth and scope trails.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one record.
    async fn record(&self, record: &AuditRecord) -> Result<(), AuditSinkError>;
}

/// Sink that discards every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureAuditSink;

#[async_trait]
impl AuditSink for FixtureAuditSink {
    async fn record(&self, _record: &AuditRecord) -> Result<(), AuditSinkError> {
        Ok(())
    }
}
