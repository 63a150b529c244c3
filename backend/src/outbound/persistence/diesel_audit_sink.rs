//! PostgreSQL-backed `AuditSink` appending to `audit_events`.

use async_trait::async_trait;
use diesel_async::RunQueryDsl;

use crate::domain::AuditRecord;
use crate::domain::ports::{AuditSink, AuditSinkError};

use super::diesel_basic_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::models::NewAuditEventRow;
use super::pool::DbPool;
use super::schema::audit_events;

/// Diesel-backed implementation of the `AuditSink` port.
#[derive(Clone)]
pub struct DieselAuditSink {
    pool: DbPool,
}

impl DieselAuditSink {
    /// Create a new sink with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for DieselAuditSink {
    async fn record(&self, record: &AuditRecord) -> Result<(), AuditSinkError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_basic_pool_error(err, AuditSinkError::connection))?;

        let row = NewAuditEventRow {
            user_id: record.user_id.as_str(),
            event_type: record.event_type.as_str(),
            client_ip_hash: record.client_ip_hash.as_deref(),
            user_agent: record.user_agent.as_deref(),
            correlation_id: record.correlation_id.as_str(),
            metadata: &record.metadata,
            occurred_at: record.occurred_at,
        };
        diesel::insert_into(audit_events::table)
            .values(&row)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(|err| map_basic_diesel_error(err, AuditSinkError::write, AuditSinkError::connection))
    }
}
