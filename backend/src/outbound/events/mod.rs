//! Scope change event publishers.
//!
//! - [`LoggingScopeEventPublisher`] writes one structured log line per change.
//! - [`AuditSinkScopeEventPublisher`] appends the change to the audit trail.
//! - [`FanoutScopeEventPublisher`] forwards to several publishers.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::domain::ports::{AuditSink, ScopeEventPublishError, ScopeEventPublisher};
use crate::domain::{AuditRecord, ScopeChangeEvent};

/// Emits scope changes as `info` events; never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingScopeEventPublisher;

#[async_trait]
impl ScopeEventPublisher for LoggingScopeEventPublisher {
    async fn publish(&self, event: &ScopeChangeEvent) -> Result<(), ScopeEventPublishError> {
        let previous = event.previous.as_ref();
        info!(
            user_id = %event.user_id,
            previous_organization_id = previous.map(|ctx| tracing::field::display(&ctx.organization_id)),
            previous_division_id = previous
                .and_then(|ctx| ctx.division_id.as_ref())
                .map(tracing::field::display),
            organization_id = %event.current.organization_id,
            division_id = event.current.division_id.as_ref().map(tracing::field::display),
            reason = %event.reason,
            correlation_id = %event.correlation_id,
            "scope changed"
        );
        Ok(())
    }
}

/// Records scope changes as `scope_changed` audit records.
#[derive(Clone)]
pub struct AuditSinkScopeEventPublisher {
    sink: Arc<dyn AuditSink>,
}

impl AuditSinkScopeEventPublisher {
    /// Publisher writing into `sink`.
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl ScopeEventPublisher for AuditSinkScopeEventPublisher {
    async fn publish(&self, event: &ScopeChangeEvent) -> Result<(), ScopeEventPublishError> {
        self.sink
            .record(&AuditRecord::from(event))
            .await
            .map_err(|err| ScopeEventPublishError::transport(err.to_string()))
    }
}

/// Publishes to every inner publisher in order.
///
/// Every publisher is attempted even after a failure; the first failure is
/// returned.
#[derive(Clone, Default)]
pub struct FanoutScopeEventPublisher {
    publishers: Vec<Arc<dyn ScopeEventPublisher>>,
}

impl FanoutScopeEventPublisher {
    /// Fan out to `publishers`.
    pub fn new(publishers: Vec<Arc<dyn ScopeEventPublisher>>) -> Self {
        Self { publishers }
    }
}

#[async_trait]
impl ScopeEventPublisher for FanoutScopeEventPublisher {
    async fn publish(&self, event: &ScopeChangeEvent) -> Result<(), ScopeEventPublishError> {
        let mut first_error = None;
        for publisher in &self.publishers {
            if let Err(err) = publisher.publish(event).await {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
