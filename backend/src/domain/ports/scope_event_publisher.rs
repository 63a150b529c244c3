//! Port for publishing scope change events.
//!
//! Publishing is best-effort: [`crate::domain::ScopeService`] logs a failed
//! publish and still reports the update as successful.

use async_trait::async_trait;

use crate::domain::ScopeChangeEvent;

use super::define_port_error;

define_port_error! {
    /// Errors raised by event publisher adapters.
    pub enum ScopeEventPublishError {
        /// The downstream transport refused or dropped the event.
        Transport { message: String } =>
            "scope event publish failed: {message}",
    }
}

/// Destination for [`ScopeChangeEvent`]s.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScopeEventPublisher: Send + Sync {
    /// Publish one event.
    async fn publish(&self, event: &ScopeChangeEvent) -> Result<(), ScopeEventPublishError>;
}

/// Publisher that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureScopeEventPublisher;

#[async_trait]
impl ScopeEventPublisher for FixtureScopeEventPublisher {
    async fn publish(&self, _event: &ScopeChangeEvent) -> Result<(), ScopeEventPublishError> {
        Ok(())
    }
}
