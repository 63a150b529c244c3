//! Audit-facing events emitted by the scope and session services.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{CorrelationId, ScopeContext, UserId};

/// Emitted after every successful scope update.
///
/// Carries a salted hash of the client IP, never the raw address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeChangeEvent {
    /// Principal whose scope changed.
    pub user_id: UserId,
    /// Context before the change, if one was active.
    pub previous: Option<ScopeContext>,
    /// Context after the change.
    pub current: ScopeContext,
    /// Correlation identifier of the triggering request.
    pub correlation_id: CorrelationId,
    /// Caller-supplied reason, e.g. `manual`.
    pub reason: String,
    /// Salted client IP hash.
    pub client_ip_hash: Option<String>,
    /// Caller user agent.
    pub user_agent: Option<String>,
    /// When the change was applied.
    pub occurred_at: DateTime<Utc>,
}

/// Kind of audited event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Active scope changed.
    ScopeChanged,
    /// Session ended.
    Logout,
    /// Session snapshot refreshed.
    SessionRefresh,
}

impl AuditEventType {
    /// Stable storage value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ScopeChanged => "scope_changed",
            Self::Logout => "logout",
            Self::SessionRefresh => "session_refresh",
        }
    }
}

/// Append-only audit row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    /// Subject of the event.
    pub user_id: UserId,
    /// Event kind.
    pub event_type: AuditEventType,
    /// Salted client IP hash.
    pub client_ip_hash: Option<String>,
    /// Caller user agent.
    pub user_agent: Option<String>,
    /// Correlation identifier of the triggering request.
    pub correlation_id: CorrelationId,
    /// Event-specific context.
    pub metadata: Value,
    /// When the event happened.
    pub occurred_at: DateTime<Utc>,
}

impl From<&ScopeChangeEvent> for AuditRecord {
    fn from(event: &ScopeChangeEvent) -> Self {
        let previous = event.previous.as_ref();
        Self {
            user_id: event.user_id.clone(),
            event_type: AuditEventType::ScopeChanged,
            client_ip_hash: event.client_ip_hash.clone(),
            user_agent: event.user_agent.clone(),
            correlation_id: event.correlation_id.clone(),
            metadata: json!({
                "reason": event.reason,
                "previousOrganizationId": previous.map(|ctx| ctx.organization_id.as_str()),
                "previousDivisionId": previous
                    .and_then(|ctx| ctx.division_id.as_ref())
                    .map(|id| id.as_str()),
                "organizationId": event.current.organization_id.as_str(),
                "divisionId": event.current.division_id.as_ref().map(|id| id.as_str()),
            }),
            occurred_at: event.occurred_at,
        }
    }
}
