//! Domain types, services, and ports.
//!
//! Purpose: resolve the organization/division a principal operates in,
//! enforce scope and permission checks, keep short-lived session and scope
//! caches, and aggregate onboarding answers. Nothing here knows about
//! transports or storage engines; those live behind [`ports`].
//!
//! Public surface:
//! - [`ScopeService`] and [`ScopeGuard`]: active-scope resolution, updates,
//!   and the authorization gate.
//! - [`AuthSessionService`]: cached session snapshots and the session audit
//!   trail.
//! - [`PrincipalResolver`]: bearer credential to [`Principal`].
//! - [`onboarding`]: the onboarding lifecycle and answer aggregation.
//! - [`Error`] / [`ErrorCode`]: the transport-agnostic error taxonomy.

mod auth_session;
pub(crate) mod canonical_json;
mod clock;
mod correlation;
pub mod error;
pub(crate) mod error_mapping;
mod ids;
pub mod onboarding;
pub mod ports;
mod principal;
mod principal_resolver;
mod rate_limiter;
mod request_context;
mod scope;
mod scope_cache;
mod scope_events;
mod scope_guard;
mod scope_service;

pub use self::auth_session::{
    AuthSessionPorts, AuthSessionService, FeatureFlags, SessionClaims, SessionSnapshot,
};
pub use self::clock::{ManualClock, MonotonicClock, SystemMonotonicClock};
pub use self::correlation::CorrelationId;
pub use self::error::{Error, ErrorCode};
pub use self::ids::{DivisionId, IdValidationError, OnboardingSessionId, OrganizationId, UserId};
pub use self::principal::{Claims, Principal, ScopeHints};
pub use self::principal_resolver::{PrincipalResolutionError, PrincipalResolver, principal_from_claims};
pub use self::rate_limiter::RateLimiter;
pub use self::request_context::{ClientIpHasher, RequestContext};
pub use self::scope::{
    DIVISION_MANAGE, DIVISION_VIEW, Division, ORG_MANAGE, ORG_VIEW, Organization, PreferenceKind,
    SCOPE_MANAGE, SCOPE_READ, ScopeContext, ScopePreference, ScopeState, build_context,
    compute_permissions, is_organization_admin, resolve_active_scope,
};
pub use self::scope_cache::ScopeCache;
pub use self::scope_events::{AuditEventType, AuditRecord, ScopeChangeEvent};
pub use self::scope_guard::ScopeGuard;
pub use self::scope_service::{ScopeService, ScopeServicePorts, ScopeUpdateRequest, scope_cache_key};
