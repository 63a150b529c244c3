//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! This module provides concrete implementations of the membership, scope
//! preference, profile, audit and onboarding snapshot ports backed by
//! PostgreSQL via Diesel with async support through `diesel-async` and `bb8`
//! connection pooling.
//!
//! # Architecture
//!
//! - **Thin adapters**: Repository implementations only translate between
//!   Diesel rows and domain types. Scope policy and answer flattening stay in
//!   the domain.
//! - **Internal models**: Diesel row structs (`models.rs`) and schema
//!   definitions (`schema.rs`) never leave this module.
//! - **Strongly typed errors**: Database errors map onto each port's error
//!   enum through `diesel_basic_error_mapping`.
//!
//! # Example
//!
//! ```ignore
//! use tenant_scope::outbound::persistence::{
//!     DbPool, DieselMembershipRepository, PoolConfig,
//! };
//!
//! let config = PoolConfig::new("postgres://localhost/tenants");
//! let pool = DbPool::new(config).await?;
//! let memberships = DieselMembershipRepository::new(pool);
//! ```

mod diesel_audit_sink;
mod diesel_basic_error_mapping;
mod diesel_membership_repository;
mod diesel_onboarding_snapshot_repository;
mod diesel_scope_preference_repository;
mod diesel_user_profile_repository;
mod models;
mod pool;
mod schema;

pub use diesel_audit_sink::DieselAuditSink;
pub use diesel_membership_repository::DieselMembershipRepository;
pub use diesel_onboarding_snapshot_repository::DieselOnboardingSnapshotRepository;
pub use diesel_scope_preference_repository::DieselScopePreferenceRepository;
pub use diesel_user_profile_repository::DieselUserProfileRepository;
pub use pool::{DbPool, PoolConfig, PoolError};
