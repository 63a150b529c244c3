//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **persistence**: PostgreSQL-backed repositories using Diesel ORM
//! - **notify**: PostgreSQL `LISTEN`/`NOTIFY` onboarding channel via sqlx
//! - **events**: scope change publishers (logging, audit, fan-out)
//! - **memory**: in-process adapters for local runs and tests
//!
//! Adapters are thin translators that convert between domain types and
//! infrastructure-specific representations. They contain no business logic.

pub mod events;
pub mod memory;
pub mod notify;
pub mod persistence;
