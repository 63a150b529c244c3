//! Scope authorisation, session state, and onboarding answer aggregation for
//! multi-tenant workspaces.
//!
//! The crate is laid out as a hexagon: [`domain`] holds the services and the
//! ports they depend on, [`outbound`] the adapters that implement those ports,
//! and [`container`] wires both together from [`config::ScopeSettings`].

pub mod config;
pub mod container;
pub mod domain;
pub mod outbound;
pub mod telemetry;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use config::ScopeSettings;
pub use container::{AppAdapters, AppContainer, ContainerError};
