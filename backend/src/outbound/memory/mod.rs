//! In-process adapters for every domain port.
//!
//! Used by the integration tests and by local runs without PostgreSQL. Each
//! store keeps its state behind a std lock and recovers from poisoning, as no
//! critical section leaves its data half-written.

mod audit;
mod credentials;
mod membership;
mod notifications;
mod preferences;
mod profiles;
mod snapshots;

pub use audit::InMemoryAuditSink;
pub use credentials::StaticCredentialVerifier;
pub use membership::InMemoryMembershipRepository;
pub use notifications::{InMemoryOnboardingPublisher, InMemoryOnboardingSubscriber, onboarding_channel};
pub use preferences::InMemoryScopePreferenceRepository;
pub use profiles::InMemoryUserProfileRepository;
pub use snapshots::InMemoryOnboardingSnapshotRepository;
