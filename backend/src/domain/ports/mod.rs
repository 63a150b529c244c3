//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod audit_sink;
mod credential_verifier;
mod membership_repository;
mod onboarding_notifications;
mod onboarding_snapshot_repository;
mod scope_event_publisher;
mod scope_preference_repository;
mod user_profile_repository;

#[cfg(test)]
pub use audit_sink::MockAuditSink;
pub use audit_sink::{AuditSink, AuditSinkError, FixtureAuditSink};
#[cfg(test)]
pub use credential_verifier::MockCredentialVerifier;
pub use credential_verifier::{
    CredentialVerificationError, CredentialVerifier, FixtureCredentialVerifier,
};
#[cfg(test)]
pub use membership_repository::MockMembershipRepository;
pub use membership_repository::{
    FixtureMembershipRepository, MembershipRepository, MembershipRepositoryError,
};
#[cfg(test)]
pub use onboarding_notifications::{
    MockOnboardingNotificationPublisher, MockOnboardingNotificationSubscriber,
};
pub use onboarding_notifications::{
    FixtureOnboardingNotificationPublisher, FixtureOnboardingNotificationSubscriber,
    OnboardingNotificationError, OnboardingNotificationPublisher,
    OnboardingNotificationSubscriber,
};
#[cfg(test)]
pub use onboarding_snapshot_repository::MockOnboardingSnapshotRepository;
pub use onboarding_snapshot_repository::{
    FixtureOnboardingSnapshotRepository, OnboardingSnapshotRepository,
    OnboardingSnapshotRepositoryError,
};
#[cfg(test)]
pub use scope_event_publisher::MockScopeEventPublisher;
pub use scope_event_publisher::{
    FixtureScopeEventPublisher, ScopeEventPublishError, ScopeEventPublisher,
};
#[cfg(test)]
pub use scope_preference_repository::MockScopePreferenceRepository;
pub use scope_preference_repository::{
    FixtureScopePreferenceRepository, ScopePreferenceRepository, ScopePreferenceRepositoryError,
};
#[cfg(test)]
pub use user_profile_repository::MockUserProfileRepository;
pub use user_profile_repository::{
    FixtureUserProfileRepository, UserProfile, UserProfileRepository, UserProfileRepositoryError,
};

#[cfg(test)]
mod tests;
