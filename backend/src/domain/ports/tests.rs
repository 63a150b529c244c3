//! Fixture behaviour and error rendering for the domain ports.

use super::*;
use crate::domain::onboarding::{OnboardingAnswerSnapshot, OnboardingCompletionPayload};
use crate::domain::{OrganizationId, PreferenceKind, UserId};
use pagination::PageRequest;
use rstest::{fixture, rstest};
use serde_json::json;
use std::time::Duration;

#[fixture]
fn user() -> UserId {
    UserId::new("user-1").expect("valid id")
}

#[rstest]
#[tokio::test]
async fn fixture_memberships_are_empty(user: UserId) {
    let repo = FixtureMembershipRepository;
    assert!(repo
        .load_organizations_for_user(&user)
        .await
        .expect("fixture load")
        .is_empty());
    assert!(repo
        .load_division_memberships_for_user(&user)
        .await
        .expect("fixture load")
        .is_empty());
}

#[rstest]
#[tokio::test]
async fn fixture_preference_store_echoes_writes(user: UserId) {
    let repo = FixtureScopePreferenceRepository;
    let org = OrganizationId::new("org-1").expect("valid id");
    let stored = repo
        .upsert_preference(&user, &org, None, PreferenceKind::Workspace)
        .await
        .expect("fixture upsert");
    assert_eq!(stored.organization_id, org);
    assert!(repo
        .get_preference(&user, PreferenceKind::Workspace)
        .await
        .expect("fixture get")
        .is_none());
}

#[rstest]
fn fixture_verifier_fails_closed() {
    let err = FixtureCredentialVerifier
        .verify("token", "secret", None)
        .expect_err("fixture rejects");
    assert!(matches!(err, CredentialVerificationError::Invalid { .. }));
}

#[rstest]
#[tokio::test]
async fn fixture_snapshot_repository_reports_first_submission_delta() {
    let payload: OnboardingCompletionPayload = serde_json::from_value(json!({
        "session_id": "sess-1",
        "user_id": "user-1",
        "completed_at": "2026-01-05T09:30:00Z",
        "answers": {"profile": {"role": "engineer"}},
    }))
    .expect("payload");
    let snapshot = OnboardingAnswerSnapshot::from_payload(payload);

    let repo = FixtureOnboardingSnapshotRepository;
    let delta = repo.upsert_snapshot(&snapshot).await.expect("fixture upsert");
    assert_eq!(delta.added.len(), 1);
    let page = repo
        .list_snapshots(&Default::default(), PageRequest::default())
        .await
        .expect("fixture list");
    assert_eq!(page.total, 0);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn fixture_subscriber_idles_for_the_timeout() {
    let started = tokio::time::Instant::now();
    let next = FixtureOnboardingNotificationSubscriber
        .next_notification(Duration::from_secs(5))
        .await
        .expect("fixture wait");
    assert!(next.is_none());
    assert!(started.elapsed() >= Duration::from_secs(5));
}

#[rstest]
#[case(
    MembershipRepositoryError::connection("refused").to_string(),
    "membership repository connection failed: refused"
)]
#[case(
    ScopePreferenceRepositoryError::query("syntax").to_string(),
    "scope preference repository query failed: syntax"
)]
#[case(AuditSinkError::write("disk full").to_string(), "audit sink write failed: disk full")]
#[case(
    CredentialVerificationError::expired().to_string(),
    "credential has expired"
)]
#[case(
    OnboardingNotificationError::publish("closed").to_string(),
    "onboarding channel publish failed: closed"
)]
fn port_errors_render_messages(#[case] rendered: String, #[case] expected: &str) {
    assert_eq!(rendered, expected);
}
