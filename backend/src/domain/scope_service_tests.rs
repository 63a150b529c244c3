//! Tests for the scope service.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use mockable::Clock;
use rstest::{fixture, rstest};

use super::*;
use crate::domain::ports::{
    FixtureScopeEventPublisher, FixtureScopePreferenceRepository, MembershipRepositoryError,
    MockMembershipRepository, MockScopeEventPublisher, MockScopePreferenceRepository,
    ScopeEventPublishError,
};
use crate::domain::{
    CorrelationId, Division, ErrorCode, ManualClock, ScopeHints, ScopePreference, SCOPE_MANAGE,
};
use crate::test_support::MutableClock;

const TTL: Duration = Duration::from_secs(60);

fn org_id(id: &str) -> OrganizationId {
    OrganizationId::new(id).expect("valid org id")
}

fn div_id(id: &str) -> DivisionId {
    DivisionId::new(id).expect("valid division id")
}

fn division(org: &str, id: &str, role: Option<&str>) -> Division {
    Division {
        id: div_id(id),
        name: id.to_uppercase(),
        key: id.to_owned(),
        description: None,
        organization_id: org_id(org),
        role: role.map(str::to_owned),
    }
}

fn organization(id: &str, role: &str, divisions: Vec<Division>) -> Organization {
    Organization {
        id: org_id(id),
        name: id.to_uppercase(),
        slug: id.to_owned(),
        description: None,
        divisions,
        role: Some(role.to_owned()),
    }
}

#[fixture]
fn principal() -> Principal {
    Principal::new(UserId::new("user-1").expect("valid user id")).with_session_id("sess-1")
}

#[fixture]
fn memberships() -> Vec<Organization> {
    vec![
        organization("org-1", "member", vec![division("org-1", "div-1", None)]),
        organization(
            "org-2",
            "admin",
            vec![division("org-2", "div-2", None), division("org-2", "div-3", None)],
        ),
    ]
}

fn membership_repo(organizations: Vec<Organization>) -> MockMembershipRepository {
    let mut repo = MockMembershipRepository::new();
    repo.expect_load_organizations_for_user()
        .returning(move |_| Ok(organizations.clone()));
    repo.expect_load_division_memberships_for_user()
        .returning(|_| Ok(BTreeMap::new()));
    repo
}

/// Preference store double that remembers the last upsert.
fn remembering_preferences(clock: Arc<MutableClock>) -> MockScopePreferenceRepository {
    let stored: Arc<Mutex<Option<ScopePreference>>> = Arc::new(Mutex::new(None));
    let mut repo = MockScopePreferenceRepository::new();
    let reader = stored.clone();
    repo.expect_get_preference()
        .returning(move |_, _| Ok(reader.lock().expect("preference lock").clone()));
    repo.expect_upsert_preference()
        .returning(move |user, org, division, kind| {
            let now = clock.utc();
            let mut guard = stored.lock().expect("preference lock");
            let remembered_at = guard.as_ref().map_or(now, |existing| existing.remembered_at);
            let preference = ScopePreference {
                user_id: user.clone(),
                organization_id: org.clone(),
                division_id: division,
                kind,
                remembered_at,
                updated_at: now,
            };
            *guard = Some(preference.clone());
            Ok(preference)
        });
    repo
}

struct Harness {
    service: ScopeService,
    clock: Arc<MutableClock>,
}

fn harness(
    memberships: MockMembershipRepository,
    preferences: Arc<dyn ScopePreferenceRepository>,
    events: Arc<dyn ScopeEventPublisher>,
    rate_limit: usize,
) -> Harness {
    let clock = Arc::new(MutableClock::fixed());
    let service = ScopeService::new(
        ScopeServicePorts::new(Arc::new(memberships), preferences, events),
        Arc::new(ScopeCache::with_clock(Arc::new(ManualClock::new()))),
        Arc::new(RateLimiter::with_clock(
            rate_limit,
            Duration::from_secs(60),
            Arc::new(ManualClock::new()),
        )),
        ClientIpHasher::new("salt"),
        clock.clone(),
        TTL,
    );
    Harness { service, clock }
}

fn request(org: &str, division: Option<&str>) -> ScopeUpdateRequest {
    ScopeUpdateRequest {
        organization_id: org_id(org),
        division_id: division.map(div_id),
        reason: "manual".to_owned(),
    }
}

fn ctx() -> RequestContext {
    RequestContext::new(Some("198.51.100.4".into()), Some("tests/1.0".into()))
        .with_correlation_id(CorrelationId::new("corr-1").expect("valid id"))
}

#[rstest]
#[tokio::test]
async fn zero_memberships_yield_empty_state(principal: Principal) {
    let h = harness(
        membership_repo(Vec::new()),
        Arc::new(FixtureScopePreferenceRepository),
        Arc::new(FixtureScopeEventPublisher),
        10,
    );
    let state = h.service.get_scope(&principal).await.expect("scope loads");
    assert!(state.organizations.is_empty());
    assert!(state.active.is_none());
    assert!(state.remembered_at.is_none());
    assert_eq!(state.cached_at, h.clock.utc());
}

#[rstest]
#[tokio::test]
async fn first_organization_and_division_are_the_default(
    principal: Principal,
    memberships: Vec<Organization>,
) {
    let h = harness(
        membership_repo(memberships),
        Arc::new(FixtureScopePreferenceRepository),
        Arc::new(FixtureScopeEventPublisher),
        10,
    );
    let active = h
        .service
        .get_scope(&principal)
        .await
        .expect("scope loads")
        .active
        .expect("active scope");
    assert_eq!(active.organization_id.as_str(), "org-1");
    assert_eq!(active.division_id, Some(div_id("div-1")));
    assert_eq!(active.role.as_deref(), Some("member"));
}

#[rstest]
#[tokio::test]
async fn repeated_reads_are_served_from_cache(principal: Principal, memberships: Vec<Organization>) {
    let mut repo = MockMembershipRepository::new();
    repo.expect_load_organizations_for_user()
        .times(1)
        .return_once(move |_| Ok(memberships));
    repo.expect_load_division_memberships_for_user()
        .times(1)
        .return_once(|_| Ok(BTreeMap::new()));
    let h = harness(
        repo,
        Arc::new(FixtureScopePreferenceRepository),
        Arc::new(FixtureScopeEventPublisher),
        10,
    );

    let first = h.service.get_scope(&principal).await.expect("first read");
    let second = h.service.get_scope(&principal).await.expect("cached read");
    assert_eq!(first, second);
}

#[rstest]
#[tokio::test]
async fn division_memberships_fill_missing_division_roles(principal: Principal) {
    let mut repo = MockMembershipRepository::new();
    repo.expect_load_organizations_for_user().return_once(|_| {
        Ok(vec![organization(
            "org-1",
            "member",
            vec![division("org-1", "div-1", None)],
        )])
    });
    repo.expect_load_division_memberships_for_user()
        .return_once(|_| {
            Ok(BTreeMap::from([(
                org_id("org-1"),
                vec![division("org-1", "div-1", Some("lead"))],
            )]))
        });
    let h = harness(
        repo,
        Arc::new(FixtureScopePreferenceRepository),
        Arc::new(FixtureScopeEventPublisher),
        10,
    );

    let active = h
        .service
        .get_scope(&principal)
        .await
        .expect("scope loads")
        .active
        .expect("active scope");
    assert_eq!(active.division_role.as_deref(), Some("lead"));
    assert_eq!(active.role.as_deref(), Some("lead"));
}

#[rstest]
#[tokio::test]
async fn update_is_visible_to_the_next_read(principal: Principal, memberships: Vec<Organization>) {
    let clock = Arc::new(MutableClock::fixed());
    let h = harness(
        membership_repo(memberships),
        Arc::new(remembering_preferences(clock)),
        Arc::new(FixtureScopeEventPublisher),
        10,
    );

    h.service.get_scope(&principal).await.expect("warm cache");
    let updated = h
        .service
        .update_scope(&principal, request("org-2", None), &ctx())
        .await
        .expect("update succeeds");
    let active = updated.active.expect("active scope");
    assert_eq!(active.organization_id.as_str(), "org-2");
    assert_eq!(active.division_id, Some(div_id("div-2")));
    assert!(active.permissions.contains(&SCOPE_MANAGE.to_owned()));

    let read = h.service.get_scope(&principal).await.expect("read after write");
    assert_eq!(
        read.active.map(|ctx| ctx.organization_id),
        Some(org_id("org-2"))
    );
    assert!(read.remembered_at.is_some());
}

#[rstest]
#[case(request("org-9", None))]
#[case(request("org-9", Some("div-1")))]
#[case(request("org-1", Some("div-2")))]
#[case(request("org-1", Some("div-404")))]
#[tokio::test]
async fn unknown_targets_are_not_found(
    principal: Principal,
    memberships: Vec<Organization>,
    #[case] target: ScopeUpdateRequest,
) {
    let mut preferences = MockScopePreferenceRepository::new();
    preferences.expect_get_preference().returning(|_, _| Ok(None));
    preferences.expect_upsert_preference().never();
    let mut events = MockScopeEventPublisher::new();
    events.expect_publish().never();
    let h = harness(
        membership_repo(memberships),
        Arc::new(preferences),
        Arc::new(events),
        10,
    );

    let err = h
        .service
        .update_scope(&principal, target, &ctx())
        .await
        .expect_err("target rejected");
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn updates_beyond_the_budget_are_rate_limited(
    principal: Principal,
    memberships: Vec<Organization>,
) {
    let clock = Arc::new(MutableClock::fixed());
    let h = harness(
        membership_repo(memberships),
        Arc::new(remembering_preferences(clock)),
        Arc::new(FixtureScopeEventPublisher),
        3,
    );

    let mut outcomes = Vec::new();
    for _ in 0..5 {
        outcomes.push(
            h.service
                .update_scope(&principal, request("org-1", None), &ctx())
                .await
                .map(|_| ())
                .map_err(|err| err.code()),
        );
    }
    assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 3);
    assert_eq!(
        outcomes.iter().skip(3).cloned().collect::<Vec<_>>(),
        vec![Err(ErrorCode::RateLimited), Err(ErrorCode::RateLimited)]
    );
}

#[rstest]
#[tokio::test]
async fn update_publishes_exactly_one_event(principal: Principal, memberships: Vec<Organization>) {
    let clock = Arc::new(MutableClock::fixed());
    let mut events = MockScopeEventPublisher::new();
    events
        .expect_publish()
        .withf(|event| {
            event.current.organization_id.as_str() == "org-1"
                && event.current.division_id.as_ref().map(DivisionId::as_str) == Some("div-1")
                && event.previous.as_ref().map(|ctx| ctx.organization_id.as_str()) == Some("org-1")
                && event.reason == "manual"
                && event.correlation_id == "corr-1"
                && event.client_ip_hash.as_deref().is_some_and(|hash| hash.len() == 64)
        })
        .times(1)
        .returning(|_| Ok(()));
    let h = harness(
        membership_repo(memberships),
        Arc::new(remembering_preferences(clock)),
        Arc::new(events),
        10,
    );

    h.service
        .update_scope(&principal, request("org-1", Some("div-1")), &ctx())
        .await
        .expect("update succeeds");
}

#[rstest]
#[tokio::test]
async fn publish_failure_does_not_fail_the_update(
    principal: Principal,
    memberships: Vec<Organization>,
) {
    let clock = Arc::new(MutableClock::fixed());
    let mut events = MockScopeEventPublisher::new();
    events
        .expect_publish()
        .times(1)
        .returning(|_| Err(ScopeEventPublishError::transport("broker down")));
    let h = harness(
        membership_repo(memberships),
        Arc::new(remembering_preferences(clock)),
        Arc::new(events),
        10,
    );

    let state = h
        .service
        .update_scope(&principal, request("org-2", Some("div-3")), &ctx())
        .await
        .expect("update still succeeds");
    assert_eq!(
        state.active.and_then(|ctx| ctx.division_id),
        Some(div_id("div-3"))
    );
}

#[rstest]
#[tokio::test]
async fn blank_reason_is_invalid(principal: Principal, memberships: Vec<Organization>) {
    let h = harness(
        membership_repo(memberships),
        Arc::new(FixtureScopePreferenceRepository),
        Arc::new(FixtureScopeEventPublisher),
        10,
    );
    let mut target = request("org-1", None);
    target.reason = "   ".to_owned();
    let err = h
        .service
        .update_scope(&principal, target, &ctx())
        .await
        .expect_err("blank reason rejected");
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
}

#[rstest]
#[tokio::test]
async fn hinted_credentials_cannot_switch_outside_their_hints(memberships: Vec<Organization>) {
    let principal = Principal::new(UserId::new("user-1").expect("valid id")).with_scope_hints(
        ScopeHints {
            organization_ids: [org_id("org-1")].into_iter().collect(),
            divisions: BTreeMap::new(),
        },
    );
    let h = harness(
        membership_repo(memberships),
        Arc::new(FixtureScopePreferenceRepository),
        Arc::new(FixtureScopeEventPublisher),
        10,
    );
    let err = h
        .service
        .update_scope(&principal, request("org-2", None), &ctx())
        .await
        .expect_err("outside hints");
    assert_eq!(err.code(), ErrorCode::NotFound);
}

fn hinted_principal(organizations: &[&str], divisions: &[(&str, &[&str])]) -> Principal {
    Principal::new(UserId::new("user-1").expect("valid id")).with_scope_hints(ScopeHints {
        organization_ids: organizations.iter().map(|id| org_id(id)).collect(),
        divisions: divisions
            .iter()
            .map(|(org, ids)| (org_id(org), ids.iter().map(|id| div_id(id)).collect()))
            .collect(),
    })
}

#[rstest]
#[tokio::test]
async fn hinted_reads_default_inside_the_hints(memberships: Vec<Organization>) {
    let h = harness(
        membership_repo(memberships),
        Arc::new(FixtureScopePreferenceRepository),
        Arc::new(FixtureScopeEventPublisher),
        10,
    );

    let state = h
        .service
        .get_scope(&hinted_principal(&["org-2"], &[]))
        .await
        .expect("state loads");
    let active = state.active.expect("active scope");
    assert_eq!(active.organization_id, org_id("org-2"));
    assert_eq!(active.division_id, Some(div_id("div-2")));
    assert_eq!(state.organizations.len(), 1);

    let unhinted = h
        .service
        .get_scope(&Principal::new(UserId::new("user-1").expect("valid id")))
        .await
        .expect("cached state loads");
    assert_eq!(
        unhinted.active.map(|ctx| ctx.organization_id),
        Some(org_id("org-1"))
    );
    assert_eq!(unhinted.organizations.len(), 2);
}

#[rstest]
#[tokio::test]
async fn division_only_hints_select_the_granted_division(memberships: Vec<Organization>) {
    let h = harness(
        membership_repo(memberships),
        Arc::new(FixtureScopePreferenceRepository),
        Arc::new(FixtureScopeEventPublisher),
        10,
    );

    let state = h
        .service
        .get_scope(&hinted_principal(&[], &[("org-2", &["div-3"])]))
        .await
        .expect("state loads");
    let active = state.active.expect("active scope");
    assert_eq!(active.organization_id, org_id("org-2"));
    assert_eq!(active.division_id, Some(div_id("div-3")));
    assert_eq!(state.organizations[0].divisions.len(), 1);
}

#[rstest]
#[tokio::test]
async fn hinted_updates_report_the_hinted_previous_scope(memberships: Vec<Organization>) {
    let clock = Arc::new(MutableClock::fixed());
    let mut events = MockScopeEventPublisher::new();
    events
        .expect_publish()
        .withf(|event| {
            event.previous.as_ref().map(|ctx| ctx.organization_id.as_str()) == Some("org-2")
                && event
                    .previous
                    .as_ref()
                    .and_then(|ctx| ctx.division_id.as_ref())
                    .map(DivisionId::as_str)
                    == Some("div-2")
                && event.current.division_id.as_ref().map(DivisionId::as_str) == Some("div-3")
        })
        .times(1)
        .returning(|_| Ok(()));
    let h = harness(
        membership_repo(memberships),
        Arc::new(remembering_preferences(clock)),
        Arc::new(events),
        10,
    );

    let state = h
        .service
        .update_scope(
            &hinted_principal(&["org-2"], &[]),
            request("org-2", Some("div-3")),
            &ctx(),
        )
        .await
        .expect("update succeeds");
    assert_eq!(state.organizations.len(), 1);
}

#[rstest]
#[tokio::test]
async fn hinted_divisions_outside_the_hints_are_not_found(memberships: Vec<Organization>) {
    let h = harness(
        membership_repo(memberships),
        Arc::new(FixtureScopePreferenceRepository),
        Arc::new(FixtureScopeEventPublisher),
        10,
    );
    let err = h
        .service
        .update_scope(
            &hinted_principal(&[], &[("org-2", &["div-3"])]),
            request("org-2", Some("div-2")),
            &ctx(),
        )
        .await
        .expect_err("division outside hints");
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn cold_updates_load_memberships_once(principal: Principal, memberships: Vec<Organization>) {
    let mut repo = MockMembershipRepository::new();
    repo.expect_load_organizations_for_user()
        .times(1)
        .returning(move |_| Ok(memberships.clone()));
    repo.expect_load_division_memberships_for_user()
        .times(1)
        .returning(|_| Ok(BTreeMap::new()));
    let h = harness(
        repo,
        Arc::new(FixtureScopePreferenceRepository),
        Arc::new(FixtureScopeEventPublisher),
        10,
    );

    h.service
        .update_scope(&principal, request("org-2", Some("div-3")), &ctx())
        .await
        .expect("update succeeds");
}

#[rstest]
#[tokio::test]
async fn membership_outage_is_service_unavailable(principal: Principal) {
    let mut repo = MockMembershipRepository::new();
    repo.expect_load_organizations_for_user()
        .return_once(|_| Err(MembershipRepositoryError::connection("refused")));
    let h = harness(
        repo,
        Arc::new(FixtureScopePreferenceRepository),
        Arc::new(FixtureScopeEventPublisher),
        10,
    );
    let err = h
        .service
        .get_scope(&principal)
        .await
        .expect_err("outage propagates");
    assert_eq!(err.code(), ErrorCode::ServiceUnavailable);
}

#[rstest]
#[tokio::test]
async fn invalidate_forces_a_reload(principal: Principal, memberships: Vec<Organization>) {
    let mut repo = MockMembershipRepository::new();
    repo.expect_load_organizations_for_user()
        .times(2)
        .returning(move |_| Ok(memberships.clone()));
    repo.expect_load_division_memberships_for_user()
        .times(2)
        .returning(|_| Ok(BTreeMap::new()));
    let h = harness(
        repo,
        Arc::new(FixtureScopePreferenceRepository),
        Arc::new(FixtureScopeEventPublisher),
        10,
    );

    h.service.get_scope(&principal).await.expect("first read");
    h.service.invalidate(&principal.id);
    h.service.get_scope(&principal).await.expect("reload");
}

#[rstest]
fn update_request_accepts_short_org_field() {
    let parsed: ScopeUpdateRequest =
        serde_json::from_str(r#"{"orgId":"org-1","divisionId":null,"reason":"manual"}"#)
            .expect("request parses");
    assert_eq!(parsed, request("org-1", None));
}

#[rstest]
fn cache_key_is_namespaced() {
    assert_eq!(
        scope_cache_key(&UserId::new("u-7").expect("valid id")),
        "scope:u-7"
    );
}
