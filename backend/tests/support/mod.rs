//! Shared wiring for integration tests over the in-memory adapters.
//!
//! Integration tests compile as separate crates under `backend/tests/`; this
//! module builds an [`AppContainer`] while keeping handles to every adapter so
//! tests can seed memberships and inspect audit records.
#![allow(dead_code, reason = "each test crate uses a different subset")]

use std::sync::Arc;

use serde_json::{Map, Value, json};
use tenant_scope::domain::ports::UserProfile;
use tenant_scope::domain::{Division, DivisionId, Organization, OrganizationId, Principal, UserId};
use tenant_scope::outbound::memory::{
    InMemoryAuditSink, InMemoryMembershipRepository, InMemoryOnboardingSnapshotRepository,
    InMemoryScopePreferenceRepository, InMemoryUserProfileRepository, StaticCredentialVerifier,
    onboarding_channel,
};
use tenant_scope::test_support::MutableClock;
use tenant_scope::{AppAdapters, AppContainer, ScopeSettings};

pub const SECRET: &str = "integration-secret";
pub const AUDIENCE: &str = "tenant-app";

/// Settings with the documented defaults and a short listener poll.
pub fn settings() -> ScopeSettings {
    ScopeSettings {
        database_url: None,
        credential_secret: Some(SECRET.to_owned()),
        credential_audience: Some(AUDIENCE.to_owned()),
        scope_cache_ttl_secs: 60,
        session_cache_ttl_secs: 30,
        rate_limit_max_events: 10,
        rate_limit_window_secs: 60,
        client_ip_salt: Some("pepper".to_owned()),
        feature_flags: Some(vec!["beta_nav".to_owned(), "!legacy_export".to_owned()]),
        onboarding_channel: None,
        listener_poll_timeout_ms: 20,
        export_batch_size: 2,
        max_page_size: 50,
    }
}

/// Container plus handles to the adapters behind it.
pub struct World {
    pub clock: Arc<MutableClock>,
    pub credentials: Arc<StaticCredentialVerifier>,
    pub memberships: Arc<InMemoryMembershipRepository>,
    pub preferences: Arc<InMemoryScopePreferenceRepository>,
    pub profiles: Arc<InMemoryUserProfileRepository>,
    pub audit: Arc<InMemoryAuditSink>,
    pub snapshots: Arc<InMemoryOnboardingSnapshotRepository>,
    pub container: AppContainer,
}

impl World {
    pub fn new(settings: &ScopeSettings) -> Self {
        let clock = Arc::new(MutableClock::fixed());
        let credentials = Arc::new(StaticCredentialVerifier::new(SECRET));
        let memberships = Arc::new(InMemoryMembershipRepository::new());
        let preferences = Arc::new(InMemoryScopePreferenceRepository::new(clock.clone()));
        let profiles = Arc::new(InMemoryUserProfileRepository::new());
        let audit = Arc::new(InMemoryAuditSink::new());
        let snapshots = Arc::new(InMemoryOnboardingSnapshotRepository::new(clock.clone()));
        let (publisher, subscriber) = onboarding_channel();

        let adapters = AppAdapters {
            credentials: credentials.clone(),
            memberships: memberships.clone(),
            preferences: preferences.clone(),
            profiles: profiles.clone(),
            audit: audit.clone(),
            snapshots: snapshots.clone(),
            onboarding_publisher: Arc::new(publisher),
            onboarding_subscriber: Arc::new(subscriber),
            clock: clock.clone(),
        };
        let container = AppContainer::build(settings, adapters);
        Self {
            clock,
            credentials,
            memberships,
            preferences,
            profiles,
            audit,
            snapshots,
            container,
        }
    }

    /// Register a token for `user` and resolve it into a principal.
    pub fn sign_in(&self, user: &str, session_id: &str) -> Principal {
        let token = format!("token-{user}-{session_id}");
        self.credentials
            .insert_token(&token, claims(user, session_id));
        self.container
            .principals()
            .resolve(Some(&format!("Bearer {token}")))
            .expect("registered token resolves")
    }

    pub fn seed_profile(&self, user: &str, display_name: &str) {
        self.profiles.upsert(UserProfile {
            id: user_id(user),
            email: Some(format!("{user}@example.com")),
            display_name: Some(display_name.to_owned()),
            avatar_url: None,
        });
    }
}

pub fn claims(user: &str, session_id: &str) -> Map<String, Value> {
    let Value::Object(map) = json!({
        "sub": user,
        "sid": session_id,
        "email": format!("{user}@example.com"),
        "aud": AUDIENCE,
        "iat": 1_772_366_400_i64,
        "exp": 1_772_370_000_i64,
    }) else {
        unreachable!("json! object literal");
    };
    map
}

pub fn user_id(raw: &str) -> UserId {
    UserId::new(raw).expect("valid user id")
}

pub fn org_id(raw: &str) -> OrganizationId {
    OrganizationId::new(raw).expect("valid organization id")
}

pub fn division_id(raw: &str) -> DivisionId {
    DivisionId::new(raw).expect("valid division id")
}

/// Organization `id` with the given role and `(division id, division role)`
/// pairs in display order.
pub fn organization(id: &str, role: &str, divisions: &[(&str, Option<&str>)]) -> Organization {
    Organization {
        id: org_id(id),
        name: format!("Org {id}"),
        slug: id.to_owned(),
        description: None,
        divisions: divisions
            .iter()
            .map(|(division, division_role)| Division {
                id: division_id(division),
                name: format!("Division {division}"),
                key: (*division).to_owned(),
                description: None,
                organization_id: org_id(id),
                role: division_role.map(str::to_owned),
            })
            .collect(),
        role: Some(role.to_owned()),
    }
}
