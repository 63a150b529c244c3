//! Authenticated principals derived from verified credentials.
//!
//! A [`Principal`] is rebuilt for every request from the verified claim map
//! and is never persisted by this crate.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{DivisionId, OrganizationId, UserId};

/// Claim metadata carried alongside the principal identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// Session identifier (`sid`) issued with the credential.
    pub session_id: Option<String>,
    /// Issue time (`iat`).
    pub issued_at: Option<DateTime<Utc>>,
    /// Expiry time (`exp`).
    pub expires_at: Option<DateTime<Utc>>,
    /// Audience (`aud`); the first entry when the claim is a list.
    pub audience: Option<String>,
    /// The complete verified claim map.
    pub raw: Map<String, Value>,
}

/// Organizations and divisions a credential was narrowed to at issue time.
///
/// Hints only ever restrict access; the membership store stays the source of
/// truth for what a principal belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeHints {
    /// Organizations the credential may address (`org_ids`).
    pub organization_ids: BTreeSet<OrganizationId>,
    /// Divisions the credential may address, keyed by organization.
    pub divisions: BTreeMap<OrganizationId, Vec<DivisionId>>,
}

impl ScopeHints {
    /// Whether the hints admit `organization_id`.
    ///
    /// An organization is admitted when `org_ids` lists it or when
    /// `division_ids` grants divisions inside it.
    #[must_use]
    pub fn allows_organization(&self, organization_id: &OrganizationId) -> bool {
        self.organization_ids.contains(organization_id) || self.divisions.contains_key(organization_id)
    }

    /// Whether the hints admit `division_id` within `organization_id`.
    ///
    /// Organizations without a division list admit every division.
    #[must_use]
    pub fn allows_division(&self, organization_id: &OrganizationId, division_id: &DivisionId) -> bool {
        self.divisions
            .get(organization_id)
            .is_none_or(|divisions| divisions.contains(division_id))
    }
}

/// The authenticated caller of an operation.
///
/// # Examples
/// ```
/// use tenant_scope::domain::{Principal, UserId};
///
/// let principal = Principal::new(UserId::new("user-1").unwrap())
///     .with_email("ada@example.com")
///     .with_session_id("sess-1");
/// assert_eq!(principal.session_key(), "user-1:sess-1");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    /// Stable subject identifier.
    pub id: UserId,
    /// Email address, when the credential carried one.
    pub email: Option<String>,
    /// Coarse role label from the credential.
    pub role: Option<String>,
    /// Claim metadata.
    pub claims: Claims,
    /// Pre-resolved scope restrictions, when the credential carried them.
    pub scope_hints: Option<ScopeHints>,
}

impl Principal {
    /// Principal with only an identity; used by tests and backfills.
    #[must_use]
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            email: None,
            role: None,
            claims: Claims::default(),
            scope_hints: None,
        }
    }

    /// Attach an email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Attach a session identifier.
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.claims.session_id = Some(session_id.into());
        self
    }

    /// Attach scope hints.
    #[must_use]
    pub fn with_scope_hints(mut self, hints: ScopeHints) -> Self {
        self.scope_hints = Some(hints);
        self
    }

    /// Cache key for per-session state: `user_id:session_id`.
    #[must_use]
    pub fn session_key(&self) -> String {
        let session = self.claims.session_id.as_deref().unwrap_or("-");
        format!("{}:{session}", self.id)
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for hint evaluation.
    use super::*;
    use rstest::rstest;

    fn org(id: &str) -> OrganizationId {
        OrganizationId::new(id).expect("valid org id")
    }

    fn div(id: &str) -> DivisionId {
        DivisionId::new(id).expect("valid division id")
    }

    #[rstest]
    fn division_hints_restrict_only_listed_organizations() {
        let hints = ScopeHints {
            organization_ids: [org("org-1"), org("org-2")].into_iter().collect(),
            divisions: [(org("org-1"), vec![div("div-1")])].into_iter().collect(),
        };

        assert!(hints.allows_division(&org("org-1"), &div("div-1")));
        assert!(!hints.allows_division(&org("org-1"), &div("div-2")));
        assert!(hints.allows_division(&org("org-2"), &div("anything")));
        assert!(!hints.allows_organization(&org("org-3")));
    }

    #[rstest]
    fn division_grants_admit_their_organization() {
        let hints = ScopeHints {
            organization_ids: BTreeSet::new(),
            divisions: [(org("org-member"), vec![div("div-led")])].into_iter().collect(),
        };

        assert!(hints.allows_organization(&org("org-member")));
        assert!(hints.allows_division(&org("org-member"), &div("div-led")));
        assert!(!hints.allows_division(&org("org-member"), &div("div-other")));
        assert!(!hints.allows_organization(&org("org-admin")));
    }

    #[rstest]
    fn session_key_falls_back_without_session() {
        let principal = Principal::new(UserId::new("user-9").expect("valid id"));
        assert_eq!(principal.session_key(), "user-9:-");
    }
}
