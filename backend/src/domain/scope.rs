//! Tenant scope model and the active-scope resolution algorithm.
//!
//! Organizations and divisions are loaded per user with the user's roles
//! already attached. [`resolve_active_scope`] turns that graph plus the
//! remembered [`ScopePreference`] into the [`ScopeContext`] a request runs in.
//! The algorithm is deterministic and must not depend on cache state.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DivisionId, OrganizationId, ScopeHints, UserId};

/// Permission granted to every member of an organization.
pub const SCOPE_READ: &str = "scope:read";
/// Permission to change scope-wide settings.
pub const SCOPE_MANAGE: &str = "scope:manage";
/// Permission to administer the organization.
pub const ORG_MANAGE: &str = "org:manage";
/// Permission to view the organization.
pub const ORG_VIEW: &str = "org:view";
/// Permission to administer the active division.
pub const DIVISION_MANAGE: &str = "division:manage";
/// Permission to view the active division.
pub const DIVISION_VIEW: &str = "division:view";

const ORGANIZATION_ADMIN_ROLES: [&str; 2] = ["owner", "admin"];
const DIVISION_ADMIN_ROLES: [&str; 3] = ["owner", "admin", "lead"];

/// Division inside an organization, viewed by one principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Division {
    /// Division identifier.
    pub id: DivisionId,
    /// Display name.
    pub name: String,
    /// Short slug.
    pub key: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// The principal's role in this division; `None` without a membership row.
    pub role: Option<String>,
}

/// Organization (tenant) viewed by one principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    /// Organization identifier.
    pub id: OrganizationId,
    /// Display name.
    pub name: String,
    /// URL slug.
    pub slug: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Divisions in display order.
    pub divisions: Vec<Division>,
    /// The principal's role in this organization.
    pub role: Option<String>,
}

impl Organization {
    /// Look up a division of this organization.
    #[must_use]
    pub fn division(&self, division_id: &DivisionId) -> Option<&Division> {
        self.divisions.iter().find(|division| &division.id == division_id)
    }
}

/// Discriminator for remembered preferences; one row per user and kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceKind {
    /// The active workspace (organization + division) selection.
    #[default]
    Workspace,
}

impl PreferenceKind {
    /// Stable storage value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Workspace => "workspace",
        }
    }

    /// Parse a storage value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "workspace" => Some(Self::Workspace),
            _ => None,
        }
    }
}

/// The principal's last remembered scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopePreference {
    /// Owner of the preference.
    pub user_id: UserId,
    /// Remembered organization.
    pub organization_id: OrganizationId,
    /// Remembered division, if any.
    pub division_id: Option<DivisionId>,
    /// Preference kind.
    pub kind: PreferenceKind,
    /// When the selection was first remembered.
    pub remembered_at: DateTime<Utc>,
    /// When the row was last written.
    pub updated_at: DateTime<Utc>,
}

/// The scope a request runs in, with the permissions it carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeContext {
    /// Active organization.
    pub organization_id: OrganizationId,
    /// Active division, if any.
    pub division_id: Option<DivisionId>,
    /// Effective role: the division role when present, else the organization role.
    pub role: Option<String>,
    /// Division role, if the principal has one in the active division.
    pub division_role: Option<String>,
    /// Sorted, de-duplicated `resource:action` permissions.
    pub permissions: Vec<String>,
    /// When this context was last derived from a preference or recomputed.
    pub updated_at: DateTime<Utc>,
}

impl ScopeContext {
    /// Whether the context carries every permission in `required`.
    #[must_use]
    pub fn grants_all(&self, required: &[&str]) -> bool {
        required
            .iter()
            .all(|permission| self.permissions.iter().any(|held| held == permission))
    }
}

/// Scope state returned to callers and cached per user.
///
/// ## Invariants
/// - `active` is `None` exactly when `organizations` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeState {
    /// Owner of the state.
    pub user_id: UserId,
    /// Every organization the user belongs to, with nested divisions.
    pub organizations: Vec<Organization>,
    /// Current scope, absent when the user has no organizations.
    pub active: Option<ScopeContext>,
    /// When the active selection was remembered, if it came from a preference.
    pub remembered_at: Option<DateTime<Utc>>,
    /// When this state was computed.
    pub cached_at: DateTime<Utc>,
}

impl ScopeState {
    /// Compute the state for `organizations` and an optional preference.
    #[must_use]
    pub fn compute(
        user_id: UserId,
        organizations: Vec<Organization>,
        preference: Option<&ScopePreference>,
        now: DateTime<Utc>,
    ) -> Self {
        let active = resolve_active_scope(&organizations, preference, now);
        let remembered_at = preference
            .filter(|pref| {
                active
                    .as_ref()
                    .is_some_and(|ctx| ctx.organization_id == pref.organization_id)
            })
            .map(|pref| pref.remembered_at);
        Self {
            user_id,
            organizations,
            active,
            remembered_at,
            cached_at: now,
        }
    }

    /// Look up one of the user's organizations.
    #[must_use]
    pub fn organization(&self, organization_id: &OrganizationId) -> Option<&Organization> {
        self.organizations
            .iter()
            .find(|organization| &organization.id == organization_id)
    }

    /// Restrict the state to what a credential's scope hints admit.
    ///
    /// Organizations and divisions outside the hints are removed. An active
    /// selection that is still admitted survives; an active division that was
    /// removed falls back to the organization's first admitted division. When
    /// the active organization itself was removed, the first admitted
    /// organization becomes active and `remembered_at` is cleared. `None`
    /// returns the state unchanged.
    #[must_use]
    pub fn narrowed_to(mut self, hints: Option<&ScopeHints>) -> Self {
        let Some(hints) = hints else {
            return self;
        };

        self.organizations
            .retain(|organization| hints.allows_organization(&organization.id));
        for organization in &mut self.organizations {
            let organization_id = organization.id.clone();
            organization
                .divisions
                .retain(|division| hints.allows_division(&organization_id, &division.id));
        }

        let previous = self.active.take();
        let kept = previous.and_then(|active| {
            let organization = self.organization(&active.organization_id)?;
            let division_removed = active
                .division_id
                .as_ref()
                .is_some_and(|division_id| organization.division(division_id).is_none());
            if division_removed {
                Some(build_context(
                    organization,
                    organization.divisions.first(),
                    active.updated_at,
                ))
            } else {
                Some(active)
            }
        });

        if kept.is_none() {
            self.remembered_at = None;
        }
        let active = kept.or_else(|| {
            self.organizations.first().map(|organization| {
                build_context(organization, organization.divisions.first(), self.cached_at)
            })
        });
        self.active = active;
        self
    }
}

/// Resolve the active scope for a membership graph.
///
/// 1. A preference naming one of the organizations selects it; otherwise the
///    first organization in load order is used.
/// 2. A preferred division that exists in the selected organization is used.
///    Without a preferred division the organization's first division is used.
///    A preferred division missing from the organization yields no division.
/// 3. The role is the division role when present, else the organization role.
///
/// Returns `None` when `organizations` is empty.
///
/// # Examples
/// ```
/// use chrono::Utc;
/// use tenant_scope::domain::{resolve_active_scope, Organization, OrganizationId};
///
/// let org = Organization {
///     id: OrganizationId::new("org-1").unwrap(),
///     name: "Acme".into(),
///     slug: "acme".into(),
///     description: None,
///     divisions: vec![],
///     role: Some("member".into()),
/// };
/// let ctx = resolve_active_scope(&[org], None, Utc::now()).unwrap();
/// assert_eq!(ctx.organization_id.as_str(), "org-1");
/// assert!(ctx.division_id.is_none());
/// ```
#[must_use]
pub fn resolve_active_scope(
    organizations: &[Organization],
    preference: Option<&ScopePreference>,
    now: DateTime<Utc>,
) -> Option<ScopeContext> {
    let preferred = preference.and_then(|pref| {
        organizations
            .iter()
            .find(|organization| organization.id == pref.organization_id)
    });
    let organization = preferred.or_else(|| organizations.first())?;

    let division = match preference.and_then(|pref| pref.division_id.as_ref()) {
        Some(division_id) => organization.division(division_id),
        None => organization.divisions.first(),
    };

    let updated_at = match (preferred, preference) {
        (Some(_), Some(pref)) => pref.updated_at,
        _ => now,
    };

    Some(build_context(organization, division, updated_at))
}

/// Build a context for an explicit organization/division pair.
///
/// The division, when supplied, must belong to `organization`; callers check
/// this before calling.
#[must_use]
pub fn build_context(
    organization: &Organization,
    division: Option<&Division>,
    updated_at: DateTime<Utc>,
) -> ScopeContext {
    let division_role = division.and_then(|division| non_blank(division.role.as_deref()));
    let organization_role = non_blank(organization.role.as_deref());
    let role = division_role.or(organization_role).map(str::to_owned);

    ScopeContext {
        organization_id: organization.id.clone(),
        division_id: division.map(|division| division.id.clone()),
        role,
        division_role: division_role.map(str::to_owned),
        permissions: compute_permissions(organization_role, division_role),
        updated_at,
    }
}

/// Derive the permission set for an organization role and division role.
///
/// Roles compare case-insensitively. The result is sorted and de-duplicated.
///
/// # Examples
/// ```
/// use tenant_scope::domain::compute_permissions;
///
/// let perms = compute_permissions(Some("Admin"), None);
/// assert!(perms.contains(&"scope:manage".to_owned()));
/// assert!(!compute_permissions(Some("viewer"), None).contains(&"scope:manage".to_owned()));
/// ```
#[must_use]
pub fn compute_permissions(organization_role: Option<&str>, division_role: Option<&str>) -> Vec<String> {
    let mut permissions = BTreeSet::from([SCOPE_READ]);

    match non_blank(organization_role) {
        Some(role) if is_one_of(role, &ORGANIZATION_ADMIN_ROLES) => {
            permissions.extend([SCOPE_MANAGE, ORG_MANAGE]);
        }
        Some(_) => {
            permissions.insert(ORG_VIEW);
        }
        None => {}
    }

    match non_blank(division_role) {
        Some(role) if is_one_of(role, &DIVISION_ADMIN_ROLES) => {
            permissions.extend([DIVISION_MANAGE, DIVISION_VIEW]);
        }
        Some(_) => {
            permissions.insert(DIVISION_VIEW);
        }
        None => {}
    }

    permissions.into_iter().map(str::to_owned).collect()
}

/// Whether an organization role is `owner` or `admin` (case-insensitive).
#[must_use]
pub fn is_organization_admin(role: Option<&str>) -> bool {
    non_blank(role).is_some_and(|role| is_one_of(role, &ORGANIZATION_ADMIN_ROLES))
}

fn non_blank(role: Option<&str>) -> Option<&str> {
    role.map(str::trim).filter(|role| !role.is_empty())
}

fn is_one_of(role: &str, candidates: &[&str]) -> bool {
    candidates
        .iter()
        .any(|candidate| role.eq_ignore_ascii_case(candidate))
}

#[cfg(test)]
mod tests {
    //! Resolution and permission rules.
    use super::*;
    use chrono::TimeZone;
    use rstest::{fixture, rstest};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn division(org: &str, id: &str, role: Option<&str>) -> Division {
        Division {
            id: DivisionId::new(id).expect("valid id"),
            name: id.to_uppercase(),
            key: id.to_owned(),
            description: None,
            organization_id: OrganizationId::new(org).expect("valid id"),
            role: role.map(str::to_owned),
        }
    }

    fn organization(id: &str, role: Option<&str>, divisions: Vec<Division>) -> Organization {
        Organization {
            id: OrganizationId::new(id).expect("valid id"),
            name: id.to_uppercase(),
            slug: id.to_owned(),
            description: None,
            divisions,
            role: role.map(str::to_owned),
        }
    }

    fn preference(org: &str, div: Option<&str>) -> ScopePreference {
        ScopePreference {
            user_id: UserId::new("user-1").expect("valid id"),
            organization_id: OrganizationId::new(org).expect("valid id"),
            division_id: div.map(|id| DivisionId::new(id).expect("valid id")),
            kind: PreferenceKind::Workspace,
            remembered_at: now() - chrono::Duration::days(3),
            updated_at: now() - chrono::Duration::days(1),
        }
    }

    #[fixture]
    fn organizations() -> Vec<Organization> {
        vec![
            organization(
                "org-1",
                Some("member"),
                vec![
                    division("org-1", "div-1", None),
                    division("org-1", "div-2", Some("lead")),
                ],
            ),
            organization("org-2", Some("Owner"), vec![division("org-2", "div-3", Some("member"))]),
            organization("org-3", None, vec![]),
        ]
    }

    #[rstest]
    fn no_organizations_yield_no_context() {
        assert!(resolve_active_scope(&[], Some(&preference("org-1", None)), now()).is_none());
    }

    #[rstest]
    fn without_preference_the_first_organization_and_division_win(organizations: Vec<Organization>) {
        let ctx = resolve_active_scope(&organizations, None, now()).expect("context");
        assert_eq!(ctx.organization_id.as_str(), "org-1");
        assert_eq!(ctx.division_id.as_ref().map(DivisionId::as_str), Some("div-1"));
        assert_eq!(ctx.role.as_deref(), Some("member"));
        assert_eq!(ctx.updated_at, now());
    }

    #[rstest]
    fn matching_preference_selects_organization_and_division(organizations: Vec<Organization>) {
        let pref = preference("org-1", Some("div-2"));
        let ctx = resolve_active_scope(&organizations, Some(&pref), now()).expect("context");
        assert_eq!(ctx.division_id.as_ref().map(DivisionId::as_str), Some("div-2"));
        assert_eq!(ctx.role.as_deref(), Some("lead"));
        assert_eq!(ctx.division_role.as_deref(), Some("lead"));
        assert_eq!(ctx.updated_at, pref.updated_at);
        assert!(ctx.grants_all(&[DIVISION_MANAGE, ORG_VIEW]));
    }

    #[rstest]
    fn preference_without_division_defaults_to_first_division(organizations: Vec<Organization>) {
        let pref = preference("org-2", None);
        let ctx = resolve_active_scope(&organizations, Some(&pref), now()).expect("context");
        assert_eq!(ctx.organization_id.as_str(), "org-2");
        assert_eq!(ctx.division_id.as_ref().map(DivisionId::as_str), Some("div-3"));
        assert_eq!(ctx.role.as_deref(), Some("member"));
    }

    #[rstest]
    fn unknown_preferred_division_yields_no_division(organizations: Vec<Organization>) {
        let pref = preference("org-1", Some("div-3"));
        let ctx = resolve_active_scope(&organizations, Some(&pref), now()).expect("context");
        assert_eq!(ctx.organization_id.as_str(), "org-1");
        assert!(ctx.division_id.is_none());
        assert_eq!(ctx.role.as_deref(), Some("member"));
    }

    #[rstest]
    fn stale_preference_falls_back_to_first_organization(organizations: Vec<Organization>) {
        let pref = preference("org-gone", None);
        let ctx = resolve_active_scope(&organizations, Some(&pref), now()).expect("context");
        assert_eq!(ctx.organization_id.as_str(), "org-1");
        assert_eq!(ctx.updated_at, now());
    }

    #[rstest]
    fn organization_without_divisions_has_no_division(organizations: Vec<Organization>) {
        let pref = preference("org-3", None);
        let ctx = resolve_active_scope(&organizations, Some(&pref), now()).expect("context");
        assert!(ctx.division_id.is_none());
        assert!(ctx.role.is_none());
        assert_eq!(ctx.permissions, vec![SCOPE_READ.to_owned()]);
    }

    #[rstest]
    #[case(Some("admin"), None, vec![ORG_MANAGE, SCOPE_MANAGE, SCOPE_READ])]
    #[case(Some("ADMIN"), None, vec![ORG_MANAGE, SCOPE_MANAGE, SCOPE_READ])]
    #[case(Some("owner"), Some("Lead"), vec![DIVISION_MANAGE, DIVISION_VIEW, ORG_MANAGE, SCOPE_MANAGE, SCOPE_READ])]
    #[case(Some("viewer"), None, vec![ORG_VIEW, SCOPE_READ])]
    #[case(Some("member"), Some("member"), vec![DIVISION_VIEW, ORG_VIEW, SCOPE_READ])]
    #[case(None, None, vec![SCOPE_READ])]
    #[case(Some("  "), None, vec![SCOPE_READ])]
    fn permissions_follow_roles(
        #[case] organization_role: Option<&str>,
        #[case] division_role: Option<&str>,
        #[case] expected: Vec<&str>,
    ) {
        assert_eq!(compute_permissions(organization_role, division_role), expected);
    }

    #[rstest]
    fn remembered_at_only_reflects_an_applied_preference(organizations: Vec<Organization>) {
        let user = UserId::new("user-1").expect("valid id");
        let applied = preference("org-2", None);
        let state = ScopeState::compute(user.clone(), organizations.clone(), Some(&applied), now());
        assert_eq!(state.remembered_at, Some(applied.remembered_at));

        let stale = preference("org-gone", None);
        let state = ScopeState::compute(user, organizations, Some(&stale), now());
        assert!(state.remembered_at.is_none());
    }

    fn hints(organizations: &[&str], divisions: &[(&str, &[&str])]) -> ScopeHints {
        ScopeHints {
            organization_ids: organizations
                .iter()
                .map(|id| OrganizationId::new(*id).expect("valid id"))
                .collect(),
            divisions: divisions
                .iter()
                .map(|(org, ids)| {
                    (
                        OrganizationId::new(*org).expect("valid id"),
                        ids.iter().map(|id| DivisionId::new(*id).expect("valid id")).collect(),
                    )
                })
                .collect(),
        }
    }

    fn user() -> UserId {
        UserId::new("user-1").expect("valid id")
    }

    #[rstest]
    fn narrowing_moves_the_default_inside_the_hints(organizations: Vec<Organization>) {
        let state = ScopeState::compute(user(), organizations, None, now())
            .narrowed_to(Some(&hints(&["org-2"], &[])));

        let ids: Vec<&str> = state.organizations.iter().map(|org| org.id.as_str()).collect();
        assert_eq!(ids, vec!["org-2"]);
        let active = state.active.expect("active scope");
        assert_eq!(active.organization_id.as_str(), "org-2");
        assert_eq!(active.division_id.as_ref().map(DivisionId::as_str), Some("div-3"));
    }

    #[rstest]
    fn narrowing_keeps_an_admitted_selection(organizations: Vec<Organization>) {
        let pref = preference("org-1", Some("div-2"));
        let state = ScopeState::compute(user(), organizations, Some(&pref), now())
            .narrowed_to(Some(&hints(&["org-1", "org-2"], &[])));

        let active = state.active.expect("active scope");
        assert_eq!(active.division_id.as_ref().map(DivisionId::as_str), Some("div-2"));
        assert_eq!(active.updated_at, pref.updated_at);
        assert_eq!(state.remembered_at, Some(pref.remembered_at));
    }

    #[rstest]
    fn narrowing_replaces_a_removed_division(organizations: Vec<Organization>) {
        let pref = preference("org-1", Some("div-2"));
        let state = ScopeState::compute(user(), organizations, Some(&pref), now())
            .narrowed_to(Some(&hints(&[], &[("org-1", &["div-1"])])));

        let organization = state.organizations.first().expect("org-1 kept");
        assert_eq!(organization.divisions.len(), 1);
        let active = state.active.expect("active scope");
        assert_eq!(active.organization_id.as_str(), "org-1");
        assert_eq!(active.division_id.as_ref().map(DivisionId::as_str), Some("div-1"));
        assert!(active.division_role.is_none());
        assert_eq!(state.remembered_at, Some(pref.remembered_at));
    }

    #[rstest]
    fn narrowing_away_the_remembered_organization_forgets_it(organizations: Vec<Organization>) {
        let pref = preference("org-1", None);
        let state = ScopeState::compute(user(), organizations, Some(&pref), now())
            .narrowed_to(Some(&hints(&["org-3"], &[])));

        let active = state.active.expect("active scope");
        assert_eq!(active.organization_id.as_str(), "org-3");
        assert!(state.remembered_at.is_none());
        assert_eq!(active.updated_at, now());
    }

    #[rstest]
    fn narrowing_to_nothing_clears_the_active_scope(organizations: Vec<Organization>) {
        let state = ScopeState::compute(user(), organizations, None, now())
            .narrowed_to(Some(&hints(&["org-elsewhere"], &[])));
        assert!(state.organizations.is_empty());
        assert!(state.active.is_none());
    }

    #[rstest]
    fn no_hints_leave_the_state_alone(organizations: Vec<Organization>) {
        let state = ScopeState::compute(user(), organizations, None, now());
        assert_eq!(state.clone().narrowed_to(None), state);
    }

    #[rstest]
    fn preference_kind_round_trips_storage_value() {
        assert_eq!(PreferenceKind::parse(PreferenceKind::Workspace.as_str()), Some(PreferenceKind::Workspace));
        assert_eq!(PreferenceKind::parse("dashboard"), None);
    }
}
