//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain. Identifiers stay as raw strings here and
//! are validated when rows are converted into domain types.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use super::schema::{
    audit_events, divisions, onboarding_answer_snapshots, onboarding_answer_totals, organizations,
    scope_preferences, user_profiles,
};

// ---------------------------------------------------------------------------
// Membership models
// ---------------------------------------------------------------------------

/// Row struct for reading from the organizations table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = organizations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct OrganizationRow {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

/// Row struct for reading from the divisions table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = divisions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct DivisionRow {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub key: String,
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// Scope preference models
// ---------------------------------------------------------------------------

/// Row struct for reading from the scope_preferences table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = scope_preferences)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ScopePreferenceRow {
    pub user_id: String,
    pub kind: String,
    pub organization_id: String,
    pub division_id: Option<String>,
    pub remembered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insertable struct for scope preferences; timestamps default in SQL.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = scope_preferences)]
pub(crate) struct NewScopePreferenceRow<'a> {
    pub user_id: &'a str,
    pub kind: &'a str,
    pub organization_id: &'a str,
    pub division_id: Option<&'a str>,
}

// ---------------------------------------------------------------------------
// Profile and audit models
// ---------------------------------------------------------------------------

/// Row struct for reading from the user_profiles table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = user_profiles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserProfileRow {
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Insertable struct for audit records; `id` is assigned by the sequence.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = audit_events)]
pub(crate) struct NewAuditEventRow<'a> {
    pub user_id: &'a str,
    pub event_type: &'a str,
    pub client_ip_hash: Option<&'a str>,
    pub user_agent: Option<&'a str>,
    pub correlation_id: &'a str,
    pub metadata: &'a serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Onboarding models
// ---------------------------------------------------------------------------

/// Row struct for reading from the onboarding_answer_snapshots table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = onboarding_answer_snapshots)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct SnapshotRow {
    pub session_id: String,
    pub user_id: String,
    pub workspace_id: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub answer_groups: serde_json::Value,
    pub flat_answers: serde_json::Value,
    pub schema_version: i32,
}

/// Insertable/changeset struct for snapshot upserts.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = onboarding_answer_snapshots)]
#[diesel(treat_none_as_null = true)]
pub(crate) struct NewSnapshotRow<'a> {
    pub session_id: &'a str,
    pub user_id: &'a str,
    pub workspace_id: Option<&'a str>,
    pub submitted_at: DateTime<Utc>,
    pub answer_groups: serde_json::Value,
    pub flat_answers: serde_json::Value,
    pub schema_version: i32,
}

/// Row struct for reading from the onboarding_answer_totals table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = onboarding_answer_totals)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct TotalRow {
    pub answer_key: String,
    pub answer_value: String,
    pub total: i64,
    pub updated_at: DateTime<Utc>,
}
