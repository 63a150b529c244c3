//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match the database migrations exactly. Migrations
//! are owned by the deployment that hosts this crate; regenerate this file
//! with `diesel print-schema` when they change.

diesel::table! {
    /// Tenants.
    organizations (id) {
        id -> Text,
        name -> Text,
        slug -> Text,
        description -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Divisions; display order is `(position, id)`.
    divisions (id) {
        id -> Text,
        organization_id -> Text,
        name -> Text,
        key -> Text,
        description -> Nullable<Text>,
        position -> Int4,
    }
}

diesel::table! {
    /// Organization memberships; load order is `(joined_at, organization_id)`.
    organization_memberships (user_id, organization_id) {
        user_id -> Text,
        organization_id -> Text,
        role -> Text,
        joined_at -> Timestamptz,
    }
}

diesel::table! {
    /// Division memberships.
    division_memberships (user_id, division_id) {
        user_id -> Text,
        division_id -> Text,
        role -> Text,
    }
}

diesel::table! {
    /// Remembered scope, one row per user and kind.
    scope_preferences (user_id, kind) {
        user_id -> Text,
        kind -> Text,
        organization_id -> Text,
        division_id -> Nullable<Text>,
        remembered_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Profile fields surfaced in session snapshots.
    user_profiles (id) {
        id -> Text,
        email -> Nullable<Text>,
        display_name -> Nullable<Text>,
        avatar_url -> Nullable<Text>,
    }
}

diesel::table! {
    /// Append-only audit trail shared by auth and scope events.
    audit_events (id) {
        id -> Int8,
        user_id -> Text,
        event_type -> Text,
        client_ip_hash -> Nullable<Text>,
        user_agent -> Nullable<Text>,
        correlation_id -> Text,
        metadata -> Jsonb,
        occurred_at -> Timestamptz,
    }
}

diesel::table! {
    /// Latest onboarding answers per session.
    onboarding_answer_snapshots (session_id) {
        session_id -> Text,
        user_id -> Text,
        workspace_id -> Nullable<Text>,
        submitted_at -> Timestamptz,
        answer_groups -> Jsonb,
        flat_answers -> Jsonb,
        schema_version -> Int4,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Running count of snapshots per flattened answer pair.
    onboarding_answer_totals (answer_key, answer_value) {
        answer_key -> Text,
        answer_value -> Text,
        total -> Int8,
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(divisions -> organizations (organization_id));
diesel::joinable!(organization_memberships -> organizations (organization_id));
diesel::joinable!(division_memberships -> divisions (division_id));

diesel::allow_tables_to_appear_in_same_query!(
    organizations,
    divisions,
    organization_memberships,
    division_memberships,
    scope_preferences,
    user_profiles,
    audit_events,
    onboarding_answer_snapshots,
    onboarding_answer_totals,
);
