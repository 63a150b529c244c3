//! Port for the remembered active scope.
//!
//! One row exists per `(user, kind)`. Writes are last-write-wins upserts: the
//! first write stamps `remembered_at`, every write stamps `updated_at`.

use async_trait::async_trait;

use crate::domain::{DivisionId, OrganizationId, PreferenceKind, ScopePreference, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by scope preference adapters.
    pub enum ScopePreferenceRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "scope preference repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "scope preference repository query failed: {message}",
    }
}

/// Preference store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScopePreferenceRepository: Send + Sync {
    /// Fetch the stored preference, if any.
    async fn get_preference(
        &self,
        user_id: &UserId,
        kind: PreferenceKind,
    ) -> Result<Option<ScopePreference>, ScopePreferenceRepositoryError>;

    /// Insert or overwrite the preference and return the stored row.
    async fn upsert_preference(
        &self,
        user_id: &UserId,
        organization_id: &OrganizationId,
        division_id: Option<DivisionId>,
        kind: PreferenceKind,
    ) -> Result<ScopePreference, ScopePreferenceRepositoryError>;
}

/// Store that never remembers anything.
///
/// `upsert_preference` echoes the write back with the Unix epoch as both
/// timestamps.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureScopePreferenceRepository;

#[async_trait]
impl ScopePreferenceRepository for FixtureScopePreferenceRepository {
    async fn get_preference(
        &self,
        _user_id: &UserId,
        _kind: PreferenceKind,
    ) -> Result<Option<ScopePreference>, ScopePreferenceRepositoryError> {
        Ok(None)
    }

    async fn upsert_preference(
        &self,
        user_id: &UserId,
        organization_id: &OrganizationId,
        division_id: Option<DivisionId>,
        kind: PreferenceKind,
    ) -> Result<ScopePreference, ScopePreferenceRepositoryError> {
        let epoch = chrono::DateTime::UNIX_EPOCH;
        Ok(ScopePreference {
            user_id: user_id.clone(),
            organization_id: organization_id.clone(),
            division_id,
            kind,
            remembered_at: epoch,
            updated_at: epoch,
        })
    }
}
