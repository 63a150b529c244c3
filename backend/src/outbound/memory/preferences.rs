//! In-process scope preference store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use mockable::Clock;

use crate::domain::ports::{ScopePreferenceRepository, ScopePreferenceRepositoryError};
use crate::domain::{DivisionId, OrganizationId, PreferenceKind, ScopePreference, UserId};

/// Preferences held in memory with upsert semantics.
pub struct InMemoryScopePreferenceRepository {
    rows: Mutex<HashMap<(UserId, PreferenceKind), ScopePreference>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryScopePreferenceRepository {
    /// Empty store stamping rows with `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Number of stored rows.
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ScopePreferenceRepository for InMemoryScopePreferenceRepository {
    async fn get_preference(
        &self,
        user_id: &UserId,
        kind: PreferenceKind,
    ) -> Result<Option<ScopePreference>, ScopePreferenceRepositoryError> {
        let rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(rows.get(&(user_id.clone(), kind)).cloned())
    }

    async fn upsert_preference(
        &self,
        user_id: &UserId,
        organization_id: &OrganizationId,
        division_id: Option<DivisionId>,
        kind: PreferenceKind,
    ) -> Result<ScopePreference, ScopePreferenceRepositoryError> {
        let now = self.clock.utc();
        let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        let row = rows
            .entry((user_id.clone(), kind))
            .and_modify(|row| {
                row.organization_id = organization_id.clone();
                row.division_id.clone_from(&division_id);
                row.updated_at = now;
            })
            .or_insert_with(|| ScopePreference {
                user_id: user_id.clone(),
                organization_id: organization_id.clone(),
                division_id: division_id.clone(),
                kind,
                remembered_at: now,
                updated_at: now,
            });
        Ok(row.clone())
    }
}
