//! PostgreSQL-backed `ScopePreferenceRepository` implementation using Diesel ORM.
//!
//! Writes are `INSERT .. ON CONFLICT (user_id, kind) DO UPDATE`: concurrent
//! updates from one user resolve to the last writer.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::RunQueryDsl;
use tracing::warn;

use crate::domain::ports::{ScopePreferenceRepository, ScopePreferenceRepositoryError};
use crate::domain::{DivisionId, OrganizationId, PreferenceKind, ScopePreference, UserId};

use super::diesel_basic_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::models::{NewScopePreferenceRow, ScopePreferenceRow};
use super::pool::{DbPool, PoolError};
use super::schema::scope_preferences;

/// Diesel-backed implementation of the `ScopePreferenceRepository` port.
#[derive(Clone)]
pub struct DieselScopePreferenceRepository {
    pool: DbPool,
}

impl DieselScopePreferenceRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> ScopePreferenceRepositoryError {
    map_basic_pool_error(error, ScopePreferenceRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> ScopePreferenceRepositoryError {
    map_basic_diesel_error(
        error,
        ScopePreferenceRepositoryError::query,
        ScopePreferenceRepositoryError::connection,
    )
}

fn row_to_preference(row: ScopePreferenceRow) -> Result<ScopePreference, ScopePreferenceRepositoryError> {
    let invalid = |error: crate::domain::IdValidationError| {
        ScopePreferenceRepositoryError::query(format!("invalid stored identifier: {error}"))
    };
    let kind = PreferenceKind::parse(&row.kind).unwrap_or_else(|| {
        warn!(value = %row.kind, user_id = %row.user_id, "unrecognised preference kind, treating as workspace");
        PreferenceKind::Workspace
    });
    Ok(ScopePreference {
        user_id: UserId::new(&row.user_id).map_err(invalid)?,
        organization_id: OrganizationId::new(&row.organization_id).map_err(invalid)?,
        division_id: row
            .division_id
            .as_deref()
            .map(DivisionId::new)
            .transpose()
            .map_err(invalid)?,
        kind,
        remembered_at: row.remembered_at,
        updated_at: row.updated_at,
    })
}

#[async_trait]
impl ScopePreferenceRepository for DieselScopePreferenceRepository {
    async fn get_preference(
        &self,
        user_id: &UserId,
        kind: PreferenceKind,
    ) -> Result<Option<ScopePreference>, ScopePreferenceRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<ScopePreferenceRow> = scope_preferences::table
            .filter(scope_preferences::user_id.eq(user_id.as_str()))
            .filter(scope_preferences::kind.eq(kind.as_str()))
            .select(ScopePreferenceRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_preference).transpose()
    }

    async fn upsert_preference(
        &self,
        user_id: &UserId,
        organization_id: &OrganizationId,
        division_id: Option<DivisionId>,
        kind: PreferenceKind,
    ) -> Result<ScopePreference, ScopePreferenceRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let new_row = NewScopePreferenceRow {
            user_id: user_id.as_str(),
            kind: kind.as_str(),
            organization_id: organization_id.as_str(),
            division_id: division_id.as_ref().map(DivisionId::as_str),
        };

        let row: ScopePreferenceRow = diesel::insert_into(scope_preferences::table)
            .values(&new_row)
            .on_conflict((scope_preferences::user_id, scope_preferences::kind))
            .do_update()
            .set((
                scope_preferences::organization_id.eq(excluded(scope_preferences::organization_id)),
                scope_preferences::division_id.eq(excluded(scope_preferences::division_id)),
                scope_preferences::updated_at.eq(diesel::dsl::now),
            ))
            .returning(ScopePreferenceRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        row_to_preference(row)
    }
}
