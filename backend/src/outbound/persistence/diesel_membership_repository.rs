//! PostgreSQL-backed `MembershipRepository` implementation using Diesel ORM.
//!
//! Organizations load in membership join order. Each organization carries all
//! of its divisions in display order, with the user's division role attached
//! where a division membership row exists.

use std::collections::BTreeMap;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{MembershipRepository, MembershipRepositoryError};
use crate::domain::{Division, DivisionId, Organization, OrganizationId, UserId};

use super::diesel_basic_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::models::{DivisionRow, OrganizationRow};
use super::pool::{DbPool, PoolError};
use super::schema::{division_memberships, divisions, organization_memberships, organizations};

/// Diesel-backed implementation of the `MembershipRepository` port.
#[derive(Clone)]
pub struct DieselMembershipRepository {
    pool: DbPool,
}

impl DieselMembershipRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> MembershipRepositoryError {
    map_basic_pool_error(error, MembershipRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> MembershipRepositoryError {
    map_basic_diesel_error(
        error,
        MembershipRepositoryError::query,
        MembershipRepositoryError::connection,
    )
}

fn invalid_id(error: impl std::fmt::Display) -> MembershipRepositoryError {
    MembershipRepositoryError::query(format!("invalid stored identifier: {error}"))
}

fn row_to_division(row: DivisionRow, role: Option<String>) -> Result<Division, MembershipRepositoryError> {
    Ok(Division {
        id: DivisionId::new(&row.id).map_err(invalid_id)?,
        organization_id: OrganizationId::new(&row.organization_id).map_err(invalid_id)?,
        name: row.name,
        key: row.key,
        description: row.description,
        role,
    })
}

fn group_by_organization(
    rows: Vec<(DivisionRow, Option<String>)>,
) -> Result<BTreeMap<OrganizationId, Vec<Division>>, MembershipRepositoryError> {
    let mut grouped: BTreeMap<OrganizationId, Vec<Division>> = BTreeMap::new();
    for (row, role) in rows {
        let division = row_to_division(row, role)?;
        grouped
            .entry(division.organization_id.clone())
            .or_default()
            .push(division);
    }
    Ok(grouped)
}

#[async_trait]
impl MembershipRepository for DieselMembershipRepository {
    async fn load_organizations_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<Organization>, MembershipRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let memberships: Vec<(OrganizationRow, String)> = organization_memberships::table
            .inner_join(organizations::table)
            .filter(organization_memberships::user_id.eq(user_id.as_str()))
            .order((
                organization_memberships::joined_at.asc(),
                organization_memberships::organization_id.asc(),
            ))
            .select((OrganizationRow::as_select(), organization_memberships::role))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        if memberships.is_empty() {
            return Ok(Vec::new());
        }

        let organization_ids: Vec<String> = memberships.iter().map(|(org, _)| org.id.clone()).collect();
        let division_rows: Vec<(DivisionRow, Option<String>)> = divisions::table
            .left_join(
                division_memberships::table.on(division_memberships::division_id
                    .eq(divisions::id)
                    .and(division_memberships::user_id.eq(user_id.as_str()))),
            )
            .filter(divisions::organization_id.eq_any(organization_ids))
            .order((divisions::position.asc(), divisions::id.asc()))
            .select((DivisionRow::as_select(), division_memberships::role.nullable()))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let mut divisions_by_org = group_by_organization(division_rows)?;

        memberships
            .into_iter()
            .map(|(row, role)| {
                let id = OrganizationId::new(&row.id).map_err(invalid_id)?;
                Ok(Organization {
                    divisions: divisions_by_org.remove(&id).unwrap_or_default(),
                    id,
                    name: row.name,
                    slug: row.slug,
                    description: row.description,
                    role: Some(role),
                })
            })
            .collect()
    }

    async fn load_division_memberships_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<BTreeMap<OrganizationId, Vec<Division>>, MembershipRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let rows: Vec<(DivisionRow, String)> = division_memberships::table
            .inner_join(divisions::table)
            .filter(division_memberships::user_id.eq(user_id.as_str()))
            .order((divisions::position.asc(), divisions::id.asc()))
            .select((DivisionRow::as_select(), division_memberships::role))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        group_by_organization(rows.into_iter().map(|(row, role)| (row, Some(role))).collect())
    }
}
