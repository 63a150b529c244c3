//! Port for loading a principal's organization and division memberships.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::domain::{Division, Organization, OrganizationId, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by membership repository adapters.
    pub enum MembershipRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "membership repository connection failed: {message}",
        /// Query failed during execution.
        Query { message: String } =>
            "membership repository query failed: {message}",
    }
}

/// Read access to the membership store, the source of truth for tenancy.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Every organization the user belongs to, in stable load order, with
    /// nested divisions and the user's roles merged in.
    async fn load_organizations_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<Organization>, MembershipRepositoryError>;

    /// Divisions the user holds an explicit membership in, keyed by
    /// organization. Each division carries the user's division role.
    async fn load_division_memberships_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<BTreeMap<OrganizationId, Vec<Division>>, MembershipRepositoryError>;
}

/// Repository for a user with no memberships.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureMembershipRepository;

#[async_trait]
impl MembershipRepository for FixtureMembershipRepository {
    async fn load_organizations_for_user(
        &self,
        _user_id: &UserId,
    ) -> Result<Vec<Organization>, MembershipRepositoryError> {
        Ok(Vec::new())
    }

    async fn load_division_memberships_for_user(
        &self,
        _user_id: &UserId,
    ) -> Result<BTreeMap<OrganizationId, Vec<Division>>, MembershipRepositoryError> {
        Ok(BTreeMap::new())
    }
}
