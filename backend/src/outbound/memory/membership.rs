//! In-process membership store.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::domain::ports::{MembershipRepository, MembershipRepositoryError};
use crate::domain::{Division, Organization, OrganizationId, UserId};

#[derive(Default)]
struct Memberships {
    organizations: HashMap<UserId, Vec<Organization>>,
    divisions: HashMap<UserId, BTreeMap<OrganizationId, Vec<Division>>>,
    unavailable: bool,
}

/// Membership graph held in memory, keyed by user.
#[derive(Default)]
pub struct InMemoryMembershipRepository {
    inner: RwLock<Memberships>,
}

impl InMemoryMembershipRepository {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the organizations `user_id` belongs to, in load order.
    pub fn set_organizations(&self, user_id: &UserId, organizations: Vec<Organization>) {
        self.write().organizations.insert(user_id.clone(), organizations);
    }

    /// Replace the division memberships of `user_id`.
    pub fn set_division_memberships(
        &self,
        user_id: &UserId,
        memberships: BTreeMap<OrganizationId, Vec<Division>>,
    ) {
        self.write().divisions.insert(user_id.clone(), memberships);
    }

    /// Make every subsequent load fail with a connection error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.write().unavailable = unavailable;
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Memberships> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Memberships>, MembershipRepositoryError> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        if guard.unavailable {
            return Err(MembershipRepositoryError::connection("membership store offline"));
        }
        Ok(guard)
    }
}

#[async_trait]
impl MembershipRepository for InMemoryMembershipRepository {
    async fn load_organizations_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<Organization>, MembershipRepositoryError> {
        Ok(self
            .read()?
            .organizations
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn load_division_memberships_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<BTreeMap<OrganizationId, Vec<Division>>, MembershipRepositoryError> {
        Ok(self.read()?.divisions.get(user_id).cloned().unwrap_or_default())
    }
}
