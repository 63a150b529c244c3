//! Authorization gate in front of tenant-scoped operations.
//!
//! The guard answers one question: may this principal act inside this
//! organization (and division) with these permissions? It assumes the target
//! exists. Resource owners validate existence after the guard passes, so a
//! denial here is always `forbidden` and never `not_found`.
//!
//! Division policy: access requires a division membership role, except that
//! organization owners and admins may enter any division of their
//! organization. For that inherited case the organization role stands in for
//! the division role when permissions are derived.

use std::sync::Arc;

use tracing::debug;

use super::{
    DivisionId, Error, OrganizationId, Principal, ScopeContext, ScopeService, build_context,
    is_organization_admin,
};

/// Authorization gate backed by [`ScopeService`] state.
#[derive(Clone)]
pub struct ScopeGuard {
    scopes: Arc<ScopeService>,
}

impl ScopeGuard {
    /// Build a guard over the scope service.
    pub fn new(scopes: Arc<ScopeService>) -> Self {
        Self { scopes }
    }

    /// Require membership in `organization_id` and every permission in
    /// `required_permissions`.
    ///
    /// The returned context has no active division; its permissions derive
    /// from the organization role alone.
    ///
    /// # Errors
    ///
    /// `forbidden` on any denial; store failures propagate.
    pub async fn require_organization_access(
        &self,
        principal: &Principal,
        organization_id: &OrganizationId,
        required_permissions: &[&str],
    ) -> Result<ScopeContext, Error> {
        if principal
            .scope_hints
            .as_ref()
            .is_some_and(|hints| !hints.allows_organization(organization_id))
        {
            debug!(user_id = %principal.id, %organization_id, "organization outside credential hints");
            return Err(forbidden_organization());
        }

        let state = self.scopes.get_scope(principal).await?;
        let organization = state
            .organization(organization_id)
            .ok_or_else(forbidden_organization)?;
        let context = build_context(organization, None, state.cached_at);
        require_permissions(&context, required_permissions)?;
        Ok(context)
    }

    /// Require access to `division_id` inside `organization_id` plus every
    /// permission in `required_permissions`.
    ///
    /// # Errors
    ///
    /// `forbidden` when the organization check fails, the division belongs
    /// to another organization, the principal has no division role and is
    /// not an organization owner or admin, or a permission is missing.
    pub async fn require_division_access(
        &self,
        principal: &Principal,
        organization_id: &OrganizationId,
        division_id: &DivisionId,
        required_permissions: &[&str],
    ) -> Result<ScopeContext, Error> {
        if principal.scope_hints.as_ref().is_some_and(|hints| {
            !hints.allows_organization(organization_id)
                || !hints.allows_division(organization_id, division_id)
        }) {
            debug!(user_id = %principal.id, %organization_id, %division_id, "division outside credential hints");
            return Err(forbidden_division());
        }

        let state = self.scopes.get_scope(principal).await?;
        let organization = state
            .organization(organization_id)
            .ok_or_else(forbidden_organization)?;
        let division = organization
            .division(division_id)
            .ok_or_else(forbidden_division)?;

        let has_membership = division
            .role
            .as_deref()
            .is_some_and(|role| !role.trim().is_empty());
        let context = if has_membership {
            build_context(organization, Some(division), state.cached_at)
        } else if is_organization_admin(organization.role.as_deref()) {
            let mut inherited = division.clone();
            inherited.role.clone_from(&organization.role);
            build_context(organization, Some(&inherited), state.cached_at)
        } else {
            return Err(forbidden_division());
        };

        require_permissions(&context, required_permissions)?;
        Ok(context)
    }
}

fn require_permissions(context: &ScopeContext, required: &[&str]) -> Result<(), Error> {
    if context.grants_all(required) {
        Ok(())
    } else {
        Err(Error::forbidden("insufficient permissions for this scope"))
    }
}

fn forbidden_organization() -> Error {
    Error::forbidden("no access to this organization")
}

fn forbidden_division() -> Error {
    Error::forbidden("no access to this division")
}
