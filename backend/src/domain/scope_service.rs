//! Scope resolution and scope updates for authenticated principals.
//!
//! [`ScopeService::get_scope`] serves cached [`ScopeState`] when it can and
//! otherwise rebuilds it from the membership store and the remembered
//! preference. [`ScopeService::update_scope`] validates the requested target
//! against freshly loaded memberships, persists the preference, rewrites the
//! cache, and publishes a [`ScopeChangeEvent`].
//!
//! The membership and preference stores are the source of truth. The cache is
//! written through after every successful read-miss or update, so a request
//! always observes its own update.
//!
//! The cache holds the full per-user state. Credential scope hints differ per
//! token, so every state handed out is narrowed to the caller's hints on the
//! way out with [`ScopeState::narrowed_to`].

use std::sync::Arc;
use std::time::Duration;

use mockable::Clock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error_mapping::{map_membership_error, map_preference_error};
use super::ports::{MembershipRepository, ScopeEventPublisher, ScopePreferenceRepository};
use super::{
    ClientIpHasher, DivisionId, Error, Organization, OrganizationId, PreferenceKind, Principal,
    RateLimiter, RequestContext, ScopeCache, ScopeChangeEvent, ScopeState, UserId,
};

/// Port bundle required by [`ScopeService`].
pub struct ScopeServicePorts {
    /// Membership store.
    pub memberships: Arc<dyn MembershipRepository>,
    /// Preference store.
    pub preferences: Arc<dyn ScopePreferenceRepository>,
    /// Scope change event sink.
    pub events: Arc<dyn ScopeEventPublisher>,
}

impl ScopeServicePorts {
    /// Build a port bundle.
    pub fn new(
        memberships: Arc<dyn MembershipRepository>,
        preferences: Arc<dyn ScopePreferenceRepository>,
        events: Arc<dyn ScopeEventPublisher>,
    ) -> Self {
        Self {
            memberships,
            preferences,
            events,
        }
    }
}

/// Requested scope change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeUpdateRequest {
    /// Target organization.
    #[serde(alias = "orgId")]
    pub organization_id: OrganizationId,
    /// Target division; `None` selects the organization's first division.
    #[serde(default)]
    pub division_id: Option<DivisionId>,
    /// Why the scope changed, recorded in the audit trail.
    pub reason: String,
}

/// Cache key for a user's scope state.
#[must_use]
pub fn scope_cache_key(user_id: &UserId) -> String {
    format!("scope:{user_id}")
}

/// Resolves and updates the active scope of principals.
pub struct ScopeService {
    memberships: Arc<dyn MembershipRepository>,
    preferences: Arc<dyn ScopePreferenceRepository>,
    events: Arc<dyn ScopeEventPublisher>,
    cache: Arc<ScopeCache<ScopeState>>,
    rate_limiter: Arc<RateLimiter>,
    ip_hasher: ClientIpHasher,
    clock: Arc<dyn Clock>,
    cache_ttl: Duration,
}

impl ScopeService {
    /// Build the service.
    pub fn new(
        ports: ScopeServicePorts,
        cache: Arc<ScopeCache<ScopeState>>,
        rate_limiter: Arc<RateLimiter>,
        ip_hasher: ClientIpHasher,
        clock: Arc<dyn Clock>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            memberships: ports.memberships,
            preferences: ports.preferences,
            events: ports.events,
            cache,
            rate_limiter,
            ip_hasher,
            clock,
            cache_ttl,
        }
    }

    /// Current scope state of `principal`, limited to its scope hints.
    ///
    /// A principal with no memberships receives an empty state with no active
    /// context.
    ///
    /// # Errors
    ///
    /// Propagates membership and preference store failures.
    pub async fn get_scope(&self, principal: &Principal) -> Result<ScopeState, Error> {
        let hints = principal.scope_hints.as_ref();
        if let Some(state) = self.cache.get(&scope_cache_key(&principal.id)) {
            debug!(user_id = %principal.id, "scope cache hit");
            return Ok(state.narrowed_to(hints));
        }

        let organizations = self.load_organizations(&principal.id).await?;
        let state = self.rebuild(&principal.id, organizations).await?;
        Ok(state.narrowed_to(hints))
    }

    /// Switch the active scope of `principal`.
    ///
    /// # Errors
    ///
    /// - `rate_limited` when the principal exhausted its update budget.
    /// - `invalid_request` for a blank reason.
    /// - `not_found` when the organization is not one of the principal's, or
    ///   the division is not part of that organization.
    /// - Store failures on the read and write path.
    pub async fn update_scope(
        &self,
        principal: &Principal,
        request: ScopeUpdateRequest,
        context: &RequestContext,
    ) -> Result<ScopeState, Error> {
        if !self.rate_limiter.allow(principal.id.as_str()) {
            warn!(user_id = %principal.id, "scope update rate limited");
            return Err(Error::rate_limited("too many scope changes, retry later"));
        }

        let reason = request.reason.trim();
        if reason.is_empty() {
            return Err(Error::invalid_request("reason must not be empty"));
        }

        let hints = principal.scope_hints.as_ref();
        if hints.is_some_and(|hints| !hints.allows_organization(&request.organization_id)) {
            return Err(Error::not_found("organization not found"));
        }
        if hints
            .zip(request.division_id.as_ref())
            .is_some_and(|(hints, division_id)| !hints.allows_division(&request.organization_id, division_id))
        {
            return Err(Error::not_found("division not found"));
        }

        // One membership read serves validation and, on a cache miss, the
        // previous context as well.
        let organizations = self.load_organizations(&principal.id).await?;
        validate_target(&organizations, &request)?;

        let before = match self.cache.get(&scope_cache_key(&principal.id)) {
            Some(state) => state,
            None => self.rebuild(&principal.id, organizations.clone()).await?,
        };
        let previous = before.narrowed_to(hints).active;

        let preference = self
            .preferences
            .upsert_preference(
                &principal.id,
                &request.organization_id,
                request.division_id.clone(),
                PreferenceKind::Workspace,
            )
            .await
            .map_err(map_preference_error)?;

        let now = self.clock.utc();
        let state = ScopeState::compute(principal.id.clone(), organizations, Some(&preference), now);
        self.cache
            .set(scope_cache_key(&principal.id), &state, self.cache_ttl);
        let state = state.narrowed_to(hints);

        let current = state
            .active
            .clone()
            .ok_or_else(|| Error::internal("scope update produced no active scope"))?;
        info!(
            user_id = %principal.id,
            organization_id = %current.organization_id,
            division_id = current.division_id.as_ref().map(tracing::field::display),
            correlation_id = %context.correlation_id,
            "scope updated"
        );

        let event = ScopeChangeEvent {
            user_id: principal.id.clone(),
            previous,
            current,
            correlation_id: context.correlation_id.clone(),
            reason: reason.to_owned(),
            client_ip_hash: self.ip_hasher.hash_context(context),
            user_agent: context.user_agent.clone(),
            occurred_at: now,
        };
        if let Err(err) = self.events.publish(&event).await {
            warn!(
                user_id = %principal.id,
                correlation_id = %context.correlation_id,
                error = %err,
                "failed to publish scope change event"
            );
        }

        Ok(state)
    }

    /// Drop the cached state for `user_id`, e.g. after a membership change.
    pub fn invalidate(&self, user_id: &UserId) {
        self.cache.clear(&scope_cache_key(user_id));
    }

    /// Compute the full state from loaded memberships and the stored
    /// preference, then write it through to the cache.
    async fn rebuild(
        &self,
        user_id: &UserId,
        organizations: Vec<Organization>,
    ) -> Result<ScopeState, Error> {
        let preference = self
            .preferences
            .get_preference(user_id, PreferenceKind::Workspace)
            .await
            .map_err(map_preference_error)?;

        let state = ScopeState::compute(
            user_id.clone(),
            organizations,
            preference.as_ref(),
            self.clock.utc(),
        );
        self.cache.set(scope_cache_key(user_id), &state, self.cache_ttl);
        debug!(
            %user_id,
            organizations = state.organizations.len(),
            "scope state rebuilt"
        );
        Ok(state)
    }

    async fn load_organizations(&self, user_id: &UserId) -> Result<Vec<Organization>, Error> {
        let mut organizations = self
            .memberships
            .load_organizations_for_user(user_id)
            .await
            .map_err(map_membership_error)?;
        let division_memberships = self
            .memberships
            .load_division_memberships_for_user(user_id)
            .await
            .map_err(map_membership_error)?;

        for organization in &mut organizations {
            let Some(memberships) = division_memberships.get(&organization.id) else {
                continue;
            };
            for division in &mut organization.divisions {
                if division.role.is_some() {
                    continue;
                }
                division.role = memberships
                    .iter()
                    .find(|membership| membership.id == division.id)
                    .and_then(|membership| membership.role.clone());
            }
        }
        Ok(organizations)
    }
}

fn validate_target(organizations: &[Organization], request: &ScopeUpdateRequest) -> Result<(), Error> {
    let organization = organizations
        .iter()
        .find(|organization| organization.id == request.organization_id)
        .ok_or_else(|| Error::not_found("organization not found"))?;
    if let Some(division_id) = &request.division_id {
        organization
            .division(division_id)
            .ok_or_else(|| Error::not_found("division not found"))?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "scope_service_tests.rs"]
mod tests;
