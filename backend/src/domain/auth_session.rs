//! Cached session snapshots and session audit trail.
//!
//! Snapshots are cached per `user_id:session_id` with a short TTL. Logout and
//! refresh write audit records best-effort: an audit sink failure is logged
//! and never fails the session operation.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use super::error_mapping::map_profile_error;
use super::ports::{AuditSink, UserProfile, UserProfileRepository};
use super::{AuditEventType, AuditRecord, ClientIpHasher, Error, Principal, RequestContext, ScopeCache};

/// Enabled/disabled feature flags, sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureFlags(BTreeMap<String, bool>);

impl FeatureFlags {
    /// Parse a comma-separated list.
    ///
    /// `name` and `name=true` enable a flag, `name=false` and `!name`
    /// disable it. Blank entries are ignored; later entries win.
    ///
    /// # Examples
    /// ```
    /// use tenant_scope::domain::FeatureFlags;
    ///
    /// let flags = FeatureFlags::parse("huddles, shortlinks=false, !beta");
    /// assert!(flags.is_enabled("huddles"));
    /// assert!(!flags.is_enabled("shortlinks"));
    /// assert!(!flags.is_enabled("unknown"));
    /// ```
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        Self::from_entries([raw])
    }

    /// Parse a list of entries, each of which may itself be comma-separated.
    ///
    /// Configuration sources deliver the flag list either as one string or
    /// already split into a sequence; both shapes yield the same flags.
    ///
    /// # Examples
    /// ```
    /// use tenant_scope::domain::FeatureFlags;
    ///
    /// let flags = FeatureFlags::from_entries(["huddles", "!beta,shortlinks"]);
    /// assert!(flags.is_enabled("huddles"));
    /// assert!(flags.is_enabled("shortlinks"));
    /// assert!(!flags.is_enabled("beta"));
    /// ```
    #[must_use]
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut flags = BTreeMap::new();
        let entries: Vec<S> = entries.into_iter().collect();
        for entry in entries
            .iter()
            .flat_map(|entry| entry.as_ref().split(','))
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
        {
            let (name, enabled) = match entry.split_once('=') {
                Some((name, value)) => (name.trim(), value.trim().eq_ignore_ascii_case("true")),
                None => match entry.strip_prefix('!') {
                    Some(name) => (name.trim(), false),
                    None => (entry, true),
                },
            };
            if !name.is_empty() {
                flags.insert(name.to_owned(), enabled);
            }
        }
        Self(flags)
    }

    /// Whether `name` is enabled; unknown flags are disabled.
    #[must_use]
    pub fn is_enabled(&self, name: &str) -> bool {
        self.0.get(name).copied().unwrap_or(false)
    }

    /// Flag map in name order.
    #[must_use]
    pub fn as_map(&self) -> &BTreeMap<String, bool> {
        &self.0
    }
}

/// Claim metadata surfaced in a session snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    /// Session identifier.
    pub session_id: Option<String>,
    /// Credential issue time.
    pub issued_at: Option<DateTime<Utc>>,
    /// Credential expiry.
    pub expires_at: Option<DateTime<Utc>>,
    /// Credential audience.
    pub audience: Option<String>,
    /// Coarse role label.
    pub role: Option<String>,
}

/// What a client needs to render an authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Resolved user profile.
    pub user: UserProfile,
    /// Credential metadata.
    pub claims: SessionClaims,
    /// Feature flags for this session.
    pub feature_flags: FeatureFlags,
    /// When the snapshot was built.
    pub generated_at: DateTime<Utc>,
}

/// Builds, caches, and invalidates session snapshots.
pub struct AuthSessionService {
    profiles: Arc<dyn UserProfileRepository>,
    audit: Arc<dyn AuditSink>,
    cache: Arc<ScopeCache<SessionSnapshot>>,
    feature_flags: FeatureFlags,
    ip_hasher: ClientIpHasher,
    clock: Arc<dyn Clock>,
    cache_ttl: Duration,
}

/// Collaborators of [`AuthSessionService`].
pub struct AuthSessionPorts {
    /// Profile store.
    pub profiles: Arc<dyn UserProfileRepository>,
    /// Audit trail.
    pub audit: Arc<dyn AuditSink>,
}

impl AuthSessionService {
    /// Build the service.
    pub fn new(
        ports: AuthSessionPorts,
        cache: Arc<ScopeCache<SessionSnapshot>>,
        feature_flags: FeatureFlags,
        ip_hasher: ClientIpHasher,
        clock: Arc<dyn Clock>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            profiles: ports.profiles,
            audit: ports.audit,
            cache,
            feature_flags,
            ip_hasher,
            clock,
            cache_ttl,
        }
    }

    /// Cached snapshot for the principal's session, built on a miss.
    ///
    /// # Errors
    ///
    /// Propagates profile store failures.
    pub async fn get_session_snapshot(&self, principal: &Principal) -> Result<SessionSnapshot, Error> {
        let key = principal.session_key();
        if let Some(snapshot) = self.cache.get(&key) {
            debug!(session = %key, "session cache hit");
            return Ok(snapshot);
        }
        let snapshot = self.build_snapshot(principal).await?;
        self.cache.set(key, &snapshot, self.cache_ttl);
        Ok(snapshot)
    }

    /// Drop the cached snapshot and rebuild it from the profile store.
    ///
    /// # Errors
    ///
    /// Propagates profile store failures.
    pub async fn refresh_session(&self, principal: &Principal) -> Result<SessionSnapshot, Error> {
        self.cache.clear(&principal.session_key());
        self.get_session_snapshot(principal).await
    }

    /// Record a logout and drop the session's cached snapshot.
    pub async fn track_logout(&self, principal: &Principal, context: &RequestContext) {
        self.cache.clear(&principal.session_key());
        self.record(principal, context, AuditEventType::Logout).await;
    }

    /// Record a session refresh.
    pub async fn track_refresh(&self, principal: &Principal, context: &RequestContext) {
        self.record(principal, context, AuditEventType::SessionRefresh)
            .await;
    }

    async fn build_snapshot(&self, principal: &Principal) -> Result<SessionSnapshot, Error> {
        let stored = self
            .profiles
            .find_profile(&principal.id)
            .await
            .map_err(map_profile_error)?;
        let user = stored.unwrap_or_else(|| UserProfile {
            id: principal.id.clone(),
            email: principal.email.clone(),
            display_name: None,
            avatar_url: None,
        });
        Ok(SessionSnapshot {
            user,
            claims: SessionClaims {
                session_id: principal.claims.session_id.clone(),
                issued_at: principal.claims.issued_at,
                expires_at: principal.claims.expires_at,
                audience: principal.claims.audience.clone(),
                role: principal.role.clone(),
            },
            feature_flags: self.feature_flags.clone(),
            generated_at: self.clock.utc(),
        })
    }

    async fn record(&self, principal: &Principal, context: &RequestContext, event_type: AuditEventType) {
        let record = AuditRecord {
            user_id: principal.id.clone(),
            event_type,
            client_ip_hash: self.ip_hasher.hash_context(context),
            user_agent: context.user_agent.clone(),
            correlation_id: context.correlation_id.clone(),
            metadata: json!({ "sessionId": principal.claims.session_id }),
            occurred_at: self.clock.utc(),
        };
        match self.audit.record(&record).await {
            Ok(()) => info!(
                user_id = %principal.id,
                event = event_type.as_str(),
                correlation_id = %context.correlation_id,
                "session event recorded"
            ),
            Err(err) => warn!(
                user_id = %principal.id,
                event = event_type.as_str(),
                correlation_id = %context.correlation_id,
                error = %err,
                "failed to record session audit event"
            ),
        }
    }
}
