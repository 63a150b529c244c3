//! Explicit dependency container.
//!
//! [`AppAdapters`] collects the driven adapters; [`AppContainer::build`] wires
//! them into services using [`ScopeSettings`]. Routing layers borrow the
//! services; the container owns the aggregation worker and its shutdown.

use std::sync::Arc;

use mockable::Clock;
use thiserror::Error;

use crate::config::ScopeSettings;
use crate::domain::onboarding::{
    OnboardingAggregationWorker, OnboardingAnswerAggregator, OnboardingCompletionService,
};
use crate::domain::ports::{
    AuditSink, CredentialVerifier, MembershipRepository, OnboardingNotificationError,
    OnboardingNotificationPublisher, OnboardingNotificationSubscriber,
    OnboardingSnapshotRepository, ScopeEventPublisher, ScopePreferenceRepository,
    UserProfileRepository,
};
use crate::domain::{
    AuthSessionPorts, AuthSessionService, ClientIpHasher, PrincipalResolver, RateLimiter,
    ScopeCache, ScopeGuard, ScopeService, ScopeServicePorts,
};
use crate::outbound::events::{
    AuditSinkScopeEventPublisher, FanoutScopeEventPublisher, LoggingScopeEventPublisher,
};
use crate::outbound::memory::{
    InMemoryAuditSink, InMemoryMembershipRepository, InMemoryOnboardingSnapshotRepository,
    InMemoryScopePreferenceRepository, InMemoryUserProfileRepository, onboarding_channel,
};
use crate::outbound::notify::{PgOnboardingPublisher, PgOnboardingSubscriber};
use crate::outbound::persistence::{
    DbPool, DieselAuditSink, DieselMembershipRepository, DieselOnboardingSnapshotRepository,
    DieselScopePreferenceRepository, DieselUserProfileRepository, PoolConfig, PoolError,
};

/// Failures while connecting adapters.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// The database pool could not be built.
    #[error("database pool: {0}")]
    Pool(#[from] PoolError),
    /// The onboarding channel could not be opened.
    #[error("onboarding channel: {0}")]
    Notifications(#[from] OnboardingNotificationError),
    /// Postgres adapters were requested without a database URL.
    #[error("database_url is not configured")]
    MissingDatabaseUrl,
}

/// Driven adapters consumed by [`AppContainer::build`].
pub struct AppAdapters {
    /// Credential verification.
    pub credentials: Arc<dyn CredentialVerifier>,
    /// Membership store.
    pub memberships: Arc<dyn MembershipRepository>,
    /// Scope preference store.
    pub preferences: Arc<dyn ScopePreferenceRepository>,
    /// Profile store.
    pub profiles: Arc<dyn UserProfileRepository>,
    /// Audit trail.
    pub audit: Arc<dyn AuditSink>,
    /// Onboarding snapshot store.
    pub snapshots: Arc<dyn OnboardingSnapshotRepository>,
    /// Sending side of the onboarding channel.
    pub onboarding_publisher: Arc<dyn OnboardingNotificationPublisher>,
    /// Receiving side of the onboarding channel.
    pub onboarding_subscriber: Arc<dyn OnboardingNotificationSubscriber>,
    /// Wall clock.
    pub clock: Arc<dyn Clock>,
}

impl AppAdapters {
    /// Adapters that keep all state in process memory.
    pub fn in_memory(credentials: Arc<dyn CredentialVerifier>, clock: Arc<dyn Clock>) -> Self {
        let (publisher, subscriber) = onboarding_channel();
        Self {
            credentials,
            memberships: Arc::new(InMemoryMembershipRepository::new()),
            preferences: Arc::new(InMemoryScopePreferenceRepository::new(clock.clone())),
            profiles: Arc::new(InMemoryUserProfileRepository::new()),
            audit: Arc::new(InMemoryAuditSink::new()),
            snapshots: Arc::new(InMemoryOnboardingSnapshotRepository::new(clock.clone())),
            onboarding_publisher: Arc::new(publisher),
            onboarding_subscriber: Arc::new(subscriber),
            clock,
        }
    }

    /// PostgreSQL adapters for `settings.database_url`.
    ///
    /// # Errors
    ///
    /// Fails when no URL is configured, the pool cannot be built, or the
    /// listener cannot subscribe to the onboarding channel.
    pub async fn postgres(
        settings: &ScopeSettings,
        credentials: Arc<dyn CredentialVerifier>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ContainerError> {
        let database_url = settings
            .database_url
            .as_deref()
            .ok_or(ContainerError::MissingDatabaseUrl)?;
        let pool = DbPool::new(PoolConfig::new(database_url)).await?;
        let channel = settings.onboarding_channel();
        let publisher = PgOnboardingPublisher::connect_lazy(database_url, channel)?;
        let subscriber = PgOnboardingSubscriber::connect(database_url, channel).await?;
        Ok(Self {
            credentials,
            memberships: Arc::new(DieselMembershipRepository::new(pool.clone())),
            preferences: Arc::new(DieselScopePreferenceRepository::new(pool.clone())),
            profiles: Arc::new(DieselUserProfileRepository::new(pool.clone())),
            audit: Arc::new(DieselAuditSink::new(pool.clone())),
            snapshots: Arc::new(DieselOnboardingSnapshotRepository::new(pool)),
            onboarding_publisher: Arc::new(publisher),
            onboarding_subscriber: Arc::new(subscriber),
            clock,
        })
    }
}

/// Services wired from settings and adapters.
pub struct AppContainer {
    principals: Arc<PrincipalResolver>,
    scopes: Arc<ScopeService>,
    guard: Arc<ScopeGuard>,
    sessions: Arc<AuthSessionService>,
    completions: Arc<OnboardingCompletionService>,
    aggregator: OnboardingAnswerAggregator,
    worker: OnboardingAggregationWorker,
}

impl AppContainer {
    /// Wire every service. The aggregation worker is built stopped.
    pub fn build(settings: &ScopeSettings, adapters: AppAdapters) -> Self {
        let ip_hasher = ClientIpHasher::new(settings.client_ip_salt());
        let events: Arc<dyn ScopeEventPublisher> = Arc::new(FanoutScopeEventPublisher::new(vec![
            Arc::new(LoggingScopeEventPublisher),
            Arc::new(AuditSinkScopeEventPublisher::new(adapters.audit.clone())),
        ]));

        let principals = Arc::new(PrincipalResolver::new(
            adapters.credentials,
            settings.credential_secret.clone().unwrap_or_default(),
            settings.credential_audience.clone(),
        ));
        let scopes = Arc::new(ScopeService::new(
            ScopeServicePorts::new(adapters.memberships, adapters.preferences, events),
            Arc::new(ScopeCache::new()),
            Arc::new(RateLimiter::new(
                settings.rate_limit_max_events(),
                settings.rate_limit_window(),
            )),
            ip_hasher.clone(),
            adapters.clock.clone(),
            settings.scope_cache_ttl(),
        ));
        let guard = Arc::new(ScopeGuard::new(scopes.clone()));
        let sessions = Arc::new(AuthSessionService::new(
            AuthSessionPorts {
                profiles: adapters.profiles,
                audit: adapters.audit,
            },
            Arc::new(ScopeCache::new()),
            settings.feature_flags(),
            ip_hasher,
            adapters.clock.clone(),
            settings.session_cache_ttl(),
        ));
        let completions = Arc::new(OnboardingCompletionService::new(
            adapters.onboarding_publisher,
            adapters.clock,
        ));
        let aggregator = OnboardingAnswerAggregator::new(adapters.snapshots, settings.max_page_size());
        let worker = OnboardingAggregationWorker::new(
            aggregator.clone(),
            adapters.onboarding_subscriber,
            settings.listener_poll_timeout(),
        );

        Self {
            principals,
            scopes,
            guard,
            sessions,
            completions,
            aggregator,
            worker,
        }
    }

    /// Credential to principal resolution.
    pub fn principals(&self) -> Arc<PrincipalResolver> {
        self.principals.clone()
    }

    /// Scope resolution and updates.
    pub fn scopes(&self) -> Arc<ScopeService> {
        self.scopes.clone()
    }

    /// Authorization gate over [`Self::scopes`].
    pub fn guard(&self) -> Arc<ScopeGuard> {
        self.guard.clone()
    }

    /// Session snapshots and audit tracking.
    pub fn sessions(&self) -> Arc<AuthSessionService> {
        self.sessions.clone()
    }

    /// Onboarding completion publishing.
    pub fn completions(&self) -> Arc<OnboardingCompletionService> {
        self.completions.clone()
    }

    /// Onboarding snapshot reads and writes.
    pub fn aggregator(&self) -> &OnboardingAnswerAggregator {
        &self.aggregator
    }

    /// Start the aggregation worker; `false` when it is already running.
    pub fn start_worker(&self) -> bool {
        self.worker.start()
    }

    /// Whether the aggregation worker loop is live.
    pub fn worker_running(&self) -> bool {
        self.worker.is_running()
    }

    /// Stop the aggregation worker and wait for its loop to exit.
    pub async fn shutdown(&self) {
        self.worker.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use ortho_config::OrthoConfig;
    use rstest::rstest;

    use crate::domain::ports::FixtureCredentialVerifier;
    use crate::test_support::MutableClock;

    fn settings() -> ScopeSettings {
        let _guard = lock_env([
            ("TENANT_SCOPE_DATABASE_URL", None::<String>),
            ("TENANT_SCOPE_LISTENER_POLL_TIMEOUT_MS", Some("20".to_owned())),
        ]);
        ScopeSettings::load_from_iter([OsString::from("tenant-scope")])
            .expect("config should load")
    }

    fn container() -> AppContainer {
        let adapters = AppAdapters::in_memory(
            Arc::new(FixtureCredentialVerifier),
            Arc::new(MutableClock::fixed()),
        );
        AppContainer::build(&settings(), adapters)
    }

    #[rstest]
    #[tokio::test]
    async fn worker_starts_once_and_stops_on_shutdown() {
        let container = container();

        assert!(container.start_worker());
        assert!(!container.start_worker());
        assert!(container.worker_running());

        container.shutdown().await;
        assert!(!container.worker_running());
    }

    #[rstest]
    #[tokio::test]
    async fn postgres_adapters_require_a_database_url() {
        let result = AppAdapters::postgres(
            &settings(),
            Arc::new(FixtureCredentialVerifier),
            Arc::new(MutableClock::fixed()),
        )
        .await;

        assert!(matches!(result, Err(ContainerError::MissingDatabaseUrl)));
    }
}
