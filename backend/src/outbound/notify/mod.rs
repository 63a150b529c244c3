//! PostgreSQL `LISTEN`/`NOTIFY` onboarding channel.
//!
//! Payloads are sent with `pg_notify(channel, payload)`, so they are subject
//! to PostgreSQL's 8000 byte notification limit; oversized completions fail to
//! publish and are recovered by a backfill.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::{PgListener, PgPoolOptions};
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::ports::{
    OnboardingNotificationError, OnboardingNotificationPublisher,
    OnboardingNotificationSubscriber,
};

/// Publishes onboarding payloads with `pg_notify`.
#[derive(Clone)]
pub struct PgOnboardingPublisher {
    pool: PgPool,
    channel: String,
}

impl PgOnboardingPublisher {
    /// Publisher over an existing pool.
    pub fn new(pool: PgPool, channel: impl Into<String>) -> Self {
        Self {
            pool,
            channel: channel.into(),
        }
    }

    /// Publisher with its own small, lazily connected pool.
    ///
    /// # Errors
    ///
    /// Returns a connection error when `database_url` cannot be parsed.
    pub fn connect_lazy(
        database_url: &str,
        channel: impl Into<String>,
    ) -> Result<Self, OnboardingNotificationError> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect_lazy(database_url)
            .map_err(|err| OnboardingNotificationError::connection(err.to_string()))?;
        Ok(Self::new(pool, channel))
    }
}

#[async_trait]
impl OnboardingNotificationPublisher for PgOnboardingPublisher {
    async fn publish(&self, payload: &str) -> Result<(), OnboardingNotificationError> {
        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(&self.channel)
            .bind(payload)
            .execute(&self.pool)
            .await
            .map_err(|err| OnboardingNotificationError::publish(err.to_string()))?;
        debug!(channel = %self.channel, bytes = payload.len(), "onboarding payload published");
        Ok(())
    }
}

/// Receives onboarding payloads over a dedicated `LISTEN` connection.
///
/// `PgListener` reconnects and re-issues `LISTEN` on its own after a dropped
/// connection; notifications sent while disconnected are lost.
pub struct PgOnboardingSubscriber {
    listener: Mutex<PgListener>,
    channel: String,
}

impl PgOnboardingSubscriber {
    /// Connect and start listening on `channel`.
    ///
    /// # Errors
    ///
    /// Returns a connection error when the listener cannot connect or
    /// subscribe.
    pub async fn connect(
        database_url: &str,
        channel: impl Into<String>,
    ) -> Result<Self, OnboardingNotificationError> {
        let channel = channel.into();
        let mut listener = PgListener::connect(database_url)
            .await
            .map_err(|err| OnboardingNotificationError::connection(err.to_string()))?;
        listener
            .listen(&channel)
            .await
            .map_err(|err| OnboardingNotificationError::connection(err.to_string()))?;
        debug!(%channel, "listening for onboarding completions");
        Ok(Self {
            listener: Mutex::new(listener),
            channel,
        })
    }
}

#[async_trait]
impl OnboardingNotificationSubscriber for PgOnboardingSubscriber {
    async fn next_notification(
        &self,
        timeout: Duration,
    ) -> Result<Option<String>, OnboardingNotificationError> {
        let mut listener = self.listener.lock().await;
        match tokio::time::timeout(timeout, listener.recv()).await {
            Err(_) => Ok(None),
            Ok(Ok(notification)) => {
                debug!(channel = %self.channel, "onboarding notification received");
                Ok(Some(notification.payload().to_owned()))
            }
            Ok(Err(err)) => Err(OnboardingNotificationError::connection(err.to_string())),
        }
    }
}
