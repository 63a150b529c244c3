//! Ports for the onboarding completion channel.
//!
//! Payloads travel as JSON text. Publishing happens on completion; the
//! aggregation worker subscribes.

use std::time::Duration;

use async_trait::async_trait;

use super::define_port_error;

define_port_error! {
    /// Errors raised by notification channel adapters.
    pub enum OnboardingNotificationError {
        /// Channel connection could not be established or was lost.
        Connection { message: String } =>
            "onboarding channel connection failed: {message}",
        /// The channel rejected a publish.
        Publish { message: String } =>
            "onboarding channel publish failed: {message}",
    }
}

/// Publishing side of the channel.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OnboardingNotificationPublisher: Send + Sync {
    /// Publish one JSON payload.
    async fn publish(&self, payload: &str) -> Result<(), OnboardingNotificationError>;
}

/// Subscribing side of the channel.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OnboardingNotificationSubscriber: Send + Sync {
    /// Wait up to `timeout` for the next payload.
    ///
    /// `Ok(None)` means the wait timed out with nothing to do.
    async fn next_notification(
        &self,
        timeout: Duration,
    ) -> Result<Option<String>, OnboardingNotificationError>;
}

/// Publisher that drops every payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureOnboardingNotificationPublisher;

#[async_trait]
impl OnboardingNotificationPublisher for FixtureOnboardingNotificationPublisher {
    async fn publish(&self, _payload: &str) -> Result<(), OnboardingNotificationError> {
        Ok(())
    }
}

/// Subscriber that never receives anything and idles for the full timeout.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureOnboardingNotificationSubscriber;

#[async_trait]
impl OnboardingNotificationSubscriber for FixtureOnboardingNotificationSubscriber {
    async fn next_notification(
        &self,
        timeout: Duration,
    ) -> Result<Option<String>, OnboardingNotificationError> {
        tokio::time::sleep(timeout).await;
        Ok(None)
    }
}
