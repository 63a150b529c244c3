//! In-process onboarding channel backed by a Tokio queue.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use crate::domain::ports::{
    OnboardingNotificationError, OnboardingNotificationPublisher,
    OnboardingNotificationSubscriber,
};

/// Build a connected publisher/subscriber pair.
pub fn onboarding_channel() -> (InMemoryOnboardingPublisher, InMemoryOnboardingSubscriber) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (
        InMemoryOnboardingPublisher { sender },
        InMemoryOnboardingSubscriber {
            receiver: Mutex::new(receiver),
        },
    )
}

/// Publishing half of [`onboarding_channel`].
#[derive(Clone)]
pub struct InMemoryOnboardingPublisher {
    sender: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl OnboardingNotificationPublisher for InMemoryOnboardingPublisher {
    async fn publish(&self, payload: &str) -> Result<(), OnboardingNotificationError> {
        self.sender
            .send(payload.to_owned())
            .map_err(|_| OnboardingNotificationError::publish("onboarding channel closed"))
    }
}

/// Subscribing half of [`onboarding_channel`].
pub struct InMemoryOnboardingSubscriber {
    receiver: Mutex<mpsc::UnboundedReceiver<String>>,
}

#[async_trait]
impl OnboardingNotificationSubscriber for InMemoryOnboardingSubscriber {
    async fn next_notification(
        &self,
        timeout: Duration,
    ) -> Result<Option<String>, OnboardingNotificationError> {
        let mut receiver = self.receiver.lock().await;
        match tokio::time::timeout(timeout, receiver.recv()).await {
            Err(_) => Ok(None),
            Ok(Some(payload)) => Ok(Some(payload)),
            Ok(None) => Err(OnboardingNotificationError::connection(
                "onboarding channel closed",
            )),
        }
    }
}
