//! Background task feeding channel notifications into the aggregator.
//!
//! The loop waits on the subscriber with a bounded timeout and treats a
//! timeout as an idle tick. Shutdown cancels the wait and joins the task, so
//! no loop outlives [`OnboardingAggregationWorker::shutdown`].

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::OnboardingAnswerAggregator;
use crate::domain::ports::OnboardingNotificationSubscriber;

struct RunningWorker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Start/stop handle around the aggregation loop.
pub struct OnboardingAggregationWorker {
    aggregator: OnboardingAnswerAggregator,
    subscriber: Arc<dyn OnboardingNotificationSubscriber>,
    poll_timeout: Duration,
    running: Mutex<Option<RunningWorker>>,
}

impl OnboardingAggregationWorker {
    /// Build a stopped worker.
    pub fn new(
        aggregator: OnboardingAnswerAggregator,
        subscriber: Arc<dyn OnboardingNotificationSubscriber>,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            aggregator,
            subscriber,
            poll_timeout,
            running: Mutex::new(None),
        }
    }

    /// Spawn the loop on the current Tokio runtime.
    ///
    /// Returns `false` without spawning when the loop is already running.
    pub fn start(&self) -> bool {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
        {
            debug!("onboarding aggregation worker already running");
            return false;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            self.aggregator.clone(),
            Arc::clone(&self.subscriber),
            self.poll_timeout,
            cancel.clone(),
        ));
        *running = Some(RunningWorker { cancel, handle });
        true
    }

    /// Whether the loop is currently running.
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }

    /// Cancel the loop and wait for it to exit. A stopped worker is a no-op.
    pub async fn shutdown(&self) {
        let worker = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(RunningWorker { cancel, handle }) = worker else {
            return;
        };
        cancel.cancel();
        if let Err(err) = handle.await {
            error!(error = %err, "onboarding aggregation worker terminated abnormally");
        }
    }
}

async fn run_loop(
    aggregator: OnboardingAnswerAggregator,
    subscriber: Arc<dyn OnboardingNotificationSubscriber>,
    poll_timeout: Duration,
    cancel: CancellationToken,
) {
    info!(
        poll_timeout_ms = u64::try_from(poll_timeout.as_millis()).unwrap_or(u64::MAX),
        "onboarding aggregation worker started"
    );
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            next = subscriber.next_notification(poll_timeout) => match next {
                Ok(Some(raw)) => {
                    if let Err(err) = aggregator.handle_notification(&raw).await {
                        error!(error = %err, "failed to aggregate onboarding notification");
                    }
                }
                Ok(None) => debug!("onboarding channel idle"),
                Err(err) => {
                    error!(error = %err, "onboarding channel wait failed");
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(poll_timeout) => {}
                    }
                }
            },
        }
    }
    info!("onboarding aggregation worker stopped");
}
