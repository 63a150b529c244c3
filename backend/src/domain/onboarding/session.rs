//! Onboarding session lifecycle and completion publishing.
//!
//! A session collects step answers while in [`OnboardingStatus::Draft`]. The
//! transition to [`OnboardingStatus::Completed`] is terminal and is the only
//! one that produces a completion payload for aggregation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::{DEFAULT_ANSWER_SCHEMA_VERSION, OnboardingCompletionPayload, canonical_step_key};
use crate::domain::ports::OnboardingNotificationPublisher;
use crate::domain::{Error, OnboardingSessionId, UserId};

/// Lifecycle position of an onboarding session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStatus {
    /// Accepting step submissions.
    Draft,
    /// Finished; no further changes.
    Completed,
}

/// One user's pass through onboarding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingSession {
    /// Session identifier.
    pub id: OnboardingSessionId,
    /// Session owner.
    pub user_id: UserId,
    /// Workspace the answers describe.
    pub workspace_id: Option<String>,
    /// Current lifecycle position.
    pub status: OnboardingStatus,
    /// Answers keyed by canonical step key.
    pub answers: Map<String, Value>,
    /// Answer schema version the client submitted against.
    pub answer_schema_version: i32,
    /// Set once the session completes.
    pub completed_at: Option<DateTime<Utc>>,
}

impl OnboardingSession {
    /// Fresh draft session.
    #[must_use]
    pub fn new(id: OnboardingSessionId, user_id: UserId) -> Self {
        Self {
            id,
            user_id,
            workspace_id: None,
            status: OnboardingStatus::Draft,
            answers: Map::new(),
            answer_schema_version: DEFAULT_ANSWER_SCHEMA_VERSION,
            completed_at: None,
        }
    }

    /// Attach the workspace the session belongs to.
    #[must_use]
    pub fn with_workspace(mut self, workspace_id: impl Into<String>) -> Self {
        self.workspace_id = Some(workspace_id.into());
        self
    }

    /// Record the answers for one step, replacing earlier answers for it.
    ///
    /// Step aliases are stored under their canonical key, so `teamSize` and
    /// `team_size` address the same step.
    ///
    /// # Errors
    ///
    /// `conflict` once the session is completed; `invalid_request` for a
    /// blank step key.
    pub fn submit_step(&mut self, step: &str, answers: Value) -> Result<(), Error> {
        self.ensure_draft()?;
        let step = step.trim();
        if step.is_empty() {
            return Err(Error::invalid_request("step key must not be empty"));
        }
        self.answers.insert(canonical_step_key(step), answers);
        Ok(())
    }

    /// Finish the session and build its completion payload.
    ///
    /// # Errors
    ///
    /// `conflict` when the session is already completed.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<OnboardingCompletionPayload, Error> {
        self.ensure_draft()?;
        self.status = OnboardingStatus::Completed;
        self.completed_at = Some(now);
        Ok(OnboardingCompletionPayload {
            session_id: self.id.clone(),
            user_id: self.user_id.clone(),
            completed_at: now,
            answers: self.answers.clone(),
            answer_schema_version: Some(self.answer_schema_version),
            workspace_id: self.workspace_id.clone(),
        })
    }

    /// Whether the session reached its terminal state.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == OnboardingStatus::Completed
    }

    fn ensure_draft(&self) -> Result<(), Error> {
        if self.is_completed() {
            Err(Error::conflict("onboarding session is already completed"))
        } else {
            Ok(())
        }
    }
}

/// Completes sessions and announces them on the onboarding channel.
pub struct OnboardingCompletionService {
    publisher: Arc<dyn OnboardingNotificationPublisher>,
    clock: Arc<dyn Clock>,
}

impl OnboardingCompletionService {
    /// Build the service.
    pub fn new(publisher: Arc<dyn OnboardingNotificationPublisher>, clock: Arc<dyn Clock>) -> Self {
        Self { publisher, clock }
    }

    /// Complete `session` and publish its payload.
    ///
    /// Publishing is best-effort: a channel failure is logged and the
    /// completion still succeeds, since backfills can replay the session.
    ///
    /// # Errors
    ///
    /// `conflict` when the session is already completed; `internal_error`
    /// when the payload cannot be encoded.
    pub async fn complete(
        &self,
        session: &mut OnboardingSession,
    ) -> Result<OnboardingCompletionPayload, Error> {
        let payload = session.complete(self.clock.utc())?;
        let encoded = serde_json::to_string(&payload)
            .map_err(|err| Error::internal(format!("failed to encode completion payload: {err}")))?;

        match self.publisher.publish(&encoded).await {
            Ok(()) => info!(
                session_id = %payload.session_id,
                user_id = %payload.user_id,
                "onboarding session completed"
            ),
            Err(err) => warn!(
                session_id = %payload.session_id,
                user_id = %payload.user_id,
                error = %err,
                "failed to publish onboarding completion"
            ),
        }
        Ok(payload)
    }
}
