//! Snapshot, totals, and completion payload types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{FlatAnswers, flatten_answer_groups, normalize_answer_groups};
use crate::domain::{OnboardingSessionId, UserId};

/// Schema version assumed when a payload omits one.
pub const DEFAULT_ANSWER_SCHEMA_VERSION: i32 = 1;

/// Flattened key matched by the role filter.
pub const ROLE_ANSWER_KEY: &str = "profile.role";

/// Message published on the onboarding channel when a session completes.
///
/// Field names are fixed: backfill and export tooling read them verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnboardingCompletionPayload {
    /// Completed session.
    pub session_id: OnboardingSessionId,
    /// Session owner.
    pub user_id: UserId,
    /// Completion time.
    pub completed_at: DateTime<Utc>,
    /// Raw answers keyed by step.
    pub answers: Map<String, Value>,
    /// Answer schema version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_schema_version: Option<i32>,
    /// Workspace the session belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
}

/// Durable record of one session's final answers; keyed by session id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingAnswerSnapshot {
    /// Primary key.
    pub session_id: OnboardingSessionId,
    /// Session owner.
    pub user_id: UserId,
    /// Workspace the session belongs to.
    pub workspace_id: Option<String>,
    /// Completion time of the submission.
    pub submitted_at: DateTime<Utc>,
    /// Canonical step-keyed answers.
    pub answer_groups: Map<String, Value>,
    /// Dotted-path answers.
    pub flat_answers: FlatAnswers,
    /// Answer schema version.
    pub schema_version: i32,
}

impl OnboardingAnswerSnapshot {
    /// Normalise and flatten a completion payload.
    #[must_use]
    pub fn from_payload(payload: OnboardingCompletionPayload) -> Self {
        let answer_groups = normalize_answer_groups(&payload.answers);
        let flat_answers = flatten_answer_groups(&answer_groups);
        Self {
            session_id: payload.session_id,
            user_id: payload.user_id,
            workspace_id: payload.workspace_id,
            submitted_at: payload.completed_at,
            answer_groups,
            flat_answers,
            schema_version: payload
                .answer_schema_version
                .unwrap_or(DEFAULT_ANSWER_SCHEMA_VERSION),
        }
    }

    /// Whether `flat_answers[key]` contains `value`.
    #[must_use]
    pub fn has_answer(&self, key: &str, value: &str) -> bool {
        self.flat_answers
            .get(key)
            .is_some_and(|values| values.iter().any(|candidate| candidate == value))
    }
}

/// Running count of snapshots answering `value` for `answer_key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateTotal {
    /// Flattened answer path.
    pub answer_key: String,
    /// Answer value.
    pub answer_value: String,
    /// Number of snapshots containing the pair; never negative.
    pub total: i64,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}

/// Sort direction over `submitted_at`, tie-broken by session id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotOrder {
    /// Oldest first.
    #[default]
    Ascending,
    /// Newest first.
    Descending,
}

/// Filters for listing snapshots. Every supplied filter must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotQuery {
    /// Only snapshots from this workspace.
    pub workspace_id: Option<String>,
    /// Inclusive lower bound on `submitted_at`.
    pub submitted_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `submitted_at`.
    pub submitted_before: Option<DateTime<Utc>>,
    /// Only snapshots whose `profile.role` answers contain this value.
    pub role: Option<String>,
    /// Result ordering.
    pub order: SnapshotOrder,
}

impl SnapshotQuery {
    /// Whether `snapshot` satisfies every filter.
    #[must_use]
    pub fn matches(&self, snapshot: &OnboardingAnswerSnapshot) -> bool {
        self.workspace_id
            .as_ref()
            .is_none_or(|workspace| snapshot.workspace_id.as_ref() == Some(workspace))
            && self
                .submitted_from
                .is_none_or(|from| snapshot.submitted_at >= from)
            && self
                .submitted_before
                .is_none_or(|before| snapshot.submitted_at < before)
            && self
                .role
                .as_deref()
                .is_none_or(|role| snapshot.has_answer(ROLE_ANSWER_KEY, role))
    }
}
