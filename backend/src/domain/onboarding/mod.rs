//! Onboarding answer lifecycle and aggregation.
//!
//! Sessions complete into a channel payload; the aggregator turns payloads
//! into per-session snapshots and keeps per-answer totals in step with them.

mod aggregator;
mod answers;
mod session;
mod snapshot;
mod worker;

pub use aggregator::OnboardingAnswerAggregator;
pub use answers::{
    FlatAnswers, KNOWN_STEPS, TotalsDelta, answer_pairs, canonical_step_key,
    flatten_answer_groups, normalize_answer_groups,
};
pub use session::{OnboardingCompletionService, OnboardingSession, OnboardingStatus};
pub use snapshot::{
    AggregateTotal, DEFAULT_ANSWER_SCHEMA_VERSION, OnboardingAnswerSnapshot,
    OnboardingCompletionPayload, ROLE_ANSWER_KEY, SnapshotOrder, SnapshotQuery,
};
pub use worker::OnboardingAggregationWorker;
