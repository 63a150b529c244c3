//! Port for onboarding answer snapshots and their aggregate totals.
//!
//! The repository owns the atomicity of a snapshot replacement: reading the
//! previous answers, writing the new row, and applying the totals delta must
//! happen as one unit, serialised per session id.

use async_trait::async_trait;
use pagination::{Page, PageRequest};

use crate::domain::onboarding::{
    AggregateTotal, OnboardingAnswerSnapshot, SnapshotQuery, TotalsDelta,
};

use super::define_port_error;

define_port_error! {
    /// Errors raised by snapshot repository adapters.
    pub enum OnboardingSnapshotRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "onboarding snapshot repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "onboarding snapshot repository query failed: {message}",
        /// Stored JSON could not be decoded.
        Decode { message: String } =>
            "onboarding snapshot could not be decoded: {message}",
    }
}

/// Snapshot store with incremental totals.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OnboardingSnapshotRepository: Send + Sync {
    /// Insert or replace the snapshot for its session id and apply
    /// [`TotalsDelta::between`] the previous and new flattened answers.
    ///
    /// Returns the delta that was applied.
    async fn upsert_snapshot(
        &self,
        snapshot: &OnboardingAnswerSnapshot,
    ) -> Result<TotalsDelta, OnboardingSnapshotRepositoryError>;

    /// One filtered, ordered window plus the total match count.
    async fn list_snapshots(
        &self,
        query: &SnapshotQuery,
        page: PageRequest,
    ) -> Result<Page<OnboardingAnswerSnapshot>, OnboardingSnapshotRepositoryError>;

    /// Unfiltered window ordered by `submitted_at` then session id.
    async fn fetch_batch(
        &self,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<OnboardingAnswerSnapshot>, OnboardingSnapshotRepositoryError>;

    /// Totals for one flattened key, highest count first, then by value.
    async fn totals_for_key(
        &self,
        answer_key: &str,
    ) -> Result<Vec<AggregateTotal>, OnboardingSnapshotRepositoryError>;
}

/// Repository that stores nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureOnboardingSnapshotRepository;

#[async_trait]
impl OnboardingSnapshotRepository for FixtureOnboardingSnapshotRepository {
    async fn upsert_snapshot(
        &self,
        snapshot: &OnboardingAnswerSnapshot,
    ) -> Result<TotalsDelta, OnboardingSnapshotRepositoryError> {
        Ok(TotalsDelta::between(None, &snapshot.flat_answers))
    }

    async fn list_snapshots(
        &self,
        _query: &SnapshotQuery,
        page: PageRequest,
    ) -> Result<Page<OnboardingAnswerSnapshot>, OnboardingSnapshotRepositoryError> {
        Ok(Page::new(Vec::new(), 0, page))
    }

    async fn fetch_batch(
        &self,
        _offset: u64,
        _limit: u32,
    ) -> Result<Vec<OnboardingAnswerSnapshot>, OnboardingSnapshotRepositoryError> {
        Ok(Vec::new())
    }

    async fn totals_for_key(
        &self,
        _answer_key: &str,
    ) -> Result<Vec<AggregateTotal>, OnboardingSnapshotRepositoryError> {
        Ok(Vec::new())
    }
}
