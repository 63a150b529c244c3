//! Snapshot ingestion, listing, and export over the snapshot repository.
//!
//! Every ingestion path (live notifications, backfills, direct upserts) goes
//! through the same normalise → snapshot → upsert sequence, so totals stay
//! consistent no matter how a completion arrives.

use std::sync::Arc;

use futures_util::stream::{self, BoxStream, StreamExt};
use pagination::{Cursor, Page, PageRequest};
use tracing::{debug, warn};

use super::{
    AggregateTotal, OnboardingAnswerSnapshot, OnboardingCompletionPayload, SnapshotQuery,
    TotalsDelta,
};
use crate::domain::Error;
use crate::domain::error_mapping::map_snapshot_error;
use crate::domain::ports::OnboardingSnapshotRepository;

/// Aggregates completed onboarding answers into snapshots and totals.
#[derive(Clone)]
pub struct OnboardingAnswerAggregator {
    snapshots: Arc<dyn OnboardingSnapshotRepository>,
    max_page_size: u32,
}

impl OnboardingAnswerAggregator {
    /// Build the aggregator; listing windows never exceed `max_page_size`.
    pub fn new(snapshots: Arc<dyn OnboardingSnapshotRepository>, max_page_size: u32) -> Self {
        Self {
            snapshots,
            max_page_size: max_page_size.max(1),
        }
    }

    /// Store `snapshot`, replacing any earlier snapshot of the same session,
    /// and return the totals delta that was applied.
    ///
    /// # Errors
    ///
    /// Propagates persistence failures.
    pub async fn upsert_snapshot(
        &self,
        snapshot: &OnboardingAnswerSnapshot,
    ) -> Result<TotalsDelta, Error> {
        let delta = self
            .snapshots
            .upsert_snapshot(snapshot)
            .await
            .map_err(map_snapshot_error)?;
        debug!(
            session_id = %snapshot.session_id,
            removed = delta.removed.len(),
            added = delta.added.len(),
            "onboarding snapshot stored"
        );
        Ok(delta)
    }

    /// Normalise a parsed payload and store it.
    ///
    /// # Errors
    ///
    /// Propagates persistence failures.
    pub async fn ingest_payload(
        &self,
        payload: OnboardingCompletionPayload,
    ) -> Result<OnboardingAnswerSnapshot, Error> {
        let snapshot = OnboardingAnswerSnapshot::from_payload(payload);
        self.upsert_snapshot(&snapshot).await?;
        Ok(snapshot)
    }

    /// Handle one JSON payload from the onboarding channel.
    ///
    /// Malformed payloads are logged and dropped (`Ok(None)`); they are never
    /// retried.
    ///
    /// # Errors
    ///
    /// Propagates persistence failures so the caller can log and move on.
    pub async fn handle_notification(
        &self,
        raw: &str,
    ) -> Result<Option<OnboardingAnswerSnapshot>, Error> {
        match serde_json::from_str::<OnboardingCompletionPayload>(raw) {
            Ok(payload) => self.ingest_payload(payload).await.map(Some),
            Err(err) => {
                warn!(error = %err, bytes = raw.len(), "dropping malformed onboarding payload");
                Ok(None)
            }
        }
    }

    /// One filtered page of snapshots plus the total match count.
    ///
    /// # Errors
    ///
    /// Propagates persistence failures.
    pub async fn list_snapshots(
        &self,
        query: &SnapshotQuery,
        page: PageRequest,
    ) -> Result<Page<OnboardingAnswerSnapshot>, Error> {
        let page = PageRequest::new(page.offset(), Some(page.limit()), self.max_page_size);
        self.snapshots
            .list_snapshots(query, page)
            .await
            .map_err(map_snapshot_error)
    }

    /// Continue a listing from an opaque cursor token.
    ///
    /// A missing token starts at the first row. Follow-up tokens come from
    /// [`Page::next_cursor`] on the returned page.
    ///
    /// # Errors
    ///
    /// `invalid_request` for a token that does not decode, otherwise
    /// persistence failures.
    pub async fn resume_snapshots(
        &self,
        query: &SnapshotQuery,
        cursor: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Page<OnboardingAnswerSnapshot>, Error> {
        let cursor = cursor
            .map(Cursor::decode)
            .transpose()
            .map_err(|err| Error::invalid_request(err.to_string()))?
            .unwrap_or(Cursor::new(0));
        self.list_snapshots(query, PageRequest::from_cursor(&cursor, limit, self.max_page_size))
            .await
    }

    /// Every snapshot in `submitted_at`, session id order, in batches.
    ///
    /// Each call starts a fresh offset scan. The stream ends after the first
    /// empty batch, or after yielding an error.
    pub fn iter_all_snapshots(
        &self,
        batch_size: u32,
    ) -> BoxStream<'static, Result<Vec<OnboardingAnswerSnapshot>, Error>> {
        let batch_size = batch_size.max(1);
        let snapshots = Arc::clone(&self.snapshots);
        stream::unfold(Some(0_u64), move |offset| {
            let snapshots = Arc::clone(&snapshots);
            async move {
                let offset = offset?;
                match snapshots.fetch_batch(offset, batch_size).await {
                    Ok(batch) if batch.is_empty() => None,
                    Ok(batch) => {
                        let fetched = u64::try_from(batch.len()).unwrap_or(u64::MAX);
                        Some((Ok(batch), Some(offset.saturating_add(fetched))))
                    }
                    Err(err) => Some((Err(map_snapshot_error(err)), None)),
                }
            }
        })
        .boxed()
    }

    /// Replay raw completion payloads through the ingestion path.
    ///
    /// Returns how many records were stored; malformed records are skipped.
    ///
    /// # Errors
    ///
    /// Stops at the first persistence failure.
    pub async fn drain_backlog<I>(&self, records: I) -> Result<usize, Error>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut processed = 0_usize;
        let mut skipped = 0_usize;
        for record in records {
            if self.handle_notification(record.as_ref()).await?.is_some() {
                processed += 1;
            } else {
                skipped += 1;
            }
        }
        debug!(processed, skipped, "onboarding backlog drained");
        Ok(processed)
    }

    /// Totals for one flattened key, highest count first.
    ///
    /// # Errors
    ///
    /// Propagates persistence failures.
    pub async fn totals_for_key(&self, answer_key: &str) -> Result<Vec<AggregateTotal>, Error> {
        self.snapshots
            .totals_for_key(answer_key)
            .await
            .map_err(map_snapshot_error)
    }
}
