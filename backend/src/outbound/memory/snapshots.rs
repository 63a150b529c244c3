//! In-process snapshot store with incremental totals.
//!
//! One mutex guards both snapshots and totals, so the read-previous /
//! replace / apply-delta sequence is atomic per store.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use mockable::Clock;
use pagination::{Page, PageRequest};

use crate::domain::OnboardingSessionId;
use crate::domain::onboarding::{
    AggregateTotal, OnboardingAnswerSnapshot, SnapshotOrder, SnapshotQuery, TotalsDelta,
};
use crate::domain::ports::{OnboardingSnapshotRepository, OnboardingSnapshotRepositoryError};

#[derive(Default)]
struct Store {
    snapshots: HashMap<OnboardingSessionId, OnboardingAnswerSnapshot>,
    totals: BTreeMap<(String, String), AggregateTotal>,
}

/// Snapshot repository held in memory.
pub struct InMemoryOnboardingSnapshotRepository {
    store: Mutex<Store>,
    clock: Arc<dyn Clock>,
}

impl InMemoryOnboardingSnapshotRepository {
    /// Empty store stamping totals with `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Mutex::new(Store::default()),
            clock,
        }
    }

    /// Current total for one pair; zero when never counted.
    pub fn total(&self, answer_key: &str, answer_value: &str) -> i64 {
        self.lock()
            .totals
            .get(&(answer_key.to_owned(), answer_value.to_owned()))
            .map_or(0, |total| total.total)
    }

    /// Number of stored snapshots.
    pub fn snapshot_count(&self) -> usize {
        self.lock().snapshots.len()
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ordered(store: &Store, query: &SnapshotQuery) -> Vec<OnboardingAnswerSnapshot> {
        let mut matching: Vec<_> = store
            .snapshots
            .values()
            .filter(|snapshot| query.matches(snapshot))
            .cloned()
            .collect();
        matching.sort_by(|left, right| {
            (left.submitted_at, &left.session_id).cmp(&(right.submitted_at, &right.session_id))
        });
        if query.order == SnapshotOrder::Descending {
            matching.reverse();
        }
        matching
    }
}

fn window<T>(items: Vec<T>, offset: u64, limit: u32) -> Vec<T> {
    let offset = usize::try_from(offset).unwrap_or(usize::MAX);
    let limit = usize::try_from(limit).unwrap_or(usize::MAX);
    items.into_iter().skip(offset).take(limit).collect()
}

#[async_trait]
impl OnboardingSnapshotRepository for InMemoryOnboardingSnapshotRepository {
    async fn upsert_snapshot(
        &self,
        snapshot: &OnboardingAnswerSnapshot,
    ) -> Result<TotalsDelta, OnboardingSnapshotRepositoryError> {
        let now = self.clock.utc();
        let mut store = self.lock();
        let previous = store
            .snapshots
            .insert(snapshot.session_id.clone(), snapshot.clone());
        let delta = TotalsDelta::between(
            previous.as_ref().map(|previous| &previous.flat_answers),
            &snapshot.flat_answers,
        );

        for (key, value) in &delta.removed {
            if let Some(total) = store.totals.get_mut(&(key.clone(), value.clone())) {
                total.total = (total.total - 1).max(0);
                total.updated_at = now;
            }
        }
        for (key, value) in &delta.added {
            store
                .totals
                .entry((key.clone(), value.clone()))
                .and_modify(|total| {
                    total.total += 1;
                    total.updated_at = now;
                })
                .or_insert_with(|| AggregateTotal {
                    answer_key: key.clone(),
                    answer_value: value.clone(),
                    total: 1,
                    updated_at: now,
                });
        }
        Ok(delta)
    }

    async fn list_snapshots(
        &self,
        query: &SnapshotQuery,
        page: PageRequest,
    ) -> Result<Page<OnboardingAnswerSnapshot>, OnboardingSnapshotRepositoryError> {
        let matching = Self::ordered(&self.lock(), query);
        let total = u64::try_from(matching.len()).unwrap_or(u64::MAX);
        Ok(Page::new(
            window(matching, page.offset(), page.limit()),
            total,
            page,
        ))
    }

    async fn fetch_batch(
        &self,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<OnboardingAnswerSnapshot>, OnboardingSnapshotRepositoryError> {
        let ordered = Self::ordered(&self.lock(), &SnapshotQuery::default());
        Ok(window(ordered, offset, limit))
    }

    async fn totals_for_key(
        &self,
        answer_key: &str,
    ) -> Result<Vec<AggregateTotal>, OnboardingSnapshotRepositoryError> {
        let mut totals: Vec<_> = self
            .lock()
            .totals
            .values()
            .filter(|total| total.answer_key == answer_key)
            .cloned()
            .collect();
        totals.sort_by(|left, right| {
            (Reverse(left.total), &left.answer_value).cmp(&(Reverse(right.total), &right.answer_value))
        });
        Ok(totals)
    }
}
