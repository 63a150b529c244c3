//! PostgreSQL-backed `OnboardingSnapshotRepository` implementation.
//!
//! A snapshot upsert runs in one transaction that first takes
//! `pg_advisory_xact_lock(hashtext(session_id))`. Concurrent resubmissions of
//! one session therefore read the previous answers, replace the row, and apply
//! the totals delta one after another; different sessions only contend on the
//! totals rows they share.

use async_trait::async_trait;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::{Array, Text};
use diesel_async::RunQueryDsl;
use pagination::{Page, PageRequest};
use serde_json::{Value, json};

use crate::domain::onboarding::{
    AggregateTotal, FlatAnswers, OnboardingAnswerSnapshot, ROLE_ANSWER_KEY, SnapshotOrder,
    SnapshotQuery, TotalsDelta,
};
use crate::domain::ports::{OnboardingSnapshotRepository, OnboardingSnapshotRepositoryError};
use crate::domain::{OnboardingSessionId, UserId};

use super::diesel_basic_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::models::{NewSnapshotRow, SnapshotRow, TotalRow};
use super::pool::DbPool;
use super::schema::{onboarding_answer_snapshots, onboarding_answer_totals};

const LOCK_SESSION_SQL: &str = "SELECT pg_advisory_xact_lock(hashtext($1))";

const DECREMENT_TOTALS_SQL: &str = r#"
UPDATE onboarding_answer_totals AS totals
SET total = GREATEST(totals.total - 1, 0),
    updated_at = now()
FROM unnest($1::text[], $2::text[]) AS pair(answer_key, answer_value)
WHERE totals.answer_key = pair.answer_key
  AND totals.answer_value = pair.answer_value
"#;

const INCREMENT_TOTALS_SQL: &str = r#"
INSERT INTO onboarding_answer_totals (answer_key, answer_value, total, updated_at)
SELECT pair.answer_key, pair.answer_value, 1, now()
FROM unnest($1::text[], $2::text[]) AS pair(answer_key, answer_value)
ON CONFLICT (answer_key, answer_value)
DO UPDATE SET
    total = onboarding_answer_totals.total + 1,
    updated_at = now()
"#;

/// Diesel-backed implementation of the `OnboardingSnapshotRepository` port.
#[derive(Clone)]
pub struct DieselOnboardingSnapshotRepository {
    pool: DbPool,
}

impl DieselOnboardingSnapshotRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Failure inside the upsert transaction.
enum UpsertFailure {
    Diesel(diesel::result::Error),
    Decode(String),
}

impl From<diesel::result::Error> for UpsertFailure {
    fn from(error: diesel::result::Error) -> Self {
        Self::Diesel(error)
    }
}

impl From<UpsertFailure> for OnboardingSnapshotRepositoryError {
    fn from(failure: UpsertFailure) -> Self {
        match failure {
            UpsertFailure::Diesel(error) => map_diesel_error(error),
            UpsertFailure::Decode(message) => Self::decode(message),
        }
    }
}

fn map_diesel_error(error: diesel::result::Error) -> OnboardingSnapshotRepositoryError {
    map_basic_diesel_error(
        error,
        OnboardingSnapshotRepositoryError::query,
        OnboardingSnapshotRepositoryError::connection,
    )
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn decode_flat_answers(value: Value) -> Result<FlatAnswers, String> {
    serde_json::from_value(value).map_err(|err| format!("flat_answers: {err}"))
}

fn row_to_snapshot(row: SnapshotRow) -> Result<OnboardingAnswerSnapshot, OnboardingSnapshotRepositoryError> {
    let answer_groups = match row.answer_groups {
        Value::Object(groups) => groups,
        other => {
            return Err(OnboardingSnapshotRepositoryError::decode(format!(
                "answer_groups is not an object: {other}"
            )));
        }
    };
    Ok(OnboardingAnswerSnapshot {
        session_id: OnboardingSessionId::new(&row.session_id)
            .map_err(|err| OnboardingSnapshotRepositoryError::decode(err.to_string()))?,
        user_id: UserId::new(&row.user_id)
            .map_err(|err| OnboardingSnapshotRepositoryError::decode(err.to_string()))?,
        workspace_id: row.workspace_id,
        submitted_at: row.submitted_at,
        answer_groups,
        flat_answers: decode_flat_answers(row.flat_answers)
            .map_err(OnboardingSnapshotRepositoryError::decode)?,
        schema_version: row.schema_version,
    })
}

fn row_to_total(row: TotalRow) -> AggregateTotal {
    AggregateTotal {
        answer_key: row.answer_key,
        answer_value: row.answer_value,
        total: row.total,
        updated_at: row.updated_at,
    }
}

fn split_pairs(pairs: &std::collections::BTreeSet<(String, String)>) -> (Vec<String>, Vec<String>) {
    pairs.iter().cloned().unzip()
}

fn filtered(query: &SnapshotQuery) -> onboarding_answer_snapshots::BoxedQuery<'static, Pg> {
    use onboarding_answer_snapshots::dsl;

    let mut statement = dsl::onboarding_answer_snapshots.into_boxed();
    if let Some(workspace_id) = &query.workspace_id {
        statement = statement.filter(dsl::workspace_id.eq(workspace_id.clone()));
    }
    if let Some(from) = query.submitted_from {
        statement = statement.filter(dsl::submitted_at.ge(from));
    }
    if let Some(before) = query.submitted_before {
        statement = statement.filter(dsl::submitted_at.lt(before));
    }
    if let Some(role) = &query.role {
        statement = statement.filter(dsl::flat_answers.contains(json!({ ROLE_ANSWER_KEY: [role] })));
    }
    statement
}

#[async_trait]
impl OnboardingSnapshotRepository for DieselOnboardingSnapshotRepository {
    async fn upsert_snapshot(
        &self,
        snapshot: &OnboardingAnswerSnapshot,
    ) -> Result<TotalsDelta, OnboardingSnapshotRepositoryError> {
        use diesel_async::AsyncConnection as _;
        use diesel_async::scoped_futures::ScopedFutureExt as _;

        let flat_answers = serde_json::to_value(&snapshot.flat_answers)
            .map_err(|err| OnboardingSnapshotRepositoryError::decode(err.to_string()))?;
        let row = NewSnapshotRow {
            session_id: snapshot.session_id.as_str(),
            user_id: snapshot.user_id.as_str(),
            workspace_id: snapshot.workspace_id.as_deref(),
            submitted_at: snapshot.submitted_at,
            answer_groups: Value::Object(snapshot.answer_groups.clone()),
            flat_answers,
            schema_version: snapshot.schema_version,
        };
        let row = &row;
        let current = &snapshot.flat_answers;

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_basic_pool_error(err, OnboardingSnapshotRepositoryError::connection))?;

        let delta = conn
            .transaction::<_, UpsertFailure, _>(|conn| {
                async move {
                    sql_query(LOCK_SESSION_SQL)
                        .bind::<Text, _>(row.session_id)
                        .execute(conn)
                        .await?;

                    let previous: Option<Value> = onboarding_answer_snapshots::table
                        .filter(onboarding_answer_snapshots::session_id.eq(row.session_id))
                        .select(onboarding_answer_snapshots::flat_answers)
                        .first(conn)
                        .await
                        .optional()?;
                    let previous = previous
                        .map(decode_flat_answers)
                        .transpose()
                        .map_err(UpsertFailure::Decode)?;

                    diesel::insert_into(onboarding_answer_snapshots::table)
                        .values(row)
                        .on_conflict(onboarding_answer_snapshots::session_id)
                        .do_update()
                        .set((row, onboarding_answer_snapshots::updated_at.eq(diesel::dsl::now)))
                        .execute(conn)
                        .await?;

                    let delta = TotalsDelta::between(previous.as_ref(), current);
                    if !delta.removed.is_empty() {
                        let (keys, values) = split_pairs(&delta.removed);
                        sql_query(DECREMENT_TOTALS_SQL)
                            .bind::<Array<Text>, _>(&keys)
                            .bind::<Array<Text>, _>(&values)
                            .execute(conn)
                            .await?;
                    }
                    if !delta.added.is_empty() {
                        let (keys, values) = split_pairs(&delta.added);
                        sql_query(INCREMENT_TOTALS_SQL)
                            .bind::<Array<Text>, _>(&keys)
                            .bind::<Array<Text>, _>(&values)
                            .execute(conn)
                            .await?;
                    }
                    Ok(delta)
                }
                .scope_boxed()
            })
            .await?;
        Ok(delta)
    }

    async fn list_snapshots(
        &self,
        query: &SnapshotQuery,
        page: PageRequest,
    ) -> Result<Page<OnboardingAnswerSnapshot>, OnboardingSnapshotRepositoryError> {
        use onboarding_answer_snapshots::dsl;

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_basic_pool_error(err, OnboardingSnapshotRepositoryError::connection))?;

        let total: i64 = filtered(query)
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        let ordered = match query.order {
            SnapshotOrder::Ascending => {
                filtered(query).order((dsl::submitted_at.asc(), dsl::session_id.asc()))
            }
            SnapshotOrder::Descending => {
                filtered(query).order((dsl::submitted_at.desc(), dsl::session_id.desc()))
            }
        };
        let rows: Vec<SnapshotRow> = ordered
            .offset(to_i64(page.offset()))
            .limit(i64::from(page.limit()))
            .select(SnapshotRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        let items = rows
            .into_iter()
            .map(row_to_snapshot)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, u64::try_from(total).unwrap_or(0), page))
    }

    async fn fetch_batch(
        &self,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<OnboardingAnswerSnapshot>, OnboardingSnapshotRepositoryError> {
        use onboarding_answer_snapshots::dsl;

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_basic_pool_error(err, OnboardingSnapshotRepositoryError::connection))?;

        let rows: Vec<SnapshotRow> = dsl::onboarding_answer_snapshots
            .order((dsl::submitted_at.asc(), dsl::session_id.asc()))
            .offset(to_i64(offset))
            .limit(i64::from(limit))
            .select(SnapshotRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        rows.into_iter().map(row_to_snapshot).collect()
    }

    async fn totals_for_key(
        &self,
        answer_key: &str,
    ) -> Result<Vec<AggregateTotal>, OnboardingSnapshotRepositoryError> {
        use onboarding_answer_totals::dsl;

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_basic_pool_error(err, OnboardingSnapshotRepositoryError::connection))?;

        let rows: Vec<TotalRow> = dsl::onboarding_answer_totals
            .filter(dsl::answer_key.eq(answer_key))
            .order((dsl::total.desc(), dsl::answer_value.asc()))
            .select(TotalRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(row_to_total).collect())
    }
}
