//! SqliteTaskStore - sqlx による TaskStore
//!
//! 条件付き書き込みは 1 文で表現します:
//! - insert_if_absent: `INSERT ... ON CONFLICT DO NOTHING`
//! - update_if: `UPDATE ... WHERE <key> AND <condition>`
//!
//! badStateEnterTimeIndex は `(process_id, bad_state_enter_time)` の SQL
//! インデックスです。時刻は epoch ミリ秒、TTL は epoch 秒で保存します。

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use tracing::debug;

use crate::domain::{BadStateEnterTime, ProcessId, TaskCompletion, TaskKey, TaskRecord, TaskState};
use crate::ports::{
    BAD_STATE_ENTER_TIME_INDEX, IndexName, InsertOutcome, Predicate, SortCondition, SortOrder,
    StoreError, TaskStore, UpdateCondition, UpdateOutcome,
};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS tasks (
    process_id TEXT NOT NULL,
    task_id TEXT NOT NULL,
    expiration_time INTEGER NOT NULL,
    state TEXT NOT NULL,
    state_message TEXT,
    bad_state_enter_time INTEGER NOT NULL,
    ttl INTEGER NOT NULL,
    PRIMARY KEY (process_id, task_id)
)";

const CREATE_BAD_STATE_INDEX: &str = "CREATE INDEX IF NOT EXISTS bad_state_enter_time_index \
    ON tasks (process_id, bad_state_enter_time)";

const SELECT_COLUMNS: &str = "SELECT process_id, task_id, expiration_time, state, state_message, \
    bad_state_enter_time, ttl FROM tasks";

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Backend(Box::new(e))
    }
}

/// SQLite-backed TaskStore.
#[derive(Debug, Clone)]
pub struct SqliteTaskStore {
    pool: SqlitePool,
}

impl SqliteTaskStore {
    /// Open (or create) the database at `url` and make sure the schema exists.
    ///
    /// In-memory URLs (`sqlite::memory:`) are pinned to a single connection
    /// that is never recycled, since every SQLite connection to `:memory:`
    /// opens its own private database.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");

        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(8)
        };
        let pool = pool_options.connect_with(options).await?;

        let store = Self { pool };
        store.migrate().await?;
        debug!(url, in_memory, "sqlite task store ready");
        Ok(store)
    }

    /// Create the table and the sort index if missing.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        sqlx::query(CREATE_BAD_STATE_INDEX).execute(&self.pool).await?;
        Ok(())
    }

    /// Delete every record whose TTL has passed. Returns the number removed.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM tasks WHERE ttl <= ?")
            .bind(now.timestamp())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    fn index_table_name(index: IndexName) -> Result<&'static str, StoreError> {
        if index == BAD_STATE_ENTER_TIME_INDEX {
            Ok("bad_state_enter_time_index")
        } else {
            Err(StoreError::UnknownIndex(index.as_str()))
        }
    }
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn corrupted(key: String, reason: impl Into<String>) -> StoreError {
    StoreError::Corrupted {
        key,
        reason: reason.into(),
    }
}

fn decode_record(row: &SqliteRow) -> Result<TaskRecord, StoreError> {
    let process_id: String = row.try_get("process_id")?;
    let task_id: String = row.try_get("task_id")?;
    let raw_key = format!("{process_id}/{task_id}");

    let key = TaskKey::parse(process_id, task_id)
        .map_err(|e| corrupted(raw_key.clone(), e.to_string()))?;

    let state_text: String = row.try_get("state")?;
    let state = TaskState::from_str(&state_text)
        .map_err(|e| corrupted(raw_key.clone(), e.to_string()))?;

    let expiration_millis: i64 = row.try_get("expiration_time")?;
    let expiration_time = Utc
        .timestamp_millis_opt(expiration_millis)
        .single()
        .ok_or_else(|| corrupted(raw_key.clone(), format!("expiration_time out of range: {expiration_millis}")))?;

    let ttl_secs: i64 = row.try_get("ttl")?;
    let ttl = Utc
        .timestamp_opt(ttl_secs, 0)
        .single()
        .ok_or_else(|| corrupted(raw_key.clone(), format!("ttl out of range: {ttl_secs}")))?;

    Ok(TaskRecord {
        key,
        expiration_time,
        state,
        state_message: row.try_get("state_message")?,
        bad_state_enter_time: BadStateEnterTime::from_millis(row.try_get("bad_state_enter_time")?),
        ttl,
    })
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn insert_if_absent(&self, record: TaskRecord) -> Result<InsertOutcome, StoreError> {
        let result = sqlx::query(
            "INSERT INTO tasks (process_id, task_id, expiration_time, state, state_message, \
             bad_state_enter_time, ttl) VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (process_id, task_id) DO NOTHING",
        )
        .bind(record.key.process_id.as_str())
        .bind(record.key.task_id.as_str())
        .bind(record.expiration_time.timestamp_millis())
        .bind(record.state.as_str())
        .bind(record.state_message.as_deref())
        .bind(record.bad_state_enter_time.as_millis())
        .bind(record.ttl.timestamp())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            Ok(InsertOutcome::Inserted)
        } else {
            Ok(InsertOutcome::AlreadyExists)
        }
    }

    async fn update_if(
        &self,
        key: &TaskKey,
        completion: &TaskCompletion,
        condition: &UpdateCondition,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE tasks SET state = ");
        builder
            .push_bind(completion.state().as_str())
            .push(", state_message = ")
            .push_bind(completion.message().map(str::to_string))
            .push(", bad_state_enter_time = ")
            .push_bind(completion.bad_state_enter_time().as_millis())
            .push(" WHERE process_id = ")
            .push_bind(key.process_id.as_str().to_string())
            .push(" AND task_id = ")
            .push_bind(key.task_id.as_str().to_string());

        // 行が存在しなければ WHERE に一致しないので Exists は暗黙
        for predicate in condition.predicates() {
            match predicate {
                Predicate::Exists => {}
                Predicate::ExpiresAfter(instant) => {
                    builder
                        .push(" AND expiration_time > ")
                        .push_bind(instant.timestamp_millis());
                }
                Predicate::StateIs(state) => {
                    builder.push(" AND state = ").push_bind(state.as_str());
                }
            }
        }

        let result = builder.build().execute(&self.pool).await?;
        if result.rows_affected() == 1 {
            Ok(UpdateOutcome::Updated)
        } else {
            Ok(UpdateOutcome::ConditionFailed)
        }
    }

    async fn query_by_partition(
        &self,
        process_id: &ProcessId,
        limit: usize,
    ) -> Result<Vec<TaskRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE process_id = ? ORDER BY task_id LIMIT ?"
        ))
        .bind(process_id.as_str())
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_record).collect()
    }

    async fn query_by_sort_range(
        &self,
        process_id: &ProcessId,
        index: IndexName,
        condition: SortCondition,
        order: SortOrder,
        limit: usize,
    ) -> Result<Vec<TaskRecord>, StoreError> {
        let index_name = Self::index_table_name(index)?;

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_COLUMNS);
        builder
            .push(" INDEXED BY ")
            .push(index_name)
            .push(" WHERE process_id = ")
            .push_bind(process_id.as_str().to_string());

        match condition {
            SortCondition::GreaterThan(bound) => {
                builder.push(" AND bad_state_enter_time > ").push_bind(bound.as_millis());
            }
            SortCondition::LessThan(bound) => {
                builder.push(" AND bad_state_enter_time < ").push_bind(bound.as_millis());
            }
        }

        builder.push(match order {
            SortOrder::Ascending => " ORDER BY bad_state_enter_time ASC, task_id ASC",
            SortOrder::Descending => " ORDER BY bad_state_enter_time DESC, task_id DESC",
        });
        builder.push(" LIMIT ").push_bind(sql_limit(limit));

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(decode_record).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TerminalState;
    use chrono::Duration;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn record(process: &str, task: &str, expiration: DateTime<Utc>) -> TaskRecord {
        TaskRecord::registered(
            TaskKey::parse(process, task).unwrap(),
            expiration,
            expiration + Duration::days(1),
        )
    }

    async fn store() -> SqliteTaskStore {
        SqliteTaskStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn records_survive_a_round_trip() {
        let store = store().await;
        let original = record("p1", "t1", noon());
        store.insert_if_absent(original.clone()).await.unwrap();

        let found = store
            .query_by_partition(&ProcessId::parse("p1").unwrap(), 1)
            .await
            .unwrap();
        assert_eq!(found, vec![original]);
    }

    #[tokio::test]
    async fn duplicate_insert_keeps_first_record() {
        let store = store().await;
        let first = store.insert_if_absent(record("p1", "t1", noon())).await.unwrap();
        let second = store
            .insert_if_absent(record("p1", "t1", noon() + Duration::hours(2)))
            .await
            .unwrap();
        assert_eq!(first, InsertOutcome::Inserted);
        assert_eq!(second, InsertOutcome::AlreadyExists);

        let found = store
            .query_by_partition(&ProcessId::parse("p1").unwrap(), 10)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].expiration_time, noon());
    }

    #[tokio::test]
    async fn conditional_update_applies_once() {
        let store = store().await;
        let key = TaskKey::parse("p1", "t1").unwrap();
        store.insert_if_absent(record("p1", "t1", noon())).await.unwrap();

        let now = noon() - Duration::hours(1);
        let completion = TaskCompletion::new(TerminalState::Aborted, Some("boom".into()), now);
        let condition = UpdateCondition::exists()
            .and(Predicate::ExpiresAfter(now))
            .and(Predicate::StateIs(TaskState::Created));

        assert_eq!(
            store.update_if(&key, &completion, &condition).await.unwrap(),
            UpdateOutcome::Updated
        );
        assert_eq!(
            store.update_if(&key, &completion, &condition).await.unwrap(),
            UpdateOutcome::ConditionFailed
        );

        let found = store.query_by_partition(&key.process_id, 1).await.unwrap();
        assert_eq!(found[0].state, TaskState::Aborted);
        assert_eq!(found[0].state_message.as_deref(), Some("boom"));
        assert_eq!(found[0].bad_state_enter_time, BadStateEnterTime::from_instant(now));
    }

    #[tokio::test]
    async fn expired_task_fails_deadline_predicate() {
        let store = store().await;
        let key = TaskKey::parse("p1", "t1").unwrap();
        store.insert_if_absent(record("p1", "t1", noon())).await.unwrap();

        let completion = TaskCompletion::new(TerminalState::Finished, None, noon());
        let condition = UpdateCondition::exists().and(Predicate::ExpiresAfter(noon()));
        assert_eq!(
            store.update_if(&key, &completion, &condition).await.unwrap(),
            UpdateOutcome::ConditionFailed
        );
    }

    #[tokio::test]
    async fn sort_range_returns_smallest_candidate_first() {
        let store = store().await;
        store.insert_if_absent(record("p1", "late", noon() + Duration::hours(3))).await.unwrap();
        store.insert_if_absent(record("p1", "early", noon() + Duration::hours(1))).await.unwrap();
        store.insert_if_absent(record("p1", "done", noon())).await.unwrap();
        let done = TaskKey::parse("p1", "done").unwrap();
        store
            .update_if(
                &done,
                &TaskCompletion::new(TerminalState::Finished, None, noon() - Duration::hours(1)),
                &UpdateCondition::exists(),
            )
            .await
            .unwrap();

        let found = store
            .query_by_sort_range(
                &done.process_id,
                BAD_STATE_ENTER_TIME_INDEX,
                SortCondition::GreaterThan(BadStateEnterTime::NOT_A_CANDIDATE),
                SortOrder::Ascending,
                5,
            )
            .await
            .unwrap();
        let ids: Vec<&str> = found.iter().map(|r| r.key.task_id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[tokio::test]
    async fn unknown_stored_state_is_reported_as_corruption() {
        let store = store().await;
        store.insert_if_absent(record("p1", "t1", noon())).await.unwrap();
        sqlx::query("UPDATE tasks SET state = 'RUNNING'")
            .execute(&store.pool)
            .await
            .unwrap();

        let err = store
            .query_by_partition(&ProcessId::parse("p1").unwrap(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Corrupted { .. }));
    }

    #[tokio::test]
    async fn purge_deletes_only_expired_ttl() {
        let store = store().await;
        store.insert_if_absent(record("p1", "old", noon() - Duration::days(3))).await.unwrap();
        store.insert_if_absent(record("p1", "new", noon())).await.unwrap();

        assert_eq!(store.purge_expired(noon()).await.unwrap(), 1);
        let left = store
            .query_by_partition(&ProcessId::parse("p1").unwrap(), 10)
            .await
            .unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].key.task_id.as_str(), "new");
    }
}
