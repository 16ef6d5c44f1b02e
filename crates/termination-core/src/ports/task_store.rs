//! TaskStore port - タスクレコードの正本（source of truth）
//!
//! 単一アイテムの条件付き書き込みだけを前提にします。複数アイテムに
//! またがるトランザクションはありません。
//!
//! # 実装
//! - `impls::InMemoryTaskStore`（開発・テスト用）
//! - `impls::SqliteTaskStore`（sqlx、`UPDATE ... WHERE` で CAS を表現）

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{BadStateEnterTime, ProcessId, TaskCompletion, TaskKey, TaskRecord, TaskState};

/// Name of a secondary index over the task table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexName(&'static str);

impl IndexName {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn as_str(self) -> &'static str {
        self.0
    }
}

/// `(process_id, bad_state_enter_time)` index used by the candidate query.
pub const BAD_STATE_ENTER_TIME_INDEX: IndexName = IndexName::new("badStateEnterTimeIndex");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyExists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    ConditionFailed,
}

/// One clause of an update condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    /// The item exists.
    Exists,

    /// `expiration_time > instant`.
    ExpiresAfter(DateTime<Utc>),

    /// `state == value`.
    StateIs(TaskState),
}

impl Predicate {
    fn holds(&self, record: Option<&TaskRecord>) -> bool {
        match (self, record) {
            (Predicate::Exists, record) => record.is_some(),
            (Predicate::ExpiresAfter(instant), Some(record)) => record.expiration_time > *instant,
            (Predicate::StateIs(state), Some(record)) => record.state == *state,
            (_, None) => false,
        }
    }
}

/// Conjunction of predicates evaluated atomically with the update.
///
/// `update_if` never creates items, so a missing item fails every condition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateCondition {
    predicates: Vec<Predicate>,
}

impl UpdateCondition {
    pub fn exists() -> Self {
        Self {
            predicates: vec![Predicate::Exists],
        }
    }

    pub fn and(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Evaluate against the current item (or its absence).
    pub fn holds(&self, record: Option<&TaskRecord>) -> bool {
        record.is_some() && self.predicates.iter().all(|p| p.holds(record))
    }
}

/// Range condition on an index sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortCondition {
    GreaterThan(BadStateEnterTime),
    LessThan(BadStateEnterTime),
}

impl SortCondition {
    pub fn matches(self, value: BadStateEnterTime) -> bool {
        match self {
            SortCondition::GreaterThan(bound) => value > bound,
            SortCondition::LessThan(bound) => value < bound,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Failures of the backend itself. Conditional-check failures are not errors
/// and are reported through `InsertOutcome` / `UpdateOutcome`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("stored task {key} is corrupted: {reason}")]
    Corrupted { key: String, reason: String },

    #[error("unknown index: {0}")]
    UnknownIndex(&'static str),
}

/// TaskStore はタスクレコードの条件付き書き込みとクエリを提供
///
/// # 設計原則
/// - すべての変更は単一アイテムの条件付き書き込み（CAS）
/// - 読み取りは強整合（直前にコミットされた書き込みが見える）
/// - 再試行はしない（呼び出し側の責務）
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert `record` unless an item with the same key exists.
    async fn insert_if_absent(&self, record: TaskRecord) -> Result<InsertOutcome, StoreError>;

    /// Apply `completion` to the item at `key` if `condition` holds, atomically.
    async fn update_if(
        &self,
        key: &TaskKey,
        completion: &TaskCompletion,
        condition: &UpdateCondition,
    ) -> Result<UpdateOutcome, StoreError>;

    /// Up to `limit` items of one partition, in task id order.
    async fn query_by_partition(
        &self,
        process_id: &ProcessId,
        limit: usize,
    ) -> Result<Vec<TaskRecord>, StoreError>;

    /// Up to `limit` items of one partition whose `index` sort key matches
    /// `condition`, ordered by that sort key.
    async fn query_by_sort_range(
        &self,
        process_id: &ProcessId,
        index: IndexName,
        condition: SortCondition,
        order: SortOrder,
        limit: usize,
    ) -> Result<Vec<TaskRecord>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn record() -> TaskRecord {
        let expiration = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        TaskRecord::registered(
            TaskKey::parse("p1", "t1").unwrap(),
            expiration,
            expiration + Duration::days(1),
        )
    }

    #[test]
    fn missing_item_fails_every_condition() {
        assert!(!UpdateCondition::exists().holds(None));
        assert!(!UpdateCondition::default().holds(None));
    }

    #[test]
    fn completion_condition_checks_deadline_and_state() {
        let record = record();
        let before = record.expiration_time - Duration::seconds(1);
        let condition = UpdateCondition::exists()
            .and(Predicate::ExpiresAfter(before))
            .and(Predicate::StateIs(TaskState::Created));
        assert!(condition.holds(Some(&record)));

        let at_deadline = UpdateCondition::exists().and(Predicate::ExpiresAfter(record.expiration_time));
        assert!(!at_deadline.holds(Some(&record)));

        let finished = UpdateCondition::exists().and(Predicate::StateIs(TaskState::Finished));
        assert!(!finished.holds(Some(&record)));
    }

    #[test]
    fn sort_conditions_are_strict() {
        let zero = BadStateEnterTime::NOT_A_CANDIDATE;
        assert!(!SortCondition::GreaterThan(zero).matches(zero));
        assert!(SortCondition::GreaterThan(zero).matches(BadStateEnterTime::from_millis(1)));
        assert!(SortCondition::LessThan(BadStateEnterTime::from_millis(1)).matches(zero));
    }
}
