//! InMemoryTaskStore - 開発・テスト用の TaskStore
//!
//! # 実装詳細
//! - `BTreeMap<ProcessId, BTreeMap<TaskId, TaskRecord>>` がベーステーブル
//! - `BTreeMap<ProcessId, BTreeSet<(BadStateEnterTime, TaskId)>>` が
//!   badStateEnterTimeIndex
//! - tokio Mutex 1 つで排他制御。条件判定と書き込みは同じクリティカル
//!   セクション内で行うので、バックエンドの CAS と同じ原子性になる

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::{BadStateEnterTime, ProcessId, TaskCompletion, TaskId, TaskKey, TaskRecord};
use crate::ports::{
    BAD_STATE_ENTER_TIME_INDEX, IndexName, InsertOutcome, SortCondition, SortOrder, StoreError,
    TaskStore, UpdateCondition, UpdateOutcome,
};

/// Base table plus its one secondary index.
///
/// Invariant: every record in `tables` has exactly one entry in `index`, keyed
/// by its current `bad_state_enter_time`.
#[derive(Default)]
struct InMemoryStoreState {
    tables: BTreeMap<ProcessId, BTreeMap<TaskId, TaskRecord>>,
    index: BTreeMap<ProcessId, BTreeSet<(BadStateEnterTime, TaskId)>>,
}

impl InMemoryStoreState {
    fn get(&self, key: &TaskKey) -> Option<&TaskRecord> {
        self.tables.get(&key.process_id)?.get(&key.task_id)
    }

    fn insert(&mut self, record: TaskRecord) {
        let key = record.key.clone();
        self.index
            .entry(key.process_id.clone())
            .or_default()
            .insert((record.bad_state_enter_time, key.task_id.clone()));
        self.tables
            .entry(key.process_id)
            .or_default()
            .insert(key.task_id, record);
    }

    /// Move the index entry of `key` from `old` to `new`.
    fn reindex(&mut self, key: &TaskKey, old: BadStateEnterTime, new: BadStateEnterTime) {
        if old == new {
            return;
        }
        let entries = self.index.entry(key.process_id.clone()).or_default();
        entries.remove(&(old, key.task_id.clone()));
        entries.insert((new, key.task_id.clone()));
    }

    fn remove(&mut self, key: &TaskKey) -> Option<TaskRecord> {
        let table = self.tables.get_mut(&key.process_id)?;
        let record = table.remove(&key.task_id)?;
        if table.is_empty() {
            self.tables.remove(&key.process_id);
        }
        if let Some(entries) = self.index.get_mut(&key.process_id) {
            entries.remove(&(record.bad_state_enter_time, key.task_id.clone()));
            if entries.is_empty() {
                self.index.remove(&key.process_id);
            }
        }
        Some(record)
    }
}

/// In-memory TaskStore.
///
/// Clone は同じテーブルを共有します。
#[derive(Clone, Default)]
pub struct InMemoryTaskStore {
    state: Arc<Mutex<InMemoryStoreState>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point read of one record.
    pub async fn get(&self, key: &TaskKey) -> Option<TaskRecord> {
        let state = self.state.lock().await;
        state.get(key).cloned()
    }

    /// Number of stored records across all processes.
    pub async fn len(&self) -> usize {
        let state = self.state.lock().await;
        state.tables.values().map(BTreeMap::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every record whose TTL has passed, the way a TTL-enabled backend
    /// reclaims items. Returns how many were removed.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut state = self.state.lock().await;
        let expired: Vec<TaskKey> = state
            .tables
            .values()
            .flat_map(BTreeMap::values)
            .filter(|record| record.ttl <= now)
            .map(|record| record.key.clone())
            .collect();
        for key in &expired {
            state.remove(key);
        }
        expired.len()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn insert_if_absent(&self, record: TaskRecord) -> Result<InsertOutcome, StoreError> {
        let mut state = self.state.lock().await;
        if state.get(&record.key).is_some() {
            return Ok(InsertOutcome::AlreadyExists);
        }
        state.insert(record);
        Ok(InsertOutcome::Inserted)
    }

    async fn update_if(
        &self,
        key: &TaskKey,
        completion: &TaskCompletion,
        condition: &UpdateCondition,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut state = self.state.lock().await;
        if !condition.holds(state.get(key)) {
            return Ok(UpdateOutcome::ConditionFailed);
        }

        let Some(record) = state
            .tables
            .get_mut(&key.process_id)
            .and_then(|table| table.get_mut(&key.task_id))
        else {
            return Ok(UpdateOutcome::ConditionFailed);
        };
        let old = record.bad_state_enter_time;
        record.apply(completion);
        let new = record.bad_state_enter_time;
        state.reindex(key, old, new);

        Ok(UpdateOutcome::Updated)
    }

    async fn query_by_partition(
        &self,
        process_id: &ProcessId,
        limit: usize,
    ) -> Result<Vec<TaskRecord>, StoreError> {
        let state = self.state.lock().await;
        let Some(table) = state.tables.get(process_id) else {
            return Ok(Vec::new());
        };
        Ok(table.values().take(limit).cloned().collect())
    }

    async fn query_by_sort_range(
        &self,
        process_id: &ProcessId,
        index: IndexName,
        condition: SortCondition,
        order: SortOrder,
        limit: usize,
    ) -> Result<Vec<TaskRecord>, StoreError> {
        if index != BAD_STATE_ENTER_TIME_INDEX {
            return Err(StoreError::UnknownIndex(index.as_str()));
        }

        let state = self.state.lock().await;
        let Some(entries) = state.index.get(process_id) else {
            return Ok(Vec::new());
        };

        let mut matching: Vec<&TaskId> = entries
            .iter()
            .filter(|(value, _)| condition.matches(*value))
            .map(|(_, task_id)| task_id)
            .collect();
        if order == SortOrder::Descending {
            matching.reverse();
        }

        let mut found = Vec::new();
        for task_id in matching.into_iter().take(limit) {
            let key = TaskKey::new(process_id.clone(), task_id.clone());
            // index と table は同じロック内で同期しているので必ず見つかる
            let record = state.get(&key).ok_or_else(|| StoreError::Corrupted {
                key: key.to_string(),
                reason: "index entry without a base record".to_string(),
            })?;
            found.push(record.clone());
        }
        Ok(found)
    }
}
