//! ProcessStatusResolver - プロセス状態の導出
//!
//! プロセスの状態は保存しません。毎回 2 つのクエリから導出します:
//! 1. 存在確認: パーティションを limit 1 で読む
//! 2. 候補探索: badStateEnterTimeIndex を `> 0` で昇順に limit 1 で読む
//!
//! ABORTED の値は「abort した過去の時刻」、CREATED の値は「未来の期限」
//! なので、abort が 1 つでもあれば期限内の pending より先に並びます。
//! 期限切れの pending はさらに前に並ぶことがありますが、どちらも ERROR
//! なので結果は変わりません（メッセージだけが異なります）。

use std::sync::Arc;

use tracing::debug;

use crate::domain::{BadStateEnterTime, Process, ProcessId, TaskState};
use crate::error::DetectorError;
use crate::ports::{BAD_STATE_ENTER_TIME_INDEX, Clock, SortCondition, SortOrder, TaskStore};

#[derive(Clone)]
pub struct ProcessStatusResolver {
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock>,
}

impl ProcessStatusResolver {
    pub fn new(store: Arc<dyn TaskStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Current status of `process_id`, or `None` if no task of it is stored.
    pub async fn get(&self, process_id: &ProcessId) -> Result<Option<Process>, DetectorError> {
        if self.store.query_by_partition(process_id, 1).await?.is_empty() {
            debug!(process_id = %process_id, "process not found");
            return Ok(None);
        }

        let candidate = self
            .store
            .query_by_sort_range(
                process_id,
                BAD_STATE_ENTER_TIME_INDEX,
                SortCondition::GreaterThan(BadStateEnterTime::NOT_A_CANDIDATE),
                SortOrder::Ascending,
                1,
            )
            .await?
            .into_iter()
            .next();

        let Some(candidate) = candidate else {
            return Ok(Some(Process::completed(process_id.clone())));
        };

        let process = match candidate.state {
            TaskState::Aborted => Process::failed(process_id.clone(), candidate.state_message),
            TaskState::Created if candidate.is_expired_at(self.clock.now()) => {
                Process::timed_out(process_id.clone())
            }
            TaskState::Created => Process::created(process_id.clone()),
            TaskState::Finished => {
                return Err(DetectorError::InvariantViolation(format!(
                    "task {} is {} but is indexed as a candidate (badStateEnterTime={})",
                    candidate.key, candidate.state, candidate.bad_state_enter_time
                )));
            }
        };

        debug!(
            process_id = %process_id,
            state = %process.state,
            candidate = %candidate.key.task_id,
            "process status resolved"
        );
        Ok(Some(process))
    }
}
