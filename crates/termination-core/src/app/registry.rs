//! TaskRegistry - タスクの登録（create-once）

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::domain::{RegistrationOutcome, TaskKey, TaskRecord};
use crate::error::DetectorError;
use crate::ports::{Clock, InsertOutcome, TaskStore};

/// Registers tasks with their deadline.
///
/// Each identity is created at most once; a second registration of the same
/// key reports `AlreadyRegistered` and leaves the stored record untouched
/// (including its expiration time).
#[derive(Clone)]
pub struct TaskRegistry {
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock>,
    retention: Duration,
}

impl TaskRegistry {
    pub fn new(store: Arc<dyn TaskStore>, clock: Arc<dyn Clock>, retention: Duration) -> Self {
        Self {
            store,
            clock,
            retention,
        }
    }

    pub async fn register(
        &self,
        key: TaskKey,
        expiration_time: DateTime<Utc>,
    ) -> Result<RegistrationOutcome, DetectorError> {
        let now = self.clock.now();
        let ttl = now
            .checked_add_signed(self.retention)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let record = TaskRecord::registered(key.clone(), expiration_time, ttl);
        match self.store.insert_if_absent(record).await? {
            InsertOutcome::Inserted => {
                debug!(
                    process_id = %key.process_id,
                    task_id = %key.task_id,
                    %expiration_time,
                    "task registered"
                );
                Ok(RegistrationOutcome::Created)
            }
            InsertOutcome::AlreadyExists => {
                info!(
                    process_id = %key.process_id,
                    task_id = %key.task_id,
                    "task already registered"
                );
                Ok(RegistrationOutcome::AlreadyRegistered)
            }
        }
    }
}
