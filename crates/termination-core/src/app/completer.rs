//! TaskCompleter - CREATED から終端状態への一度きりの遷移

use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::{CompletionOutcome, TaskCompletion, TaskKey, TaskState, TerminalState};
use crate::error::DetectorError;
use crate::ports::{Clock, Predicate, TaskStore, UpdateCondition, UpdateOutcome};

#[derive(Clone)]
pub struct TaskCompleter {
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock>,
}

impl TaskCompleter {
    pub fn new(store: Arc<dyn TaskStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Move a pending task to `state`.
    ///
    /// Succeeds only while the task exists, is still `CREATED` and its
    /// deadline has not passed; all three are checked atomically by the store.
    /// Anything else is a `Conflict` and nothing is written.
    pub async fn complete(
        &self,
        key: &TaskKey,
        state: TerminalState,
        message: Option<String>,
    ) -> Result<CompletionOutcome, DetectorError> {
        let now = self.clock.now();
        let completion = TaskCompletion::new(state, message, now);
        let condition = UpdateCondition::exists()
            .and(Predicate::ExpiresAfter(now))
            .and(Predicate::StateIs(TaskState::Created));

        match self.store.update_if(key, &completion, &condition).await? {
            UpdateOutcome::Updated => {
                debug!(
                    process_id = %key.process_id,
                    task_id = %key.task_id,
                    state = %completion.state(),
                    "task completed"
                );
                Ok(CompletionOutcome::Completed)
            }
            UpdateOutcome::ConditionFailed => {
                info!(
                    process_id = %key.process_id,
                    task_id = %key.task_id,
                    state = %completion.state(),
                    "completion rejected: task missing, expired or already completed"
                );
                Ok(CompletionOutcome::Conflict)
            }
        }
    }
}
