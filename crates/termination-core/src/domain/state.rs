//! State - タスクとプロセスの状態

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// TaskState はタスクの状態を表現
///
/// # 状態遷移
/// - CREATED -> FINISHED
/// - CREATED -> ABORTED
///
/// FINISHED / ABORTED は終端で、戻ることはありません。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Created,
    Finished,
    Aborted,
}

impl TaskState {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Created => "CREATED",
            TaskState::Finished => "FINISHED",
            TaskState::Aborted => "ABORTED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Finished | TaskState::Aborted)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored state text that is not one of the known task states.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task state: {0:?}")]
pub struct UnknownTaskState(pub String);

impl FromStr for TaskState {
    type Err = UnknownTaskState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(TaskState::Created),
            "FINISHED" => Ok(TaskState::Finished),
            "ABORTED" => Ok(TaskState::Aborted),
            other => Err(UnknownTaskState(other.to_string())),
        }
    }
}

/// The states a completion may move a task into.
///
/// Using a separate enum keeps `CREATED` out of the completion API entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminalState {
    Finished,
    Aborted,
}

impl From<TerminalState> for TaskState {
    fn from(state: TerminalState) -> Self {
        match state {
            TerminalState::Finished => TaskState::Finished,
            TerminalState::Aborted => TaskState::Aborted,
        }
    }
}

/// ProcessState はプロセスの集約状態（保存されず、毎回導出される）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessState {
    /// At least one task is still legitimately waiting.
    Created,

    /// Every known task finished.
    Completed,

    /// A task aborted, or a pending task missed its deadline.
    Error,
}

impl ProcessState {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessState::Created => "CREATED",
            ProcessState::Completed => "COMPLETED",
            ProcessState::Error => "ERROR",
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
