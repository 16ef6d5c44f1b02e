//! Process view, derived from task records on every read.

use serde::{Deserialize, Serialize};

use super::ids::ProcessId;
use super::state::ProcessState;

/// Message reported when a pending task's deadline passed without completion.
pub const TIMED_OUT_MESSAGE: &str = "process timed out";

/// Aggregate status of one process. Never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Process {
    pub id: ProcessId,
    pub state: ProcessState,

    /// Present when `state` is `Error`.
    pub state_message: Option<String>,
}

impl Process {
    pub fn created(id: ProcessId) -> Self {
        Self {
            id,
            state: ProcessState::Created,
            state_message: None,
        }
    }

    pub fn completed(id: ProcessId) -> Self {
        Self {
            id,
            state: ProcessState::Completed,
            state_message: None,
        }
    }

    pub fn failed(id: ProcessId, message: Option<String>) -> Self {
        Self {
            id,
            state: ProcessState::Error,
            state_message: message,
        }
    }

    pub fn timed_out(id: ProcessId) -> Self {
        Self::failed(id, Some(TIMED_OUT_MESSAGE.to_string()))
    }
}

/// Serializable snapshot, handy for logs and for API layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessView {
    pub id: String,
    pub state: ProcessState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_message: Option<String>,
}

impl From<Process> for ProcessView {
    fn from(process: Process) -> Self {
        Self {
            id: process.id.into_inner(),
            state: process.state,
            state_message: process.state_message,
        }
    }
}
