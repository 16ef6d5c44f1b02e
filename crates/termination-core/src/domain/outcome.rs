//! Outcomes of the mutating operations.
//!
//! Duplicates and conflicts are expected results of the protocol, so they are
//! values here and never errors.

use serde::{Deserialize, Serialize};

/// Result of registering a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationOutcome {
    /// This call inserted the record.
    Created,

    /// A record with the same identity already existed; nothing was written.
    AlreadyRegistered,
}

/// Result of completing a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompletionOutcome {
    /// This call moved the task out of `CREATED`.
    Completed,

    /// The task is missing, already terminal, or past its deadline.
    Conflict,
}
