//! Task record: the single stored item per (process, task) identity.

use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};

use super::ids::TaskKey;
use super::state::{TaskState, TerminalState};

/// Sortable "is this task a candidate for explaining a non-completed process,
/// and since when" value, in epoch milliseconds.
///
/// - `CREATED`  -> expiration time (future deadline, stale once passed)
/// - `ABORTED`  -> instant of the abort (failure evidence)
/// - `FINISHED` -> `0` (not a candidate)
///
/// Candidate values are always `>= 1`; instants at or before the epoch are
/// clamped so they never collide with the sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BadStateEnterTime(i64);

impl BadStateEnterTime {
    /// Sentinel for tasks that can no longer explain a non-completed process.
    pub const NOT_A_CANDIDATE: Self = Self(0);

    pub fn from_instant(instant: DateTime<Utc>) -> Self {
        Self(instant.timestamp_millis().max(1))
    }

    /// Value for a task sitting in `state`. `instant` is the expiration time
    /// for `CREATED` and the abort time for `ABORTED`; it is ignored otherwise.
    pub fn for_state(state: TaskState, instant: DateTime<Utc>) -> Self {
        match state {
            TaskState::Created | TaskState::Aborted => Self::from_instant(instant),
            TaskState::Finished => Self::NOT_A_CANDIDATE,
        }
    }

    /// Rebuild from a stored column. Negative values cannot come from this
    /// type and are folded to the sentinel.
    pub fn from_millis(millis: i64) -> Self {
        Self(millis.max(0))
    }

    pub fn as_millis(self) -> i64 {
        self.0
    }

    pub fn is_candidate(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for BadStateEnterTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Stored task item.
///
/// Design:
/// - This is the single source of truth for one task.
/// - `bad_state_enter_time` is only ever written together with `state`
///   (`registered` and `apply`), so the two cannot drift apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub key: TaskKey,
    pub expiration_time: DateTime<Utc>,
    pub state: TaskState,
    pub state_message: Option<String>,
    pub bad_state_enter_time: BadStateEnterTime,

    /// Instant after which the backend may reclaim the record.
    pub ttl: DateTime<Utc>,
}

impl TaskRecord {
    /// A freshly registered, pending task.
    ///
    /// `expiration_time` is truncated to whole milliseconds and `ttl` to whole
    /// seconds, the resolution every backend stores.
    pub fn registered(key: TaskKey, expiration_time: DateTime<Utc>, ttl: DateTime<Utc>) -> Self {
        let expiration_time = expiration_time.trunc_subsecs(3);
        Self {
            key,
            expiration_time,
            state: TaskState::Created,
            state_message: None,
            bad_state_enter_time: BadStateEnterTime::for_state(TaskState::Created, expiration_time),
            ttl: ttl.trunc_subsecs(0),
        }
    }

    /// Apply a completion mutation. Callers must have checked the completion
    /// condition first; this only writes the fields.
    pub fn apply(&mut self, completion: &TaskCompletion) {
        self.state = completion.state();
        self.state_message = completion.message().map(str::to_string);
        self.bad_state_enter_time = completion.bad_state_enter_time();
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiration_time
    }
}

/// The field writes of a completion: new terminal state, message and the
/// matching `BadStateEnterTime`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCompletion {
    state: TerminalState,
    message: Option<String>,
    completed_at: DateTime<Utc>,
}

impl TaskCompletion {
    /// Messages only accompany aborts; one passed with `Finished` is dropped.
    pub fn new(state: TerminalState, message: Option<String>, completed_at: DateTime<Utc>) -> Self {
        let message = match state {
            TerminalState::Aborted => message,
            TerminalState::Finished => None,
        };
        Self {
            state,
            message,
            completed_at,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state.into()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn bad_state_enter_time(&self) -> BadStateEnterTime {
        BadStateEnterTime::for_state(self.state(), self.completed_at)
    }
}
