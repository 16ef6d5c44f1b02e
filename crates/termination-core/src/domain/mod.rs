//! Domain model (IDs, states, task records, derived process view).

pub mod ids;
pub mod outcome;
pub mod process;
pub mod state;
pub mod task;

pub use self::ids::{InvalidId, ProcessId, TaskId, TaskKey};
pub use self::outcome::{CompletionOutcome, RegistrationOutcome};
pub use self::process::{Process, ProcessView, TIMED_OUT_MESSAGE};
pub use self::state::{ProcessState, TaskState, TerminalState, UnknownTaskState};
pub use self::task::{BadStateEnterTime, TaskCompletion, TaskRecord};
