use thiserror::Error;

use crate::ports::StoreError;

/// Errors surfaced by the detector services.
///
/// Duplicates and conflicts are not here: they are ordinary outcomes
/// (`RegistrationOutcome`, `CompletionOutcome`).
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error(transparent)]
    Storage(#[from] StoreError),

    /// Stored data contradicts the protocol (e.g. a FINISHED task surfaced
    /// as a candidate). Never mapped to a process status.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}
