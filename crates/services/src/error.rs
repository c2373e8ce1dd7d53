//! Shared error types for the session engine.

use thiserror::Error;

use exam_core::model::{QuestionId, SessionStatus};
use storage::repository::StorageError;

/// Errors emitted by the submission pipeline.
///
/// Transient storage failures are retried inside the pipeline; only the two
/// outcomes below ever reach a caller.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SubmissionError {
    #[error("submission retries exhausted after {attempts} attempts")]
    Exhausted {
        attempts: u32,
        #[source]
        source: StorageError,
    },

    #[error("result store rejected the submission")]
    Terminal(#[source] StorageError),
}

/// Errors emitted by the session engine.
///
/// `OutOfRange`, `SessionClosed`, `InvalidTransition` and `UnknownQuestion`
/// are contract violations: they indicate a UI bug and are reported to the
/// caller synchronously, never swallowed. `Submission` is the one
/// user-facing failure.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("navigation target out of range: section {section}, question {question}")]
    OutOfRange { section: usize, question: usize },

    #[error("session no longer accepts changes")]
    SessionClosed,

    #[error("session has not been started")]
    NotStarted,

    #[error("invalid session transition: {from} -> {to}")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },

    #[error("unknown question id: {0}")]
    UnknownQuestion(QuestionId),

    #[error("snapshot does not match exam definition: {0}")]
    SnapshotMismatch(String),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
