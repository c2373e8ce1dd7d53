#![forbid(unsafe_code)]

pub mod error;
pub mod session;

pub use exam_core::Clock;

pub use error::{SessionError, SubmissionError};
pub use session::{
    AnswerStore, CountdownTimer, FlagSet, NavStep, NavigationCursor, Position, RetryPolicy,
    SessionController, SessionProgress, SessionWorkflow, SubmissionPipeline, TimerTick,
};
