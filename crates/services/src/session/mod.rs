mod controller;
mod cursor;
mod progress;
mod stores;
mod submission;
mod timer;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::{SessionError, SubmissionError};
pub use controller::SessionController;
pub use cursor::{NavStep, NavigationCursor, Position};
pub use progress::SessionProgress;
pub use stores::{AnswerStore, FlagSet};
pub use submission::{RetryPolicy, SubmissionPipeline};
pub use timer::{CountdownTimer, TimerTick};
pub use workflow::SessionWorkflow;
