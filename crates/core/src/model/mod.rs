mod answer;
mod definition;
mod ids;
mod session;

pub use answer::AnswerValue;
pub use definition::{DefinitionError, ExamDefinition, Question, QuestionKind, Section};
pub use ids::{ExamId, ParseIdError, QuestionId, SessionId};
pub use session::{ResultRecord, SessionSnapshot, SessionStatus, SubmissionReceipt};
