use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::answer::AnswerValue;
use crate::model::ids::{ExamId, QuestionId, SessionId};

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Lifecycle status of one exam attempt.
///
/// `Expired` is the transient marker the timer-expiry path passes through on
/// its way to `Submitting`; a durable snapshot never carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    UnderReview,
    Expired,
    Submitting,
    Submitted,
    SubmissionFailed,
}

impl SessionStatus {
    /// Whether the state machine permits moving from `self` to `to`.
    ///
    /// This table is the single source of truth for legal edges; every
    /// transition in the engine goes through it.
    #[must_use]
    pub fn can_transition(self, to: SessionStatus) -> bool {
        use SessionStatus::{
            Expired, InProgress, NotStarted, SubmissionFailed, Submitted, Submitting, UnderReview,
        };
        matches!(
            (self, to),
            (NotStarted, InProgress)
                | (InProgress, UnderReview)
                | (UnderReview, InProgress)
                | (InProgress, Submitting)
                | (UnderReview, Submitting)
                | (InProgress, Expired)
                | (UnderReview, Expired)
                | (Expired, Submitting)
                | (Submitting, Submitted)
                | (Submitting, SubmissionFailed)
                | (SubmissionFailed, Submitting)
        )
    }

    /// Answers and flags stop accepting edits from the instant any of these
    /// states is entered, before any network call completes.
    #[must_use]
    pub fn is_closed(self) -> bool {
        matches!(
            self,
            SessionStatus::Expired
                | SessionStatus::Submitting
                | SessionStatus::Submitted
                | SessionStatus::SubmissionFailed
        )
    }

    /// The timer runs only while the attempt is in one of these states.
    #[must_use]
    pub fn is_running(self) -> bool {
        matches!(self, SessionStatus::InProgress | SessionStatus::UnderReview)
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Submitted)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionStatus::NotStarted => "not-started",
            SessionStatus::InProgress => "in-progress",
            SessionStatus::UnderReview => "under-review",
            SessionStatus::Expired => "expired",
            SessionStatus::Submitting => "submitting",
            SessionStatus::Submitted => "submitted",
            SessionStatus::SubmissionFailed => "submission-failed",
        };
        write!(f, "{name}")
    }
}

//
// ─── SNAPSHOT ──────────────────────────────────────────────────────────────────
//

/// Durable, point-in-time copy of an in-progress attempt.
///
/// Written best-effort on every mutation so the attempt survives a process
/// restart; must round-trip losslessly through the snapshot store. The
/// wall-clock `deadline` is persisted rather than a tick count so a restart
/// or a suspended tab can never extend the exam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub exam_id: ExamId,
    pub status: SessionStatus,
    pub remaining_seconds: u32,
    pub deadline: DateTime<Utc>,
    pub current_section: usize,
    pub current_question: usize,
    pub answers: BTreeMap<QuestionId, AnswerValue>,
    pub flags: BTreeSet<QuestionId>,
    pub submission_attempts: u32,
    pub started_at: DateTime<Utc>,
}

//
// ─── RESULT RECORD & RECEIPT ───────────────────────────────────────────────────
//

/// Immutable final record of one attempt, serialized once at submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub session_id: SessionId,
    pub exam_id: ExamId,
    pub answers: BTreeMap<QuestionId, AnswerValue>,
    pub flags: BTreeSet<QuestionId>,
    pub elapsed_seconds: u32,
    pub submitted_at: DateTime<Utc>,
}

/// Acknowledgment from the result store that a record is durably persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub idempotency_key: String,
    pub stored_at: DateTime<Utc>,
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn legal_edges_only() {
        use SessionStatus::{
            Expired, InProgress, NotStarted, SubmissionFailed, Submitted, Submitting, UnderReview,
        };

        assert!(NotStarted.can_transition(InProgress));
        assert!(InProgress.can_transition(UnderReview));
        assert!(UnderReview.can_transition(InProgress));
        assert!(InProgress.can_transition(Submitting));
        assert!(UnderReview.can_transition(Submitting));
        assert!(Expired.can_transition(Submitting));
        assert!(Submitting.can_transition(Submitted));
        assert!(Submitting.can_transition(SubmissionFailed));
        assert!(SubmissionFailed.can_transition(Submitting));

        // No skipping, no going back after final intent.
        assert!(!NotStarted.can_transition(Submitting));
        assert!(!NotStarted.can_transition(UnderReview));
        assert!(!Submitting.can_transition(InProgress));
        assert!(!Submitted.can_transition(Submitting));
        assert!(!SubmissionFailed.can_transition(InProgress));
        assert!(!InProgress.can_transition(Submitted));
    }

    #[test]
    fn closed_states_reject_edits() {
        assert!(SessionStatus::Submitting.is_closed());
        assert!(SessionStatus::Submitted.is_closed());
        assert!(SessionStatus::SubmissionFailed.is_closed());
        assert!(SessionStatus::Expired.is_closed());
        assert!(!SessionStatus::InProgress.is_closed());
        assert!(!SessionStatus::UnderReview.is_closed());
    }

    #[test]
    fn status_serializes_to_kebab_case() {
        let json = serde_json::to_string(&SessionStatus::UnderReview).unwrap();
        assert_eq!(json, "\"under-review\"");
        assert_eq!(SessionStatus::SubmissionFailed.to_string(), "submission-failed");
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let mut answers = BTreeMap::new();
        answers.insert(QuestionId::new("q1"), AnswerValue::text("A"));
        let mut flags = BTreeSet::new();
        flags.insert(QuestionId::new("q2"));

        let snapshot = SessionSnapshot {
            session_id: SessionId::new(),
            exam_id: ExamId::new("listening-1"),
            status: SessionStatus::InProgress,
            remaining_seconds: 540,
            deadline: fixed_now() + chrono::Duration::seconds(540),
            current_section: 1,
            current_question: 0,
            answers,
            flags,
            submission_attempts: 0,
            started_at: fixed_now(),
        };

        let json = serde_json::to_string(&snapshot).unwrap();
        let back: SessionSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}
