use std::collections::{BTreeMap, BTreeSet};

use exam_core::model::{AnswerValue, QuestionId};

/// Current answers, keyed by question id.
///
/// Pure data: the `SessionClosed` guard lives in the controller, the only
/// mutation path. Backed by a `BTreeMap` so `all()` yields a stable order
/// for submission serialization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnswerStore {
    answers: BTreeMap<QuestionId, AnswerValue>,
}

impl AnswerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a persisted snapshot.
    #[must_use]
    pub fn from_map(answers: BTreeMap<QuestionId, AnswerValue>) -> Self {
        Self { answers }
    }

    /// Record an answer. Last write wins; no history is retained.
    pub fn set(&mut self, question_id: QuestionId, answer: AnswerValue) {
        self.answers.insert(question_id, answer);
    }

    #[must_use]
    pub fn get(&self, question_id: &QuestionId) -> Option<&AnswerValue> {
        self.answers.get(question_id)
    }

    /// Remove the answer for a question; the question becomes unanswered.
    pub fn clear(&mut self, question_id: &QuestionId) -> Option<AnswerValue> {
        self.answers.remove(question_id)
    }

    /// Number of distinct answered question ids.
    #[must_use]
    pub fn count(&self) -> usize {
        self.answers.len()
    }

    /// Restartable iteration over `(question id, answer)` pairs in stable
    /// order; each call starts from the beginning.
    pub fn all(&self) -> impl Iterator<Item = (&QuestionId, &AnswerValue)> {
        self.answers.iter()
    }

    #[must_use]
    pub fn to_map(&self) -> BTreeMap<QuestionId, AnswerValue> {
        self.answers.clone()
    }
}

/// Question ids the student marked "review later".
///
/// Membership is independent of whether the question is answered; flagging
/// an unanswered question is the expected review workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagSet {
    flags: BTreeSet<QuestionId>,
}

impl FlagSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a persisted snapshot.
    #[must_use]
    pub fn from_set(flags: BTreeSet<QuestionId>) -> Self {
        Self { flags }
    }

    /// Flip the flag for a question; returns whether it is now flagged.
    pub fn toggle(&mut self, question_id: QuestionId) -> bool {
        if self.flags.remove(&question_id) {
            false
        } else {
            self.flags.insert(question_id);
            true
        }
    }

    #[must_use]
    pub fn is_flagged(&self, question_id: &QuestionId) -> bool {
        self.flags.contains(question_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn all(&self) -> impl Iterator<Item = &QuestionId> {
        self.flags.iter()
    }

    #[must_use]
    pub fn to_set(&self) -> BTreeSet<QuestionId> {
        self.flags.clone()
    }
}
