use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{ExamId, QuestionId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DefinitionError {
    #[error("exam has no sections")]
    NoSections,

    #[error("section {index} has no questions")]
    EmptySection { index: usize },

    #[error("duplicate question id: {id}")]
    DuplicateQuestionId { id: QuestionId },

    #[error("exam duration must be > 0 seconds")]
    ZeroDuration,
}

//
// ─── QUESTIONS & SECTIONS ──────────────────────────────────────────────────────
//

/// Type tag plus type-specific payload for a single question.
///
/// The engine never interprets the payload; it only carries it so the UI can
/// render the question and so answers can be matched against the right shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum QuestionKind {
    FreeText {
        prompt: String,
    },
    SingleChoice {
        prompt: String,
        options: Vec<String>,
    },
    MultiChoice {
        prompt: String,
        options: Vec<String>,
    },
    MultiField {
        prompt: String,
        fields: Vec<String>,
    },
}

impl QuestionKind {
    #[must_use]
    pub fn prompt(&self) -> &str {
        match self {
            QuestionKind::FreeText { prompt }
            | QuestionKind::SingleChoice { prompt, .. }
            | QuestionKind::MultiChoice { prompt, .. }
            | QuestionKind::MultiField { prompt, .. } => prompt,
        }
    }
}

/// One question inside a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub order: u32,
    pub kind: QuestionKind,
}

/// A named, ordered group of questions (e.g. one listening part).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub questions: Vec<Question>,
}

//
// ─── EXAM DEFINITION ───────────────────────────────────────────────────────────
//

/// Immutable description of a timed exam: ordered sections of questions plus
/// the total duration.
///
/// Constructed once (validated) and never mutated for the lifetime of an
/// attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamDefinition {
    id: ExamId,
    title: String,
    sections: Vec<Section>,
    duration_seconds: u32,
    contiguous_sections: bool,
}

impl ExamDefinition {
    /// Validate and build an exam definition.
    ///
    /// # Errors
    ///
    /// Returns `DefinitionError::NoSections` for an empty exam,
    /// `DefinitionError::EmptySection` for a section with no questions,
    /// `DefinitionError::DuplicateQuestionId` if a question id repeats
    /// anywhere in the exam, and `DefinitionError::ZeroDuration` for a
    /// zero-length exam.
    pub fn new(
        id: ExamId,
        title: impl Into<String>,
        sections: Vec<Section>,
        duration_seconds: u32,
        contiguous_sections: bool,
    ) -> Result<Self, DefinitionError> {
        if sections.is_empty() {
            return Err(DefinitionError::NoSections);
        }
        if duration_seconds == 0 {
            return Err(DefinitionError::ZeroDuration);
        }

        let mut seen = HashSet::new();
        for (index, section) in sections.iter().enumerate() {
            if section.questions.is_empty() {
                return Err(DefinitionError::EmptySection { index });
            }
            for question in &section.questions {
                if !seen.insert(question.id.clone()) {
                    return Err(DefinitionError::DuplicateQuestionId {
                        id: question.id.clone(),
                    });
                }
            }
        }

        Ok(Self {
            id,
            title: title.into(),
            sections,
            duration_seconds,
            contiguous_sections,
        })
    }

    #[must_use]
    pub fn id(&self) -> &ExamId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    #[must_use]
    pub fn duration_seconds(&self) -> u32 {
        self.duration_seconds
    }

    /// Whether relative navigation may cross section boundaries.
    #[must_use]
    pub fn contiguous_sections(&self) -> bool {
        self.contiguous_sections
    }

    #[must_use]
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Number of questions in the given section, or `None` if the section
    /// does not exist.
    #[must_use]
    pub fn question_count(&self, section: usize) -> Option<usize> {
        self.sections.get(section).map(|s| s.questions.len())
    }

    #[must_use]
    pub fn question_at(&self, section: usize, question: usize) -> Option<&Question> {
        self.sections.get(section)?.questions.get(question)
    }

    /// Returns true when `(section, question)` addresses a real question.
    #[must_use]
    pub fn contains(&self, section: usize, question: usize) -> bool {
        self.question_at(section, question).is_some()
    }

    /// Returns true when the given id belongs to any question in the exam.
    #[must_use]
    pub fn has_question(&self, id: &QuestionId) -> bool {
        self.sections
            .iter()
            .any(|s| s.questions.iter().any(|q| &q.id == id))
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.sections.iter().map(|s| s.questions.len()).sum()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: &str, order: u32) -> Question {
        Question {
            id: QuestionId::new(id),
            order,
            kind: QuestionKind::FreeText {
                prompt: format!("prompt {id}"),
            },
        }
    }

    fn two_by_two() -> ExamDefinition {
        ExamDefinition::new(
            ExamId::new("reading-1"),
            "Reading practice",
            vec![
                Section {
                    name: "Passage 1".to_string(),
                    questions: vec![question("p1-q1", 0), question("p1-q2", 1)],
                },
                Section {
                    name: "Passage 2".to_string(),
                    questions: vec![question("p2-q1", 0), question("p2-q2", 1)],
                },
            ],
            600,
            false,
        )
        .unwrap()
    }

    #[test]
    fn rejects_empty_exam() {
        let err = ExamDefinition::new(ExamId::new("x"), "X", Vec::new(), 600, false).unwrap_err();
        assert_eq!(err, DefinitionError::NoSections);
    }

    #[test]
    fn rejects_empty_section() {
        let err = ExamDefinition::new(
            ExamId::new("x"),
            "X",
            vec![Section {
                name: "Empty".to_string(),
                questions: Vec::new(),
            }],
            600,
            false,
        )
        .unwrap_err();
        assert_eq!(err, DefinitionError::EmptySection { index: 0 });
    }

    #[test]
    fn rejects_duplicate_question_ids_across_sections() {
        let err = ExamDefinition::new(
            ExamId::new("x"),
            "X",
            vec![
                Section {
                    name: "A".to_string(),
                    questions: vec![question("dup", 0)],
                },
                Section {
                    name: "B".to_string(),
                    questions: vec![question("dup", 0)],
                },
            ],
            600,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, DefinitionError::DuplicateQuestionId { .. }));
    }

    #[test]
    fn rejects_zero_duration() {
        let err = ExamDefinition::new(
            ExamId::new("x"),
            "X",
            vec![Section {
                name: "A".to_string(),
                questions: vec![question("q", 0)],
            }],
            0,
            false,
        )
        .unwrap_err();
        assert_eq!(err, DefinitionError::ZeroDuration);
    }

    #[test]
    fn lookups_address_valid_pairs_only() {
        let def = two_by_two();
        assert_eq!(def.section_count(), 2);
        assert_eq!(def.question_count(0), Some(2));
        assert_eq!(def.question_count(5), None);
        assert!(def.contains(1, 1));
        assert!(!def.contains(1, 2));
        assert!(!def.contains(2, 0));
        assert_eq!(def.total_questions(), 4);
    }

    #[test]
    fn has_question_matches_any_section() {
        let def = two_by_two();
        assert!(def.has_question(&QuestionId::new("p2-q2")));
        assert!(!def.has_question(&QuestionId::new("missing")));
    }
}
