use exam_core::model::ExamDefinition;

use crate::error::SessionError;

/// A (section, question) address inside an exam definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub section: usize,
    pub question: usize,
}

/// Outcome of a relative cursor step.
///
/// Hitting the edge of a section (or of the exam) is not a fault; the UI
/// disables the button. `OutOfRange` is reserved for absolute jumps to
/// targets that do not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavStep {
    Moved(Position),
    Boundary,
}

/// Tracks which question is currently presented.
///
/// Pure cursor: no side effects on answers or flags, and every move is
/// validated against the exam definition. Jumps from the review screen use
/// `go_to`; sequential navigation uses `next`/`previous`, which cross
/// section boundaries only when the definition marks sections contiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationCursor {
    section: usize,
    question: usize,
}

impl NavigationCursor {
    /// Cursor at the first question of the first section.
    #[must_use]
    pub fn new() -> Self {
        Self {
            section: 0,
            question: 0,
        }
    }

    /// Rebuild a cursor from a persisted position.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::OutOfRange` if the position does not address a
    /// question in `definition`.
    pub fn from_position(
        definition: &ExamDefinition,
        section: usize,
        question: usize,
    ) -> Result<Self, SessionError> {
        if !definition.contains(section, question) {
            return Err(SessionError::OutOfRange { section, question });
        }
        Ok(Self { section, question })
    }

    #[must_use]
    pub fn current(&self) -> Position {
        Position {
            section: self.section,
            question: self.question,
        }
    }

    /// Absolute jump. Fails without moving if the target does not exist;
    /// never clamps.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::OutOfRange` for any target outside the
    /// definition.
    pub fn go_to(
        &mut self,
        definition: &ExamDefinition,
        section: usize,
        question: usize,
    ) -> Result<Position, SessionError> {
        if !definition.contains(section, question) {
            return Err(SessionError::OutOfRange { section, question });
        }
        self.section = section;
        self.question = question;
        Ok(self.current())
    }

    /// Step to the next question, crossing into the next section only when
    /// the definition marks sections contiguous.
    pub fn next(&mut self, definition: &ExamDefinition) -> NavStep {
        let in_section = definition.question_count(self.section).unwrap_or(0);
        if self.question + 1 < in_section {
            self.question += 1;
            return NavStep::Moved(self.current());
        }
        if definition.contiguous_sections() && self.section + 1 < definition.section_count() {
            self.section += 1;
            self.question = 0;
            return NavStep::Moved(self.current());
        }
        NavStep::Boundary
    }

    /// Step to the previous question, crossing back a section only when the
    /// definition marks sections contiguous.
    pub fn previous(&mut self, definition: &ExamDefinition) -> NavStep {
        if self.question > 0 {
            self.question -= 1;
            return NavStep::Moved(self.current());
        }
        if definition.contiguous_sections() && self.section > 0 {
            self.section -= 1;
            self.question = definition
                .question_count(self.section)
                .unwrap_or(1)
                .saturating_sub(1);
            return NavStep::Moved(self.current());
        }
        NavStep::Boundary
    }
}

impl Default for NavigationCursor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::{ExamId, Question, QuestionId, QuestionKind, Section};

    fn question(id: &str, order: u32) -> Question {
        Question {
            id: QuestionId::new(id),
            order,
            kind: QuestionKind::FreeText {
                prompt: "Q".to_string(),
            },
        }
    }

    fn definition(contiguous: bool) -> ExamDefinition {
        ExamDefinition::new(
            ExamId::new("nav"),
            "Nav",
            vec![
                Section {
                    name: "S0".to_string(),
                    questions: vec![question("s0-q0", 0), question("s0-q1", 1)],
                },
                Section {
                    name: "S1".to_string(),
                    questions: vec![question("s1-q0", 0), question("s1-q1", 1)],
                },
            ],
            600,
            contiguous,
        )
        .unwrap()
    }

    #[test]
    fn go_to_out_of_range_never_moves() {
        let def = definition(false);
        let mut cursor = NavigationCursor::new();

        let err = cursor.go_to(&def, 5, 0).unwrap_err();
        assert!(matches!(
            err,
            SessionError::OutOfRange {
                section: 5,
                question: 0
            }
        ));
        assert_eq!(
            cursor.current(),
            Position {
                section: 0,
                question: 0
            }
        );

        assert!(cursor.go_to(&def, 1, 1).is_ok());
        assert!(cursor.go_to(&def, 1, 2).is_err());
        assert_eq!(
            cursor.current(),
            Position {
                section: 1,
                question: 1
            }
        );
    }

    #[test]
    fn next_stops_at_section_edge_when_not_contiguous() {
        let def = definition(false);
        let mut cursor = NavigationCursor::new();

        assert_eq!(
            cursor.next(&def),
            NavStep::Moved(Position {
                section: 0,
                question: 1
            })
        );
        assert_eq!(cursor.next(&def), NavStep::Boundary);
        assert_eq!(
            cursor.current(),
            Position {
                section: 0,
                question: 1
            }
        );
    }

    #[test]
    fn next_wraps_section_when_contiguous() {
        let def = definition(true);
        let mut cursor = NavigationCursor::new();

        cursor.next(&def);
        assert_eq!(
            cursor.next(&def),
            NavStep::Moved(Position {
                section: 1,
                question: 0
            })
        );
    }

    #[test]
    fn previous_wraps_to_last_question_of_prior_section() {
        let def = definition(true);
        let mut cursor = NavigationCursor::from_position(&def, 1, 0).unwrap();

        assert_eq!(
            cursor.previous(&def),
            NavStep::Moved(Position {
                section: 0,
                question: 1
            })
        );
    }

    #[test]
    fn previous_at_exam_start_is_a_boundary() {
        let def = definition(true);
        let mut cursor = NavigationCursor::new();
        assert_eq!(cursor.previous(&def), NavStep::Boundary);
    }

    #[test]
    fn from_position_validates_bounds() {
        let def = definition(false);
        assert!(NavigationCursor::from_position(&def, 1, 1).is_ok());
        assert!(NavigationCursor::from_position(&def, 2, 0).is_err());
    }
}
