use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A student's answer to one question.
///
/// Type-tagged union matching the question kinds: free text, selected
/// option(s), or a structured multi-field response. At most one value exists
/// per question id; absence means unanswered. Last write wins, no history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum AnswerValue {
    /// Free-form text (writing tasks, short answers).
    Text(String),
    /// One or more selected options, by option value.
    Selected(Vec<String>),
    /// Named sub-fields of a structured response (e.g. form completion).
    Fields(BTreeMap<String, String>),
}

impl AnswerValue {
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    #[must_use]
    pub fn selected<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Selected(options.into_iter().map(Into::into).collect())
    }

    /// Returns true for answers that carry no content (empty text, no
    /// selections, no fields). Useful for UIs that want to treat an emptied
    /// input as unanswered.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            AnswerValue::Text(text) => text.trim().is_empty(),
            AnswerValue::Selected(options) => options.is_empty(),
            AnswerValue::Fields(fields) => fields.values().all(|v| v.trim().is_empty()),
        }
    }
}
