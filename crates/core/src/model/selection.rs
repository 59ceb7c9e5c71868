use std::collections::BTreeSet;

use thiserror::Error;

use crate::model::answer::QuestionKind;
use crate::model::ids::AnswerId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SelectionError {
    #[error("free-text questions take typed input, not a selected answer")]
    NotAChoiceQuestion,
    #[error("typed input is only accepted for free-text questions")]
    NotAFreeTextQuestion,
}

/// What the user currently has marked for the active question.
///
/// Discarded when the session advances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    kind: QuestionKind,
    chosen: Vec<AnswerId>,
    free_text: String,
}

impl Selection {
    #[must_use]
    pub fn new(kind: QuestionKind) -> Self {
        Self {
            kind,
            chosen: Vec::new(),
            free_text: String::new(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        self.kind
    }

    /// Marks or unmarks `answer`.
    ///
    /// Single choice replaces the previous pick and unmarks on a repeated pick.
    /// Multiple choice toggles membership independently.
    ///
    /// # Errors
    ///
    /// Returns `SelectionError::NotAChoiceQuestion` for free-text questions.
    pub fn toggle(&mut self, answer: AnswerId) -> Result<(), SelectionError> {
        let already = self.chosen.contains(&answer);
        match self.kind {
            QuestionKind::FreeText => return Err(SelectionError::NotAChoiceQuestion),
            QuestionKind::SingleChoice => {
                self.chosen.clear();
                if !already {
                    self.chosen.push(answer);
                }
            }
            QuestionKind::MultipleChoice | QuestionKind::Unscorable => {
                if already {
                    self.chosen.retain(|id| *id != answer);
                } else {
                    self.chosen.push(answer);
                }
            }
        }
        Ok(())
    }

    /// Stores typed input verbatim; normalisation happens at grading time.
    ///
    /// # Errors
    ///
    /// Returns `SelectionError::NotAFreeTextQuestion` for choice questions.
    pub fn set_free_text(&mut self, text: impl Into<String>) -> Result<(), SelectionError> {
        if self.kind != QuestionKind::FreeText {
            return Err(SelectionError::NotAFreeTextQuestion);
        }
        self.free_text = text.into();
        Ok(())
    }

    pub fn reset(&mut self) {
        self.chosen.clear();
        self.free_text.clear();
    }

    #[must_use]
    pub fn chosen(&self) -> &[AnswerId] {
        &self.chosen
    }

    #[must_use]
    pub fn chosen_set(&self) -> BTreeSet<AnswerId> {
        self.chosen.iter().copied().collect()
    }

    #[must_use]
    pub fn is_selected(&self, answer: AnswerId) -> bool {
        self.chosen.contains(&answer)
    }

    #[must_use]
    pub fn free_text(&self) -> &str {
        &self.free_text
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self.kind {
            QuestionKind::FreeText => self.free_text.trim().is_empty(),
            _ => self.chosen.is_empty(),
        }
    }
}
