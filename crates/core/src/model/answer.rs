use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{AnswerId, QuestionId};

/// Only the first four candidates of a multiple-choice question are shown and graded.
pub const MAX_CHOICES: usize = 4;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerSetError {
    #[error("question {question_id} has no candidate answers")]
    Empty { question_id: QuestionId },

    #[error("answer {answer_id} belongs to question {owner}, not {question_id}")]
    ForeignAnswer {
        answer_id: AnswerId,
        owner: QuestionId,
        question_id: QuestionId,
    },
}

//
// ─── ANSWER ────────────────────────────────────────────────────────────────────
//

/// One candidate answer. For free-text questions the single entry holds the expected text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub id: AnswerId,
    pub question_id: QuestionId,
    pub text: String,
    pub is_correct: bool,
}

impl Answer {
    #[must_use]
    pub fn new(
        id: AnswerId,
        question_id: QuestionId,
        text: impl Into<String>,
        is_correct: bool,
    ) -> Self {
        Self {
            id,
            question_id,
            text: text.into(),
            is_correct,
        }
    }
}

//
// ─── QUESTION KIND ─────────────────────────────────────────────────────────────
//

/// Validation path for a question, derived from its candidate set only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionKind {
    /// Exactly one candidate; the user types the answer.
    FreeText,
    /// Several candidates, one of them correct. Selecting replaces.
    SingleChoice,
    /// Several candidates, more than one correct. Selecting toggles.
    MultipleChoice,
    /// Several candidates, none marked correct. Always graded incorrect.
    Unscorable,
}

impl QuestionKind {
    #[must_use]
    pub fn is_choice(self) -> bool {
        !matches!(self, QuestionKind::FreeText)
    }
}

/// Expected answer as shown on flashcards and in review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ExpectedAnswer {
    Single(String),
    Multiple(Vec<String>),
}

impl ExpectedAnswer {
    #[must_use]
    pub fn texts(&self) -> Vec<&str> {
        match self {
            ExpectedAnswer::Single(text) => vec![text.as_str()],
            ExpectedAnswer::Multiple(texts) => texts.iter().map(String::as_str).collect(),
        }
    }
}

//
// ─── ANSWER SET ────────────────────────────────────────────────────────────────
//

/// Candidate answers of one question, in display order.
///
/// Grading never depends on the order of `answers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSet {
    question_id: QuestionId,
    answers: Vec<Answer>,
}

impl AnswerSet {
    /// Builds the candidate set, keeping at most [`MAX_CHOICES`] entries.
    ///
    /// # Errors
    ///
    /// Returns `AnswerSetError::Empty` when there are no candidates, and
    /// `AnswerSetError::ForeignAnswer` when a candidate belongs to another question.
    pub fn new(question_id: QuestionId, mut answers: Vec<Answer>) -> Result<Self, AnswerSetError> {
        if answers.is_empty() {
            return Err(AnswerSetError::Empty { question_id });
        }
        if let Some(foreign) = answers.iter().find(|a| a.question_id != question_id) {
            return Err(AnswerSetError::ForeignAnswer {
                answer_id: foreign.id,
                owner: foreign.question_id,
                question_id,
            });
        }
        if answers.len() > MAX_CHOICES {
            log::debug!(
                "question {question_id}: dropping {} candidates past the first {MAX_CHOICES}",
                answers.len() - MAX_CHOICES
            );
            answers.truncate(MAX_CHOICES);
        }
        Ok(Self {
            question_id,
            answers,
        })
    }

    #[must_use]
    pub fn question_id(&self) -> QuestionId {
        self.question_id
    }

    #[must_use]
    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.answers.len()
    }

    /// Always false; kept for clippy's `len_without_is_empty`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: AnswerId) -> Option<&Answer> {
        self.answers.iter().find(|a| a.id == id)
    }

    #[must_use]
    pub fn correct_count(&self) -> usize {
        self.answers.iter().filter(|a| a.is_correct).count()
    }

    #[must_use]
    pub fn correct_ids(&self) -> BTreeSet<AnswerId> {
        self.answers
            .iter()
            .filter(|a| a.is_correct)
            .map(|a| a.id)
            .collect()
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        if self.answers.len() == 1 {
            return QuestionKind::FreeText;
        }
        match self.correct_count() {
            0 => QuestionKind::Unscorable,
            1 => QuestionKind::SingleChoice,
            _ => QuestionKind::MultipleChoice,
        }
    }

    /// Text expected for the free-text path, if this is a free-text question.
    #[must_use]
    pub fn expected_text(&self) -> Option<&str> {
        match self.kind() {
            QuestionKind::FreeText => self.answers.first().map(|a| a.text.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn expected(&self) -> ExpectedAnswer {
        match self.kind() {
            QuestionKind::FreeText => {
                ExpectedAnswer::Single(self.answers.first().map(|a| a.text.clone()).unwrap_or_default())
            }
            QuestionKind::SingleChoice => ExpectedAnswer::Single(
                self.answers
                    .iter()
                    .find(|a| a.is_correct)
                    .map(|a| a.text.clone())
                    .unwrap_or_default(),
            ),
            QuestionKind::MultipleChoice | QuestionKind::Unscorable => ExpectedAnswer::Multiple(
                self.answers
                    .iter()
                    .filter(|a| a.is_correct)
                    .map(|a| a.text.clone())
                    .collect(),
            ),
        }
    }
}
