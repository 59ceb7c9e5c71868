use chrono::{DateTime, Utc};

use quiz_core::grading::{Verdict, challenge_score, grade};
use quiz_core::model::{
    Answer, AnswerId, AnswerSet, Question, QuestionKind, Selection, SessionSummary,
    SessionTarget, SessionTrail, TrailEntry, TrailRecord, TrailSelection,
};

use super::progress::SessionProgress;
use super::timer::SessionTimer;
use crate::error::SessionError;

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

/// Lifecycle of a session.
///
/// `Loading` and `Active` alternate once per question; `Finalizing` is
/// entered exactly once from the validated terminal question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Waiting for the answers of the current question.
    Loading,
    /// Answers are on screen; selection and validation are allowed.
    Active,
    Finalizing,
    Done,
    Abandoned,
}

/// Outcome of moving past a validated question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Moved to this 0-based position; its answers still need loading.
    Next(usize),
    /// The terminal question was validated; the session awaits `finalize`.
    Finished,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One run through an ordered question sequence.
///
/// The session owns its counters, trail and timer; remote effects live in
/// `SessionLoopService`.
#[derive(Debug)]
pub struct QuizSession {
    target: SessionTarget,
    questions: Vec<Question>,
    position: usize,
    answers: Option<AnswerSet>,
    selection: Selection,
    answers_sent: bool,
    last_verdict: Option<Verdict>,
    correct: u32,
    incorrect: u32,
    incorrect_indices: Vec<usize>,
    correct_answer_total: u32,
    trail: SessionTrail,
    timer: SessionTimer,
    phase: SessionPhase,
    summary: Option<SessionSummary>,
}

impl QuizSession {
    /// Create a session over `questions` in the given order.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` if no questions are provided.
    pub fn new(
        target: SessionTarget,
        questions: Vec<Question>,
        timer: SessionTimer,
    ) -> Result<Self, SessionError> {
        if questions.is_empty() {
            return Err(SessionError::Empty);
        }
        Ok(Self {
            target,
            questions,
            position: 0,
            answers: None,
            selection: Selection::new(QuestionKind::FreeText),
            answers_sent: false,
            last_verdict: None,
            correct: 0,
            incorrect: 0,
            incorrect_indices: Vec::new(),
            correct_answer_total: 0,
            trail: SessionTrail::new(),
            timer,
            phase: SessionPhase::Loading,
            summary: None,
        })
    }

    #[must_use]
    pub fn target(&self) -> SessionTarget {
        self.target
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        self.position + 1 == self.questions.len()
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        match self.phase {
            SessionPhase::Loading | SessionPhase::Active => self.questions.get(self.position),
            _ => None,
        }
    }

    #[must_use]
    pub fn answers(&self) -> Option<&AnswerSet> {
        self.answers.as_ref()
    }

    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    #[must_use]
    pub fn answers_sent(&self) -> bool {
        self.answers_sent
    }

    #[must_use]
    pub fn last_verdict(&self) -> Option<Verdict> {
        self.last_verdict
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn incorrect_count(&self) -> u32 {
        self.incorrect
    }

    #[must_use]
    pub fn incorrect_indices(&self) -> &[usize] {
        &self.incorrect_indices
    }

    #[must_use]
    pub fn elapsed_seconds(&self) -> u64 {
        self.timer.elapsed_seconds()
    }

    #[must_use]
    pub fn timer_running(&self) -> bool {
        self.timer.is_running()
    }

    #[must_use]
    pub fn trail(&self) -> &SessionTrail {
        &self.trail
    }

    #[must_use]
    pub fn summary(&self) -> Option<&SessionSummary> {
        self.summary.as_ref()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase == SessionPhase::Done
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let answered = self.trail.len();
        SessionProgress {
            total: self.questions.len(),
            position: self.position,
            answered,
            remaining: self.questions.len().saturating_sub(answered),
            is_complete: self.is_complete(),
        }
    }

    /// Install the fetched answers of the current question.
    ///
    /// The selection mode is derived from the set; any previous selection is
    /// discarded.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AnswerSet` when the list is empty or belongs to
    /// another question, and `SessionError::AlreadyValidated` once the
    /// current question was validated.
    pub fn load_answers(&mut self, answers: Vec<Answer>) -> Result<&AnswerSet, SessionError> {
        self.ensure_open()?;
        if self.answers_sent {
            return Err(SessionError::AlreadyValidated);
        }
        let question_id = self.questions[self.position].id;
        let set = AnswerSet::new(question_id, answers)?;
        self.selection = Selection::new(set.kind());
        self.phase = SessionPhase::Active;
        Ok(self.answers.insert(set))
    }

    /// Mark or unmark a candidate of the current question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` when answers are not loaded, the question was
    /// already validated, the answer is foreign, or the question is free text.
    pub fn toggle(&mut self, answer: AnswerId) -> Result<(), SessionError> {
        let answers = self.editable_answers()?;
        if answers.get(answer).is_none() {
            return Err(SessionError::UnknownAnswer(answer));
        }
        self.selection.toggle(answer)?;
        Ok(())
    }

    /// Store typed input for a free-text question, verbatim.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` when editing is not possible or the question
    /// is a choice question.
    pub fn set_free_text(&mut self, text: impl Into<String>) -> Result<(), SessionError> {
        self.editable_answers()?;
        self.selection.set_free_text(text)?;
        Ok(())
    }

    /// Drop the current selection before validation.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` when editing is not possible.
    pub fn clear_selection(&mut self) -> Result<(), SessionError> {
        self.editable_answers()?;
        self.selection.reset();
        Ok(())
    }

    /// Grade the current selection. Exactly one counter moves and the
    /// question is appended to the trail.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AnswersPending` before answers are loaded and
    /// `SessionError::AlreadyValidated` on a second validation.
    pub fn validate(&mut self) -> Result<Verdict, SessionError> {
        let answers = self.editable_answers()?.clone();
        let verdict = grade(&answers, &self.selection);

        if verdict.is_correct() {
            self.correct += 1;
        } else {
            self.incorrect += 1;
            if !self.incorrect_indices.contains(&self.position) {
                self.incorrect_indices.push(self.position);
            }
        }
        self.correct_answer_total += u32::try_from(answers.correct_count()).unwrap_or(u32::MAX);

        let selection = match self.selection.kind() {
            QuestionKind::FreeText => TrailSelection::Text(self.selection.free_text().to_owned()),
            _ => TrailSelection::Choices(self.selection.chosen().to_vec()),
        };
        self.trail.record(TrailEntry {
            question: self.questions[self.position].clone(),
            answers,
            selection,
            verdict,
        });

        self.answers_sent = true;
        self.last_verdict = Some(verdict);
        Ok(verdict)
    }

    /// Move past the validated current question.
    ///
    /// On the terminal question the timer stops and the session enters
    /// `Finalizing`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotValidated` if the current question was not
    /// validated yet.
    pub fn advance(&mut self) -> Result<Advance, SessionError> {
        self.ensure_open()?;
        if !self.answers_sent {
            return Err(SessionError::NotValidated);
        }

        if self.is_last() {
            self.timer.stop();
            self.phase = SessionPhase::Finalizing;
            return Ok(Advance::Finished);
        }

        self.position += 1;
        self.answers = None;
        self.selection = Selection::new(QuestionKind::FreeText);
        self.answers_sent = false;
        self.last_verdict = None;
        self.phase = SessionPhase::Loading;
        Ok(Advance::Next(self.position))
    }

    /// Compute the result record. Only valid once, from `Finalizing`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` when already finalized and
    /// `SessionError::NotFinalizing` before the terminal question is done.
    pub fn finalize(&mut self) -> Result<SessionSummary, SessionError> {
        match self.phase {
            SessionPhase::Finalizing => {}
            SessionPhase::Done => return Err(SessionError::Completed),
            SessionPhase::Abandoned => return Err(SessionError::Abandoned),
            SessionPhase::Loading | SessionPhase::Active => {
                return Err(SessionError::NotFinalizing);
            }
        }

        let elapsed_seconds = self.timer.stop();
        let final_score = self
            .target
            .is_challenge()
            .then(|| challenge_score(self.correct, elapsed_seconds));

        let summary = SessionSummary {
            target: self.target,
            final_score,
            correct_count: self.correct,
            incorrect_count: self.incorrect,
            incorrect_indices: self.incorrect_indices.clone(),
            elapsed_seconds,
            correct_answer_total: self.correct_answer_total,
            total_questions: self.questions.len(),
        };
        self.phase = SessionPhase::Done;
        self.summary = Some(summary.clone());
        Ok(summary)
    }

    /// Leave the session mid-way. The timer is discarded and reads zero.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` once the last question has been
    /// validated, and `SessionError::Abandoned` when already abandoned.
    pub fn abandon(&mut self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Finalizing | SessionPhase::Done => {
                return Err(SessionError::Completed);
            }
            SessionPhase::Abandoned => return Err(SessionError::Abandoned),
            SessionPhase::Loading | SessionPhase::Active => {}
        }
        self.timer.discard();
        self.phase = SessionPhase::Abandoned;
        Ok(())
    }

    /// Snapshot of the trail for persistence.
    #[must_use]
    pub fn trail_record(&self, recorded_at: DateTime<Utc>) -> TrailRecord {
        TrailRecord::new(self.target, recorded_at, self.trail.clone())
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Loading | SessionPhase::Active => Ok(()),
            SessionPhase::Finalizing | SessionPhase::Done => Err(SessionError::Completed),
            SessionPhase::Abandoned => Err(SessionError::Abandoned),
        }
    }

    fn editable_answers(&self) -> Result<&AnswerSet, SessionError> {
        self.ensure_open()?;
        if self.answers_sent {
            return Err(SessionError::AlreadyValidated);
        }
        self.answers.as_ref().ok_or(SessionError::AnswersPending)
    }
}
