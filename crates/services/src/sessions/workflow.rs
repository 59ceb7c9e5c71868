use std::sync::Arc;

use quiz_core::grading::Verdict;
use quiz_core::model::{SessionSummary, SessionTarget};
use storage::repository::TrailStore;

use super::loader::QuestionLoader;
use super::service::{Advance, QuizSession, SessionPhase};
use super::timer::SessionTimer;
use crate::Clock;
use crate::api::{QuestionSource, ScoreSink, TopicCompletion};
use crate::auth::IdentitySource;
use crate::error::SessionError;
use crate::feedback::{FeedbackSink, SilentFeedback};

/// Score sent for a challenge left before the end.
pub const ABANDONED_CHALLENGE_SCORE: f64 = 0.0;

/// Where the session stands after `advance`.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStep {
    /// Now on this 0-based position. `answers_ready` is false when the
    /// answers could not be fetched; retry with `refresh_answers`.
    Question { position: usize, answers_ready: bool },
    Finished(SessionSummary),
}

/// Orchestrates session start, validation feedback and the remote side
/// effects of finishing or leaving a session.
///
/// Remote failures after the session has ended are logged and swallowed.
#[derive(Clone)]
pub struct SessionLoopService {
    clock: Clock,
    loader: QuestionLoader,
    scores: Arc<dyn ScoreSink>,
    completion: Arc<dyn TopicCompletion>,
    trails: Arc<dyn TrailStore>,
    identity: Arc<dyn IdentitySource>,
    feedback: Arc<dyn FeedbackSink>,
}

impl SessionLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        questions: Arc<dyn QuestionSource>,
        scores: Arc<dyn ScoreSink>,
        completion: Arc<dyn TopicCompletion>,
        trails: Arc<dyn TrailStore>,
        identity: Arc<dyn IdentitySource>,
    ) -> Self {
        Self {
            clock,
            loader: QuestionLoader::new(questions),
            scores,
            completion,
            trails,
            identity,
            feedback: Arc::new(SilentFeedback),
        }
    }

    #[must_use]
    pub fn with_feedback(mut self, feedback: Arc<dyn FeedbackSink>) -> Self {
        self.feedback = feedback;
        self
    }

    /// Start a session and load the answers of its first question.
    ///
    /// Challenges start their timer here; topics run untimed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` when no questions could be loaded.
    pub async fn start_session(&self, target: SessionTarget) -> Result<QuizSession, SessionError> {
        let questions = self.loader.load_questions(target).await;
        let timer = if target.is_challenge() {
            SessionTimer::start()
        } else {
            SessionTimer::disabled()
        };
        let mut session = QuizSession::new(target, questions, timer)?;
        log::info!(
            "started {target} with {} questions",
            session.total_questions()
        );
        self.refresh_answers(&mut session).await?;
        Ok(session)
    }

    /// Fetch the answers of the current question if they are still missing.
    ///
    /// Returns whether answers are on screen. An empty fetch leaves the
    /// session waiting in `Loading`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` for finished sessions or answer sets that
    /// belong to another question.
    pub async fn refresh_answers(&self, session: &mut QuizSession) -> Result<bool, SessionError> {
        if session.phase() == SessionPhase::Active {
            return Ok(true);
        }
        let Some(question) = session.current_question().map(|q| q.id) else {
            return Err(SessionError::Completed);
        };
        let answers = self.loader.load_answers(question).await;
        if answers.is_empty() {
            log::warn!("question {question} has no answers yet; waiting");
            return Ok(false);
        }
        session.load_answers(answers)?;
        Ok(true)
    }

    /// Grade the current question and play the matching feedback cue.
    ///
    /// # Errors
    ///
    /// Propagates validation errors from `QuizSession::validate`.
    pub fn validate_current(&self, session: &mut QuizSession) -> Result<Verdict, SessionError> {
        let verdict = session.validate()?;
        self.feedback.play(verdict);
        Ok(verdict)
    }

    /// Move on from a validated question, finalizing after the last one.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotValidated` before validation, or errors
    /// from loading the next answer set.
    pub async fn advance(&self, session: &mut QuizSession) -> Result<SessionStep, SessionError> {
        match session.advance()? {
            Advance::Next(position) => {
                let answers_ready = self.refresh_answers(session).await?;
                Ok(SessionStep::Question {
                    position,
                    answers_ready,
                })
            }
            Advance::Finished => Ok(SessionStep::Finished(self.finalize(session).await?)),
        }
    }

    async fn finalize(&self, session: &mut QuizSession) -> Result<SessionSummary, SessionError> {
        let summary = session.finalize()?;

        let record = session.trail_record(self.clock.now());
        if let Err(err) = self.trails.save_trail(&record).await {
            log::error!("could not persist session trail: {err}");
        }

        match summary.target {
            SessionTarget::Challenge(course) => {
                let score = summary.final_score.unwrap_or_default();
                match self.identity.current_user_id().await {
                    Some(user) => {
                        if let Err(err) = self.scores.submit_score(course, score, &user).await {
                            log::error!("score submission for course {course} failed: {err}");
                        } else {
                            log::info!("submitted score {score:.2} for course {course}");
                        }
                    }
                    None => log::info!("no signed-in user; challenge score not submitted"),
                }
            }
            SessionTarget::Topic(topic) => {
                if summary.topic_completed() {
                    if let Err(err) = self.completion.complete_topic(topic).await {
                        log::error!("marking topic {topic} complete failed: {err}");
                    }
                }
            }
        }

        log::info!(
            "finished {}: {} correct, {} incorrect in {}s",
            summary.target,
            summary.correct_count,
            summary.incorrect_count,
            summary.elapsed_seconds
        );
        Ok(summary)
    }

    /// Leave a session before it ends.
    ///
    /// The timer stops immediately. Leaving a challenge records a zero score
    /// for the signed-in user so the attempt counts as used.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` or `SessionError::Abandoned` when the
    /// session is already over.
    pub async fn abandon(&self, session: &mut QuizSession) -> Result<(), SessionError> {
        session.abandon()?;
        log::info!("left {} at question {}", session.target(), session.position() + 1);

        if let SessionTarget::Challenge(course) = session.target() {
            match self.identity.current_user_id().await {
                Some(user) => {
                    if let Err(err) = self
                        .scores
                        .submit_score(course, ABANDONED_CHALLENGE_SCORE, &user)
                        .await
                    {
                        log::error!("zero-score submission for course {course} failed: {err}");
                    }
                }
                None => log::info!("no signed-in user; abandoned challenge not recorded"),
            }
        }
        Ok(())
    }
}
