//! Seams between the session engine and the remote quiz API.
//!
//! Each trait covers one collaborator so tests can fake exactly what a
//! service touches. `ApiClient` implements all of them over HTTP.

use async_trait::async_trait;

use quiz_core::model::{Answer, CourseId, Question, QuestionId, SessionTarget, TopicId, UserId};
use quiz_core::scoreboard::ScoreEntry;

use crate::error::ApiError;

mod client;
pub(crate) mod dto;

pub use client::{ApiClient, paths};

/// Supplies the questions and answer candidates of a session.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Ordered questions for a topic or a challenge.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` when the request or decoding fails.
    async fn fetch_questions(&self, target: SessionTarget) -> Result<Vec<Question>, ApiError>;

    /// Answer candidates of one question, in server order.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` when the request or decoding fails.
    async fn fetch_answers(&self, question: QuestionId) -> Result<Vec<Answer>, ApiError>;
}

/// Receives challenge scores for the leaderboard.
#[async_trait]
pub trait ScoreSink: Send + Sync {
    /// # Errors
    ///
    /// Returns `ApiError` when the submission is rejected or does not arrive.
    async fn submit_score(
        &self,
        course: CourseId,
        points: f64,
        user: &UserId,
    ) -> Result<(), ApiError>;
}

/// Marks a topic as finished for the signed-in user.
#[async_trait]
pub trait TopicCompletion: Send + Sync {
    /// # Errors
    ///
    /// Returns `ApiError` when the request fails.
    async fn complete_topic(&self, topic: TopicId) -> Result<(), ApiError>;
}

#[async_trait]
pub trait ScoreboardSource: Send + Sync {
    /// Leaderboard rows for a course, best first.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` when the request or decoding fails.
    async fn fetch_scoreboard(&self, course: CourseId) -> Result<Vec<ScoreEntry>, ApiError>;
}

#[async_trait]
pub trait QuestionReports: Send + Sync {
    /// Flags a question for moderator review.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` when the request fails.
    async fn report_question(&self, question: QuestionId) -> Result<(), ApiError>;
}

#[async_trait]
pub trait AiContextSink: Send + Sync {
    /// Stores a generated explanation next to the question.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` when the upload fails.
    async fn upload_ai_context(&self, question: QuestionId, context: &str) -> Result<(), ApiError>;
}
