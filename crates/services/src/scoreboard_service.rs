use std::sync::Arc;

use quiz_core::model::{CourseId, Question, UserId};
use quiz_core::scoreboard::Scoreboard;

use crate::api::{QuestionReports, ScoreboardSource};

/// Leaderboard lookups for the results and course screens.
#[derive(Clone)]
pub struct ScoreboardService {
    source: Arc<dyn ScoreboardSource>,
}

impl ScoreboardService {
    #[must_use]
    pub fn new(source: Arc<dyn ScoreboardSource>) -> Self {
        Self { source }
    }

    /// Fetches the leaderboard; an unreachable API yields an empty board.
    pub async fn fetch(&self, course: CourseId) -> Scoreboard {
        match self.source.fetch_scoreboard(course).await {
            Ok(entries) => Scoreboard::new(entries),
            Err(err) => {
                log::warn!("scoreboard for course {course} unavailable: {err}");
                Scoreboard::default()
            }
        }
    }

    /// A user gets one scored challenge attempt per leaderboard period.
    pub async fn can_attempt(&self, course: CourseId, user: &UserId) -> bool {
        !self.fetch(course).await.has_attempt(user)
    }
}

/// Lets players flag broken questions.
#[derive(Clone)]
pub struct QuestionReportService {
    reports: Arc<dyn QuestionReports>,
}

impl QuestionReportService {
    #[must_use]
    pub fn new(reports: Arc<dyn QuestionReports>) -> Self {
        Self { reports }
    }

    /// Reports `question` and marks it locally. Returns whether the report
    /// reached the server.
    pub async fn report(&self, question: &mut Question) -> bool {
        match self.reports.report_question(question.id).await {
            Ok(()) => {
                question.reported = true;
                log::info!("question {} reported", question.id);
                true
            }
            Err(err) => {
                log::warn!("reporting question {} failed: {err}", question.id);
                false
            }
        }
    }
}
