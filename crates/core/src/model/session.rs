use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::ids::{CourseId, TopicId};

/// What a session runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum SessionTarget {
    /// Untimed practice over one topic.
    Topic(TopicId),
    /// Timed, course-wide challenge that feeds the leaderboard.
    Challenge(CourseId),
}

impl SessionTarget {
    #[must_use]
    pub fn is_challenge(self) -> bool {
        matches!(self, SessionTarget::Challenge(_))
    }

    /// Raw identifier sent to the remote API.
    #[must_use]
    pub fn raw_id(self) -> u64 {
        match self {
            SessionTarget::Topic(id) => id.value(),
            SessionTarget::Challenge(id) => id.value(),
        }
    }
}

impl fmt::Display for SessionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionTarget::Topic(id) => write!(f, "topic {id}"),
            SessionTarget::Challenge(id) => write!(f, "challenge {id}"),
        }
    }
}

/// Result record handed to the results view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub target: SessionTarget,
    /// Only present for challenges.
    pub final_score: Option<f64>,
    pub correct_count: u32,
    pub incorrect_count: u32,
    /// 0-based positions of incorrectly answered questions, in answer order.
    pub incorrect_indices: Vec<usize>,
    pub elapsed_seconds: u64,
    /// Number of correct candidates across all answered questions.
    pub correct_answer_total: u32,
    pub total_questions: usize,
}

impl SessionSummary {
    /// A topic counts as completed only when nothing was answered incorrectly.
    #[must_use]
    pub fn topic_completed(&self) -> bool {
        matches!(self.target, SessionTarget::Topic(_)) && self.incorrect_count == 0
    }

    /// Share of questions answered correctly, 0-100.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_percent(&self) -> f64 {
        if self.total_questions == 0 {
            return 0.0;
        }
        f64::from(self.correct_count) * 100.0 / self.total_questions as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(target: SessionTarget, incorrect: u32) -> SessionSummary {
        SessionSummary {
            target,
            final_score: None,
            correct_count: 4 - incorrect,
            incorrect_count: incorrect,
            incorrect_indices: (0..incorrect as usize).collect(),
            elapsed_seconds: 0,
            correct_answer_total: 4,
            total_questions: 4,
        }
    }

    #[test]
    fn topic_completed_needs_zero_incorrect() {
        assert!(summary(SessionTarget::Topic(TopicId::new(1)), 0).topic_completed());
        assert!(!summary(SessionTarget::Topic(TopicId::new(1)), 1).topic_completed());
        assert!(!summary(SessionTarget::Challenge(CourseId::new(1)), 0).topic_completed());
    }

    #[test]
    fn success_percent_handles_empty_sessions() {
        let mut s = summary(SessionTarget::Topic(TopicId::new(1)), 1);
        assert!((s.success_percent() - 75.0).abs() < f64::EPSILON);
        s.total_questions = 0;
        assert!(s.success_percent().abs() < f64::EPSILON);
    }

    #[test]
    fn target_serializes_tagged() {
        let json = serde_json::to_string(&SessionTarget::Challenge(CourseId::new(5))).unwrap();
        assert_eq!(json, r#"{"kind":"challenge","id":5}"#);
    }
}
