use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{QuestionId, TopicId, UserId};

/// Moderation state shown next to a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationState {
    Approved,
    Reported,
    Pending,
}

/// A question as fetched for a session.
///
/// Questions are authored elsewhere; within a session they are read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub name: String,
    pub text: String,
    pub topic_id: TopicId,
    pub approved: bool,
    pub visible: bool,
    pub reported: bool,
    pub ai_context: Option<String>,
    pub author: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub is_text_question: bool,
}

impl Question {
    /// Visible, unreported, unapproved question with no AI context.
    #[must_use]
    pub fn new(
        id: QuestionId,
        topic_id: TopicId,
        text: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let text = text.into();
        Self {
            id,
            name: text.clone(),
            text,
            topic_id,
            approved: false,
            visible: true,
            reported: false,
            ai_context: None,
            author: None,
            created_at,
            is_text_question: false,
        }
    }

    #[must_use]
    pub fn with_text_answer(mut self) -> Self {
        self.is_text_question = true;
        self
    }

    #[must_use]
    pub fn with_ai_context(mut self, context: impl Into<String>) -> Self {
        self.ai_context = Some(context.into());
        self
    }

    /// Approval wins over a pending report.
    #[must_use]
    pub fn moderation(&self) -> ModerationState {
        if self.approved {
            ModerationState::Approved
        } else if self.reported {
            ModerationState::Reported
        } else {
            ModerationState::Pending
        }
    }

    /// Stored AI explanation, ignoring blank values.
    #[must_use]
    pub fn cached_explanation(&self) -> Option<&str> {
        self.ai_context
            .as_deref()
            .map(str::trim)
            .filter(|ctx| !ctx.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn question() -> Question {
        Question::new(QuestionId::new(1), TopicId::new(2), "Capital of Slovakia?", fixed_now())
    }

    #[test]
    fn moderation_prefers_approval() {
        let mut q = question();
        assert_eq!(q.moderation(), ModerationState::Pending);
        q.reported = true;
        assert_eq!(q.moderation(), ModerationState::Reported);
        q.approved = true;
        assert_eq!(q.moderation(), ModerationState::Approved);
    }

    #[test]
    fn blank_ai_context_is_not_cached() {
        assert_eq!(question().with_ai_context("  ").cached_explanation(), None);
        assert_eq!(
            question().with_ai_context(" Bratislava is the capital. ").cached_explanation(),
            Some("Bratislava is the capital.")
        );
    }
}
