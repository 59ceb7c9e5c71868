//! Wire shapes of the quiz REST API and their conversion into domain types.
//!
//! The backend mixes numeric and string identifiers and fills optional text
//! fields with `""` instead of `null`; both quirks are absorbed here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quiz_core::model::{Answer, AnswerId, Question, QuestionId, TopicId, UserId};
use quiz_core::scoreboard::ScoreEntry;

/// Identifier that may arrive as a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawId {
    Number(u64),
    Text(String),
}

impl RawId {
    pub(crate) fn as_u64(&self) -> Option<u64> {
        match self {
            RawId::Number(n) => Some(*n),
            RawId::Text(s) => s.trim().parse().ok(),
        }
    }

    pub(crate) fn into_user_id(self) -> Option<UserId> {
        match self {
            RawId::Number(n) => UserId::new(n.to_string()),
            RawId::Text(s) => UserId::new(s),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuestionDto {
    pub id: RawId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub text: String,
    pub okruh: RawId,
    #[serde(default)]
    pub approved: bool,
    #[serde(default = "visible_by_default")]
    pub visible: bool,
    #[serde(default)]
    pub reported: bool,
    #[serde(default)]
    pub ai_context: Option<String>,
    #[serde(default)]
    pub created_by: Option<RawId>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_text_question: bool,
}

fn visible_by_default() -> bool {
    true
}

impl QuestionDto {
    /// Rows with unusable ids are dropped by the caller.
    pub(crate) fn into_domain(self, fetched_at: DateTime<Utc>) -> Option<Question> {
        let id = QuestionId::new(self.id.as_u64()?);
        let topic_id = TopicId::new(self.okruh.as_u64()?);
        Some(Question {
            id,
            name: self.name,
            text: self.text,
            topic_id,
            approved: self.approved,
            visible: self.visible,
            reported: self.reported,
            ai_context: self.ai_context.filter(|c| !c.trim().is_empty()),
            author: self.created_by.and_then(RawId::into_user_id),
            created_at: self.created_at.unwrap_or(fetched_at),
            is_text_question: self.is_text_question,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnswerDto {
    pub id: RawId,
    #[serde(default)]
    pub text: String,
    /// `true` marks a correct candidate.
    #[serde(default)]
    pub answer_type: bool,
    pub question: RawId,
}

impl AnswerDto {
    pub(crate) fn into_domain(self) -> Option<Answer> {
        Some(Answer::new(
            AnswerId::new(self.id.as_u64()?),
            QuestionId::new(self.question.as_u64()?),
            self.text,
            self.answer_type,
        ))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScoreDto {
    pub id: RawId,
    #[serde(default)]
    pub points: f64,
    pub user: RawId,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub coursename: String,
}

impl ScoreDto {
    pub(crate) fn into_domain(self) -> Option<ScoreEntry> {
        let id = match self.id {
            RawId::Number(n) => n.to_string(),
            RawId::Text(s) => s,
        };
        Some(ScoreEntry {
            id,
            points: self.points,
            user: self.user.into_user_id()?,
            username: self.username,
            course_name: self.coursename,
        })
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ScoreSubmission<'a> {
    pub user_id: &'a str,
    #[serde(rename = "courseID")]
    pub course_id: u64,
    pub point: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionRef {
    #[serde(rename = "questionID")]
    pub question_id: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct AiContextUpdate<'a> {
    pub ai_context: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserIdRequest<'a> {
    pub access_token: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::time::fixed_now;

    #[test]
    fn question_accepts_string_ids_and_blank_context() {
        let raw = r#"{
            "id": "12", "name": "Capital", "text": "Capital of Slovakia?",
            "okruh": 4, "approved": true, "visible": true, "reported": false,
            "ai_context": "", "created_by": 7, "is_text_question": true
        }"#;
        let dto: QuestionDto = serde_json::from_str(raw).unwrap();
        let question = dto.into_domain(fixed_now()).unwrap();

        assert_eq!(question.id, QuestionId::new(12));
        assert_eq!(question.topic_id, TopicId::new(4));
        assert!(question.ai_context.is_none());
        assert_eq!(question.author, UserId::new("7"));
        assert_eq!(question.created_at, fixed_now());
        assert!(question.is_text_question);
    }

    #[test]
    fn question_with_garbage_id_is_dropped() {
        let raw = r#"{"id": "abc", "okruh": 1}"#;
        let dto: QuestionDto = serde_json::from_str(raw).unwrap();
        assert!(dto.into_domain(fixed_now()).is_none());
    }

    #[test]
    fn answer_type_maps_to_correctness() {
        let raw = r#"{"id": 3, "text": "Bratislava", "answer_type": true, "question": "12"}"#;
        let dto: AnswerDto = serde_json::from_str(raw).unwrap();
        let answer = dto.into_domain().unwrap();
        assert!(answer.is_correct);
        assert_eq!(answer.question_id, QuestionId::new(12));
    }

    #[test]
    fn score_submission_uses_backend_field_names() {
        let body = ScoreSubmission {
            user_id: "9",
            course_id: 3,
            point: 6.5,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["courseID"], 3);
        assert_eq!(json["user_id"], "9");
        assert_eq!(json["point"], 6.5);
    }
}
