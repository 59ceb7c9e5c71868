use std::sync::Arc;

use quiz_core::model::{Answer, Question, QuestionId, SessionTarget};

use crate::api::QuestionSource;

/// Fetches session content and turns remote failures into empty results.
///
/// Nothing is cached; every call goes to the source.
#[derive(Clone)]
pub struct QuestionLoader {
    source: Arc<dyn QuestionSource>,
}

impl QuestionLoader {
    #[must_use]
    pub fn new(source: Arc<dyn QuestionSource>) -> Self {
        Self { source }
    }

    pub async fn load_questions(&self, target: SessionTarget) -> Vec<Question> {
        match self.source.fetch_questions(target).await {
            Ok(questions) => {
                log::debug!("loaded {} questions for {target}", questions.len());
                questions
            }
            Err(err) => {
                log::warn!("loading questions for {target} failed: {err}");
                Vec::new()
            }
        }
    }

    pub async fn load_answers(&self, question: QuestionId) -> Vec<Answer> {
        match self.source.fetch_answers(question).await {
            Ok(answers) => answers,
            Err(err) => {
                log::warn!("loading answers for question {question} failed: {err}");
                Vec::new()
            }
        }
    }
}
