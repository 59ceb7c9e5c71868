use std::env;
use std::sync::Arc;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use quiz_core::model::{AnswerSet, Question};

use crate::api::AiContextSink;
use crate::error::ExplanationError;

#[derive(Clone, Debug)]
pub struct ExplanationConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl ExplanationConfig {
    /// Returns `None` unless `QUIZ_AI_API_KEY` is set.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("QUIZ_AI_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        let base_url =
            env::var("QUIZ_AI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
        let model = env::var("QUIZ_AI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
        Some(Self {
            base_url,
            api_key,
            model,
        })
    }
}

/// Explains why the correct answers of a question are correct.
///
/// Explanations are cached on the question (`ai_context`). A fresh one is
/// generated only when the cache is empty and is then uploaded so the next
/// player gets it for free.
#[derive(Clone)]
pub struct ExplanationService {
    client: Client,
    config: Option<ExplanationConfig>,
    uploads: Option<Arc<dyn AiContextSink>>,
}

impl ExplanationService {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(ExplanationConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<ExplanationConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
            uploads: None,
        }
    }

    #[must_use]
    pub fn with_uploads(mut self, uploads: Arc<dyn AiContextSink>) -> Self {
        self.uploads = Some(uploads);
        self
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    /// Returns the cached explanation or generates and uploads a new one.
    ///
    /// # Errors
    ///
    /// Returns `ExplanationError` when nothing is cached and generation is
    /// disabled, fails, or comes back empty. Upload failures are only logged.
    pub async fn explain(
        &self,
        question: &Question,
        answers: &AnswerSet,
    ) -> Result<String, ExplanationError> {
        if let Some(cached) = question.cached_explanation() {
            return Ok(cached.to_owned());
        }

        let generated = self.generate(&build_prompt(question, answers)).await?;

        if let Some(uploads) = &self.uploads {
            if let Err(err) = uploads.upload_ai_context(question.id, &generated).await {
                log::warn!("could not store explanation for question {}: {err}", question.id);
            }
        }
        Ok(generated)
    }

    async fn generate(&self, prompt: &str) -> Result<String, ExplanationError> {
        let config = self.config.as_ref().ok_or(ExplanationError::Disabled)?;

        let url = format!(
            "{}/chat/completions",
            config.base_url.trim_end_matches('/')
        );
        let payload = ChatRequest {
            model: config.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: prompt.to_string(),
            }],
            temperature: 0.2,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&config.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ExplanationError::HttpStatus(response.status()));
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(ExplanationError::EmptyResponse)?;

        Ok(content.trim().to_string())
    }
}

/// Prompt listing the question and every candidate with its correctness.
#[must_use]
pub fn build_prompt(question: &Question, answers: &AnswerSet) -> String {
    let mut prompt = format!(
        "Explain briefly why the correct answers to this quiz question are correct.\n\nQuestion: {}\n",
        question.text.trim()
    );
    for answer in answers.answers() {
        let mark = if answer.is_correct { "correct" } else { "wrong" };
        prompt.push_str(&format!("- {} ({mark})\n", answer.text.trim()));
    }
    prompt
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{Answer, AnswerId, QuestionId, TopicId};
    use quiz_core::time::fixed_now;

    fn sample() -> (Question, AnswerSet) {
        let qid = QuestionId::new(1);
        let question = Question::new(qid, TopicId::new(1), " Largest planet? ", fixed_now());
        let answers = AnswerSet::new(
            qid,
            vec![
                Answer::new(AnswerId::new(1), qid, "Jupiter", true),
                Answer::new(AnswerId::new(2), qid, "Mars", false),
            ],
        )
        .unwrap();
        (question, answers)
    }

    #[test]
    fn prompt_lists_candidates_with_marks() {
        let (question, answers) = sample();
        let prompt = build_prompt(&question, &answers);
        assert!(prompt.contains("Question: Largest planet?\n"));
        assert!(prompt.contains("- Jupiter (correct)\n"));
        assert!(prompt.contains("- Mars (wrong)\n"));
    }

    #[tokio::test]
    async fn cached_context_skips_generation() {
        let (question, answers) = sample();
        let question = question.with_ai_context("Jupiter is a gas giant.");
        let service = ExplanationService::new(None);
        let text = service.explain(&question, &answers).await.unwrap();
        assert_eq!(text, "Jupiter is a gas giant.");
    }

    #[tokio::test]
    async fn missing_context_without_config_is_disabled() {
        let (question, answers) = sample();
        let service = ExplanationService::new(None);
        assert!(!service.enabled());
        let err = service.explain(&question, &answers).await.unwrap_err();
        assert!(matches!(err, ExplanationError::Disabled));
    }
}
