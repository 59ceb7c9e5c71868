use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use quiz_core::Clock;
use quiz_core::model::{Answer, CourseId, Question, QuestionId, SessionTarget, TopicId, UserId};
use quiz_core::scoreboard::ScoreEntry;

use super::dto::{
    AiContextUpdate, AnswerDto, LoginRequest, QuestionDto, QuestionRef, RawId, RefreshRequest,
    ScoreDto, ScoreSubmission, TokenResponse, UserIdRequest,
};
use super::{
    AiContextSink, QuestionReports, QuestionSource, ScoreSink, ScoreboardSource, TopicCompletion,
};
use crate::auth::{AuthApi, AuthSession, TokenPair, TokenRefresher};
use crate::config::ApiConfig;
use crate::error::{ApiError, AuthError};

/// Relative endpoint paths. The base URL comes from `ApiConfig`.
pub mod paths {
    use quiz_core::model::{CourseId, QuestionId, SessionTarget, TopicId};

    pub const SCORE_ENTRY: &str = "score/entry";
    pub const REPORT_QUESTION: &str = "report-question/";
    pub const TOKEN: &str = "token/";
    pub const TOKEN_REFRESH: &str = "token/refresh/";
    pub const USER_ID: &str = "userID/";

    #[must_use]
    pub fn questions(target: SessionTarget) -> String {
        match target {
            SessionTarget::Topic(id) => format!("question/query?format=json&okruhID={id}"),
            SessionTarget::Challenge(id) => format!("challange/query?format=json&courseID={id}"),
        }
    }

    #[must_use]
    pub fn answers(question: QuestionId) -> String {
        format!("answer/query?format=json&questionID={question}")
    }

    #[must_use]
    pub fn scoreboard(course: CourseId) -> String {
        format!("score/?format=json&courseID={course}")
    }

    #[must_use]
    pub fn ai_context(question: QuestionId) -> String {
        format!("questions/{question}/update-ai-context/")
    }

    #[must_use]
    pub fn topic_complete(topic: TopicId) -> String {
        format!("lecture/{topic}/complete/")
    }
}

/// HTTP adapter for every remote collaborator.
///
/// Requests carry the bearer token of the shared `AuthSession`. A 401 answer
/// triggers one refresh through the session's gate and one retry.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    config: ApiConfig,
    auth: Arc<AuthSession>,
    clock: Clock,
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns `ApiError::Http` if the HTTP client cannot be constructed.
    pub fn new(config: ApiConfig, auth: Arc<AuthSession>) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            config,
            auth,
            clock: Clock::default(),
        })
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        self.config.endpoint(path)
    }

    async fn send<F>(&self, build: F) -> Result<Response, ApiError>
    where
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        let token = self.auth.access_token();
        let response = with_bearer(build(&self.http), token.as_deref()).send().await?;

        let response = match (response.status(), token) {
            (StatusCode::UNAUTHORIZED, Some(stale)) => {
                match self.auth.refresh_after(&stale, self).await {
                    Ok(Some(fresh)) => with_bearer(build(&self.http), Some(&fresh)).send().await?,
                    Ok(None) => response,
                    Err(err) => {
                        log::warn!("token refresh failed: {err}");
                        return Err(match err {
                            AuthError::Api(api) => api,
                            _ => ApiError::HttpStatus(StatusCode::UNAUTHORIZED),
                        });
                    }
                }
            }
            _ => response,
        };

        ensure_success(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        let response = self.send(|http| http.get(&url)).await?;
        decode(response).await
    }
}

fn with_bearer(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

fn ensure_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ApiError::HttpStatus(status))
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
}

#[async_trait]
impl QuestionSource for ApiClient {
    async fn fetch_questions(&self, target: SessionTarget) -> Result<Vec<Question>, ApiError> {
        let rows: Vec<QuestionDto> = self.get_json(&paths::questions(target)).await?;
        let fetched_at = self.clock.now();
        let total = rows.len();
        let questions: Vec<Question> = rows
            .into_iter()
            .filter_map(|row| row.into_domain(fetched_at))
            .collect();
        if questions.len() < total {
            log::warn!(
                "dropped {} question rows with unusable ids for {target}",
                total - questions.len()
            );
        }
        Ok(questions)
    }

    async fn fetch_answers(&self, question: QuestionId) -> Result<Vec<Answer>, ApiError> {
        let rows: Vec<AnswerDto> = self.get_json(&paths::answers(question)).await?;
        Ok(rows.into_iter().filter_map(AnswerDto::into_domain).collect())
    }
}

#[async_trait]
impl ScoreSink for ApiClient {
    async fn submit_score(
        &self,
        course: CourseId,
        points: f64,
        user: &UserId,
    ) -> Result<(), ApiError> {
        let url = self.url(paths::SCORE_ENTRY);
        let body = ScoreSubmission {
            user_id: user.as_str(),
            course_id: course.value(),
            point: points,
        };
        self.send(|http| http.post(&url).json(&body)).await?;
        Ok(())
    }
}

#[async_trait]
impl TopicCompletion for ApiClient {
    async fn complete_topic(&self, topic: TopicId) -> Result<(), ApiError> {
        let url = self.url(&paths::topic_complete(topic));
        self.send(|http| http.post(&url)).await?;
        Ok(())
    }
}

#[async_trait]
impl ScoreboardSource for ApiClient {
    async fn fetch_scoreboard(&self, course: CourseId) -> Result<Vec<ScoreEntry>, ApiError> {
        let rows: Vec<ScoreDto> = self.get_json(&paths::scoreboard(course)).await?;
        Ok(rows.into_iter().filter_map(ScoreDto::into_domain).collect())
    }
}

#[async_trait]
impl QuestionReports for ApiClient {
    async fn report_question(&self, question: QuestionId) -> Result<(), ApiError> {
        let url = self.url(paths::REPORT_QUESTION);
        let body = QuestionRef {
            question_id: question.value(),
        };
        self.send(|http| http.patch(&url).json(&body)).await?;
        Ok(())
    }
}

#[async_trait]
impl AiContextSink for ApiClient {
    async fn upload_ai_context(&self, question: QuestionId, context: &str) -> Result<(), ApiError> {
        let url = self.url(&paths::ai_context(question));
        let body = AiContextUpdate {
            ai_context: context,
        };
        self.send(|http| http.patch(&url).json(&body)).await?;
        Ok(())
    }
}

#[async_trait]
impl TokenRefresher for ApiClient {
    async fn refresh_tokens(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        let response = self
            .http
            .post(self.url(paths::TOKEN_REFRESH))
            .json(&RefreshRequest {
                refresh: refresh_token,
            })
            .send()
            .await?;
        let tokens: TokenResponse = decode(ensure_success(response)?).await?;
        Ok(TokenPair {
            access: tokens.access,
            refresh: tokens.refresh,
        })
    }
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn request_tokens(
        &self,
        username: &str,
        password: &str,
    ) -> Result<TokenPair, ApiError> {
        let response = self
            .http
            .post(self.url(paths::TOKEN))
            .json(&LoginRequest { username, password })
            .send()
            .await?;
        let tokens: TokenResponse = decode(ensure_success(response)?).await?;
        Ok(TokenPair {
            access: tokens.access,
            refresh: tokens.refresh,
        })
    }

    async fn fetch_user_id(&self, access_token: &str) -> Result<Option<UserId>, ApiError> {
        let response = self
            .http
            .post(self.url(paths::USER_ID))
            .bearer_auth(access_token)
            .json(&UserIdRequest { access_token })
            .send()
            .await?;
        let raw: RawId = decode(ensure_success(response)?).await?;
        Ok(raw.into_user_id())
    }
}
