use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::api::ApiClient;
use crate::auth::{AuthService, AuthSession, IdentitySource};
use crate::config::ApiConfig;
use crate::error::AppServicesError;
use crate::explanation::{ExplanationConfig, ExplanationService};
use crate::feedback::LogFeedback;
use crate::scoreboard_service::{QuestionReportService, ScoreboardService};
use crate::sessions::{SessionLoopService, TrailReviewService};

/// Assembles app-facing services around one API client and one auth session.
#[derive(Clone)]
pub struct AppServices {
    auth: Arc<AuthService>,
    session_loop: Arc<SessionLoopService>,
    review: Arc<TrailReviewService>,
    scoreboard: Arc<ScoreboardService>,
    reports: Arc<QuestionReportService>,
    explanations: Arc<ExplanationService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization or HTTP client
    /// construction fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        api: ApiConfig,
        explanations: Option<ExplanationConfig>,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Self::from_storage(storage, clock, api, explanations).await
    }

    /// Build services over an existing storage backend and restore any
    /// stored sign-in.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Api` if the HTTP client cannot be built.
    pub async fn from_storage(
        storage: Storage,
        clock: Clock,
        api: ApiConfig,
        explanations: Option<ExplanationConfig>,
    ) -> Result<Self, AppServicesError> {
        let auth_session = Arc::new(AuthSession::new(Arc::clone(&storage.credentials)));
        match auth_session.restore().await {
            Ok(true) => log::debug!("restored stored sign-in"),
            Ok(false) => {}
            Err(err) => log::warn!("stored credentials unreadable: {err}"),
        }

        let client = Arc::new(ApiClient::new(api, Arc::clone(&auth_session))?.with_clock(clock));
        let identity: Arc<dyn IdentitySource> = auth_session.clone();

        let session_loop = SessionLoopService::new(
            clock,
            client.clone(),
            client.clone(),
            client.clone(),
            Arc::clone(&storage.trails),
            identity,
        )
        .with_feedback(Arc::new(LogFeedback));

        Ok(Self {
            auth: Arc::new(AuthService::new(client.clone(), auth_session)),
            session_loop: Arc::new(session_loop),
            review: Arc::new(TrailReviewService::new(Arc::clone(&storage.trails))),
            scoreboard: Arc::new(ScoreboardService::new(client.clone())),
            reports: Arc::new(QuestionReportService::new(client.clone())),
            explanations: Arc::new(ExplanationService::new(explanations).with_uploads(client)),
        })
    }

    #[must_use]
    pub fn auth(&self) -> Arc<AuthService> {
        Arc::clone(&self.auth)
    }

    #[must_use]
    pub fn session_loop(&self) -> Arc<SessionLoopService> {
        Arc::clone(&self.session_loop)
    }

    #[must_use]
    pub fn review(&self) -> Arc<TrailReviewService> {
        Arc::clone(&self.review)
    }

    #[must_use]
    pub fn scoreboard(&self) -> Arc<ScoreboardService> {
        Arc::clone(&self.scoreboard)
    }

    #[must_use]
    pub fn reports(&self) -> Arc<QuestionReportService> {
        Arc::clone(&self.reports)
    }

    #[must_use]
    pub fn explanations(&self) -> Arc<ExplanationService> {
        Arc::clone(&self.explanations)
    }
}
