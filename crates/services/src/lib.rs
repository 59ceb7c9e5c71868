#![forbid(unsafe_code)]

pub mod api;
pub mod app_services;
pub mod auth;
pub mod config;
pub mod error;
pub mod explanation;
pub mod feedback;
pub mod scoreboard_service;
pub mod sessions;

pub use quiz_core::Clock;
pub use sessions as session;

pub use api::ApiClient;
pub use app_services::AppServices;
pub use auth::{AuthService, AuthSession, IdentitySource};
pub use config::ApiConfig;
pub use error::{ApiError, AppServicesError, AuthError, ExplanationError, SessionError};
pub use explanation::{ExplanationConfig, ExplanationService};
pub use feedback::{FeedbackSink, LogFeedback, SilentFeedback};
pub use scoreboard_service::{QuestionReportService, ScoreboardService};

pub use sessions::{
    QuizSession, SessionLoopService, SessionProgress, SessionStep, TrailReviewService,
};
