//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{AnswerId, AnswerSetError, SelectionError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by the HTTP client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by `AuthService` and the token pipeline.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    #[error("not signed in")]
    NotSignedIn,
    #[error("the server did not return a usable user id")]
    MissingUserId,
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ExplanationService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExplanationError {
    #[error("AI explanations are not configured")]
    Disabled,
    #[error("AI explanation came back empty")]
    EmptyResponse,
    #[error("AI request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by session services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no questions available for session")]
    Empty,
    #[error("answers for the current question are not loaded yet")]
    AnswersPending,
    #[error("the current question was already validated")]
    AlreadyValidated,
    #[error("the current question must be validated before advancing")]
    NotValidated,
    #[error("answer {0} does not belong to the current question")]
    UnknownAnswer(AnswerId),
    #[error("session is not ready to finalize")]
    NotFinalizing,
    #[error("session already completed")]
    Completed,
    #[error("session was abandoned")]
    Abandoned,
    #[error(transparent)]
    AnswerSet(#[from] AnswerSetError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Api(#[from] ApiError),
}
