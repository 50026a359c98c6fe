use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use repertoire_core::{LibraryError, TrainingError};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Library(#[from] LibraryError),

    #[error(transparent)]
    Training(#[from] TrainingError),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Library(e) => match e {
                LibraryError::StudyNotFound(_)
                | LibraryError::ChapterNotFound(_)
                | LibraryError::Tree(_) => (StatusCode::NOT_FOUND, e.to_string()),
                LibraryError::InvalidInput(_) | LibraryError::Rules(_) => {
                    (StatusCode::BAD_REQUEST, e.to_string())
                }
                LibraryError::NoOpenChapter => (StatusCode::CONFLICT, e.to_string()),
                LibraryError::Storage(err) => {
                    tracing::error!("Storage error: {err}");
                    (StatusCode::INTERNAL_SERVER_ERROR, "Storage error".to_string())
                }
            },
            AppError::Training(e) => match e {
                TrainingError::NoLines => (StatusCode::BAD_REQUEST, e.to_string()),
                TrainingError::InvalidState { .. } => (StatusCode::CONFLICT, e.to_string()),
                TrainingError::BrokenLine { .. } => {
                    tracing::warn!("Training line failed: {e}");
                    (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
                }
            },
            AppError::Anyhow(e) => {
                tracing::error!("Unexpected error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        (status, Json(json!({ "detail": message }))).into_response()
    }
}
