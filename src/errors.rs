use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::services::backend::ApiError;
use crate::services::projector::SelectionError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] anyhow::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("booking API error: {0}")]
    Backend(#[from] ApiError),

    #[error("unable to load slots for this date: {0}")]
    SlotsUnavailable(String),

    #[error("could not lock the selected slots, they may already be taken: {0}")]
    LockConflict(String),

    #[error("a reservation lock is already held for this booking")]
    LockAlreadyHeld,

    #[error("Session expired. Please start over.")]
    LockExpired,

    #[error("booking failed: {0}")]
    BookingFailed(String),

    #[error("{0}")]
    Selection(#[from] SelectionError),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("booking is at the {actual} step, expected {expected}")]
    InvalidStep {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("booking changed while the request was in flight")]
    Stale,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden { redirect: &'static str },
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Backend(_) => StatusCode::BAD_GATEWAY,
            AppError::SlotsUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::LockConflict(_) => StatusCode::CONFLICT,
            AppError::LockAlreadyHeld => StatusCode::CONFLICT,
            AppError::LockExpired => StatusCode::GONE,
            AppError::BookingFailed(_) => StatusCode::BAD_GATEWAY,
            AppError::Selection(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidStep { .. } => StatusCode::CONFLICT,
            AppError::Stale => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let mut body = serde_json::json!({ "error": self.to_string() });
        match &self {
            AppError::Unauthorized => body["redirect"] = "/login".into(),
            AppError::Forbidden { redirect } => body["redirect"] = (*redirect).into(),
            _ => {}
        }
        (status, axum::Json(body)).into_response()
    }
}
