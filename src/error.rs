// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Body returned for every exam-access failure, whatever check failed.
pub const ACCESS_DENIED_MESSAGE: &str = "exam access denied";

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    // 500 Internal Server Error
    #[error("internal error: {0}")]
    InternalServerError(String),

    // 400 Bad Request: malformed submission or request body
    #[error("invalid input: {0}")]
    BadRequest(String),

    // 401 Unauthorized
    #[error("authentication failed: {0}")]
    AuthError(String),

    // 403 Forbidden, exam gate. The reason is only ever logged.
    #[error("access denied: {0}")]
    AccessDenied(String),

    // 404 Not Found
    #[error("not found: {0}")]
    NotFound(String),

    // 409 Conflict (e.g., a second final exam for one enrollment)
    #[error("conflict: {0}")]
    Conflict(String),

    // 422 Unprocessable Entity: authoring produced an ungradable configuration
    #[error("configuration error: {0}")]
    ConfigError(String),

    // 409 Conflict, retryable: the attempt ledger would break its current-attempt invariant
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::AccessDenied(reason) => {
                tracing::info!("Exam access denied: {}", reason);
                (StatusCode::FORBIDDEN, ACCESS_DENIED_MESSAGE.to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::ConfigError(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::InvariantViolation(msg) => {
                tracing::error!("Attempt ledger invariant violated: {}", msg);
                (StatusCode::CONFLICT, "Submission conflicted, retry".to_string())
            }
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}
