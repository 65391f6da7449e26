// src/handlers/practice.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::SqlitePool;

use crate::{error::AppError, models::practice::RecordStepRequest, store::practice, utils::jwt::Claims};

/// Lists the live steps of a practice.
pub async fn list_steps(
    State(pool): State<SqlitePool>,
    Path(practice_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(practice::list_steps(&pool, practice_id).await?))
}

/// Starts a new practice attempt for the caller.
pub async fn start_attempt(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(practice_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = practice::start_attempt(&pool, practice_id, claims.user_id()?, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(attempt)))
}

/// Records the result of one step.
pub async fn record_step(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
    Json(req): Json<RecordStepRequest>,
) -> Result<impl IntoResponse, AppError> {
    let step = practice::record_step_result(
        &pool,
        attempt_id,
        claims.user_id()?,
        req.step_id,
        req.is_pass,
        Utc::now(),
    )
    .await?;
    Ok(Json(step))
}

/// Shows completeness and passing state without grading.
pub async fn evaluate_attempt(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let evaluation = practice::evaluate_practice_attempt(&pool, attempt_id, claims.user_id()?).await?;
    Ok(Json(evaluation))
}

/// Grades the attempt: pass only when every step is present and passed.
pub async fn confirm_attempt(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let confirmed =
        practice::confirm_practice_attempt(&pool, attempt_id, claims.user_id()?, Utc::now()).await?;
    Ok(Json(confirmed))
}
