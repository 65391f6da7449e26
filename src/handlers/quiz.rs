// src/handlers/quiz.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    config::GradingPolicy,
    error::AppError,
    models::attempt::{AttemptTarget, SubmitQuizRequest, TargetKind},
    store::{attempts, quizzes},
    utils::jwt::Claims,
};

fn target_for(claims: &Claims, kind: &str, target_id: i64) -> Result<AttemptTarget, AppError> {
    Ok(AttemptTarget {
        kind: kind.parse::<TargetKind>()?,
        target_id,
        learner_id: claims.user_id()?,
    })
}

/// Returns a quiz's questions without the answer key.
pub async fn get_questions(
    State(pool): State<SqlitePool>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let questions = quizzes::public_questions(&pool, quiz_id).await?;
    Ok(Json(questions))
}

/// Submits answers for a quiz target.
///
/// * Grades every question by exact option-set match.
/// * Appends the attempt and makes it the current one for the target.
pub async fn submit_attempt(
    State(pool): State<SqlitePool>,
    State(policy): State<GradingPolicy>,
    Extension(claims): Extension<Claims>,
    Path((kind, target_id)): Path<(String, i64)>,
    Json(req): Json<SubmitQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let target = target_for(&claims, &kind, target_id)?;
    let attempt = attempts::submit_quiz(&pool, &target, &req.answers, &policy, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(attempt)))
}

/// Returns the learner's current attempt for a target.
pub async fn latest_attempt(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path((kind, target_id)): Path<(String, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let target = target_for(&claims, &kind, target_id)?;
    let attempt = attempts::latest(&pool, &target)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No attempt for {}", target)))?;
    Ok(Json(attempt))
}

/// Lists the learner's attempts for a target, newest first.
pub async fn attempt_history(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path((kind, target_id)): Path<(String, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let target = target_for(&claims, &kind, target_id)?;
    Ok(Json(attempts::history(&pool, &target).await?))
}
