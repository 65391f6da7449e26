// src/handlers/final_exam.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    config::GradingPolicy,
    error::AppError,
    models::final_exam::{StartTheoryRequest, SubmitTheoryRequest},
    store::{enrollments, exam_access, final_exams},
    utils::jwt::Claims,
};

/// Returns the caller's own final exam with its partials.
pub async fn get_my_final_exam(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(final_exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let detail = final_exams::get_final_exam(&pool, final_exam_id).await?;
    let enrollment = enrollments::get_enrollment(&pool, detail.exam.enrollment_id).await?;

    if enrollment.learner_id != claims.user_id()? {
        return Err(AppError::NotFound(format!("Final exam {} not found", final_exam_id)));
    }
    Ok(Json(detail))
}

/// Opens the Theory partial. Any failed check yields the same 403.
pub async fn start_theory(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(partial_id): Path<i64>,
    Json(req): Json<StartTheoryRequest>,
) -> Result<impl IntoResponse, AppError> {
    let content =
        exam_access::validate_exam_access(&pool, partial_id, &req.exam_code, claims.user_id()?, Utc::now())
            .await?;
    Ok(Json(content))
}

/// Submits Theory answers and re-aggregates the final exam.
pub async fn submit_theory(
    State(pool): State<SqlitePool>,
    State(policy): State<GradingPolicy>,
    Extension(claims): Extension<Claims>,
    Path(partial_id): Path<i64>,
    Json(req): Json<SubmitTheoryRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = exam_access::submit_theory(
        &pool,
        partial_id,
        claims.user_id()?,
        &req.answers,
        &policy,
        Utc::now(),
    )
    .await?;
    Ok(Json(outcome))
}
