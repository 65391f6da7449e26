// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use rand::{SeedableRng, rngs::StdRng};
use sqlx::SqlitePool;

use crate::{
    config::GradingPolicy,
    error::AppError,
    models::{
        enrollment::{CreateActivityRequest, CreateEnrollmentRequest, CreateSectionQuizRequest},
        final_exam::{CreateFinalExamRequest, CreatePartialRequest, PartialResult, UpdatePartialRequest},
        practice::{CreatePracticeRequest, CreateStepRequest},
        quiz::{CreateQuestionRequest, CreateQuizRequest},
    },
    store::{enrollments, exam_access, final_exams, practice, quizzes},
};

// --- Quizzes ---

/// Creates a quiz. Admin only.
pub async fn create_quiz(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = quizzes::create_quiz(&pool, &payload).await?;
    tracing::info!("Quiz {} created: {}", quiz.id, quiz.title);
    Ok((StatusCode::CREATED, Json(quiz)))
}

/// Adds a question with its options to a quiz.
/// Rejects configurations that could never be graded.
pub async fn create_question(
    State(pool): State<SqlitePool>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let question = quizzes::create_question(&pool, quiz_id, &payload).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

// --- Attempt targets ---

pub async fn create_enrollment(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateEnrollmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let enrollment = enrollments::create_enrollment(&pool, payload.learner_id, payload.class_id).await?;
    Ok((StatusCode::CREATED, Json(enrollment)))
}

pub async fn create_activity(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateActivityRequest>,
) -> Result<impl IntoResponse, AppError> {
    let record = enrollments::create_activity_record(&pool, payload.enrollment_id, payload.quiz_id).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn create_section_quiz(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateSectionQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let section_quiz = enrollments::create_section_quiz(&pool, payload.quiz_id).await?;
    Ok((StatusCode::CREATED, Json(section_quiz)))
}

// --- Practices ---

pub async fn create_practice(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreatePracticeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let created = practice::create_practice(&pool, &payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn add_step(
    State(pool): State<SqlitePool>,
    Path(practice_id): Path<i64>,
    Json(payload): Json<CreateStepRequest>,
) -> Result<impl IntoResponse, AppError> {
    let step = practice::add_step(&pool, practice_id, &payload).await?;
    Ok((StatusCode::CREATED, Json(step)))
}

/// Soft-deletes a step. Existing step results for it stop counting.
pub async fn delete_step(
    State(pool): State<SqlitePool>,
    Path(step_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    practice::delete_step(&pool, step_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Final exams ---

pub async fn create_final_exam(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateFinalExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let exam = final_exams::create_final_exam(&pool, payload.enrollment_id).await?;
    Ok((StatusCode::CREATED, Json(exam)))
}

pub async fn get_final_exam(
    State(pool): State<SqlitePool>,
    Path(final_exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(final_exams::get_final_exam(&pool, final_exam_id).await?))
}

pub async fn add_partial(
    State(pool): State<SqlitePool>,
    State(policy): State<GradingPolicy>,
    Path(final_exam_id): Path<i64>,
    Json(payload): Json<CreatePartialRequest>,
) -> Result<impl IntoResponse, AppError> {
    let partial = final_exams::add_partial(&pool, final_exam_id, &payload, &policy).await?;
    Ok((StatusCode::CREATED, Json(partial)))
}

pub async fn update_partial(
    State(pool): State<SqlitePool>,
    State(policy): State<GradingPolicy>,
    Path(partial_id): Path<i64>,
    Json(payload): Json<UpdatePartialRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(final_exams::update_partial(&pool, partial_id, &payload, &policy).await?))
}

/// Records a Simulation or Practical result, then re-aggregates the exam.
pub async fn record_partial_result(
    State(pool): State<SqlitePool>,
    State(policy): State<GradingPolicy>,
    Path(partial_id): Path<i64>,
    Json(payload): Json<PartialResult>,
) -> Result<impl IntoResponse, AppError> {
    let partial = final_exams::record_partial_result(&pool, partial_id, &payload, Utc::now()).await?;
    let exam = final_exams::aggregate(&pool, partial.final_exam_id, &policy).await?;
    Ok(Json(exam))
}

/// Issues (or reissues) the Theory access code.
pub async fn issue_exam_code(
    State(pool): State<SqlitePool>,
    State(policy): State<GradingPolicy>,
    Path(final_exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut rng = StdRng::from_entropy();
    let issued = exam_access::issue_exam_code(&pool, final_exam_id, &mut rng, &policy, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(issued)))
}

pub async fn aggregate_final_exam(
    State(pool): State<SqlitePool>,
    State(policy): State<GradingPolicy>,
    Path(final_exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(final_exams::aggregate(&pool, final_exam_id, &policy).await?))
}
