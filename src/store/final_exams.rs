// src/store/final_exams.rs

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool, types::Json};
use validator::Validate;

use crate::{
    config::GradingPolicy,
    db::begin_write,
    error::AppError,
    grading::aggregate::{ExamAggregate, aggregate_final_exam, check_weight_budget, weights_balanced},
    models::final_exam::{
        CreatePartialRequest, FinalExam, FinalExamDetail, FinalExamPartial, FinalExamRow,
        FinalExamStatus, PartialChange, PartialKind, PartialResult, PartialRow,
        UpdatePartialRequest,
    },
    store::{enrollments::get_enrollment, practice::get_practice, quizzes::get_quiz},
};

pub(crate) const PARTIAL_COLUMNS: &str = "id, final_exam_id, kind, weight, start_time, end_time, \
     duration_minutes, quiz_id, practice_id, exam_code, result, theory_started_at, completed_at";

pub async fn create_final_exam(pool: &SqlitePool, enrollment_id: i64) -> Result<FinalExam, AppError> {
    get_enrollment(pool, enrollment_id).await?;

    let id = sqlx::query("INSERT INTO final_exams (enrollment_id, status) VALUES (?, ?)")
        .bind(enrollment_id)
        .bind(FinalExamStatus::Pending.as_str())
        .execute(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(format!(
                "Enrollment {} already has a final exam",
                enrollment_id
            )),
            other => AppError::from(other),
        })?
        .last_insert_rowid();

    Ok(FinalExam {
        id,
        enrollment_id,
        total_mark: None,
        is_pass: None,
        status: FinalExamStatus::Pending,
    })
}

pub(crate) async fn load_exam(conn: &mut SqliteConnection, final_exam_id: i64) -> Result<FinalExam, AppError> {
    sqlx::query_as::<_, FinalExamRow>(
        "SELECT id, enrollment_id, total_mark, is_pass, status FROM final_exams WHERE id = ?",
    )
    .bind(final_exam_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Final exam {} not found", final_exam_id)))?
    .try_into()
}

pub(crate) async fn load_partials(
    conn: &mut SqliteConnection,
    final_exam_id: i64,
) -> Result<Vec<FinalExamPartial>, AppError> {
    let sql = format!(
        "SELECT {} FROM final_exam_partials WHERE final_exam_id = ? ORDER BY id",
        PARTIAL_COLUMNS
    );
    sqlx::query_as::<_, PartialRow>(&sql)
        .bind(final_exam_id)
        .fetch_all(conn)
        .await?
        .into_iter()
        .map(FinalExamPartial::try_from)
        .collect()
}

pub(crate) async fn load_partial(conn: &mut SqliteConnection, partial_id: i64) -> Result<FinalExamPartial, AppError> {
    let sql = format!("SELECT {} FROM final_exam_partials WHERE id = ?", PARTIAL_COLUMNS);
    sqlx::query_as::<_, PartialRow>(&sql)
        .bind(partial_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Partial {} not found", partial_id)))?
        .try_into()
}

pub async fn get_final_exam(pool: &SqlitePool, final_exam_id: i64) -> Result<FinalExamDetail, AppError> {
    let mut conn = pool.acquire().await?;
    let exam = load_exam(&mut conn, final_exam_id).await?;
    let partials = load_partials(&mut conn, final_exam_id).await?;
    Ok(FinalExamDetail { exam, partials })
}

pub async fn get_partial(pool: &SqlitePool, partial_id: i64) -> Result<FinalExamPartial, AppError> {
    let mut conn = pool.acquire().await?;
    load_partial(&mut conn, partial_id).await
}

fn check_window(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Result<(), AppError> {
    if let (Some(start), Some(end)) = (start, end) {
        if start >= end {
            return Err(AppError::BadRequest(
                "Partial start time must be before its end time".to_string(),
            ));
        }
    }
    Ok(())
}

/// Adds a partial to a final exam.
///
/// The weight sum may stay below 1 while partials are being added but is
/// rejected as soon as it would exceed 1.
pub async fn add_partial(
    pool: &SqlitePool,
    final_exam_id: i64,
    req: &CreatePartialRequest,
    policy: &GradingPolicy,
) -> Result<PartialChange, AppError> {
    req.validate()?;
    check_window(req.start_time, req.end_time)?;

    match req.kind {
        PartialKind::Theory => {
            let quiz_id = req
                .quiz_id
                .ok_or_else(|| AppError::BadRequest("Theory partial needs a quiz_id".to_string()))?;
            get_quiz(pool, quiz_id).await?;
        }
        PartialKind::Simulation | PartialKind::Practical => {
            let practice_id = req.practice_id.ok_or_else(|| {
                AppError::BadRequest(format!("{} partial needs a practice_id", req.kind))
            })?;
            get_practice(pool, practice_id).await?;
        }
    }

    let mut tx = begin_write(pool).await?;
    load_exam(&mut tx, final_exam_id).await?;

    let weights: Vec<f64> = sqlx::query_scalar("SELECT weight FROM final_exam_partials WHERE final_exam_id = ?")
        .bind(final_exam_id)
        .fetch_all(&mut *tx)
        .await?;
    check_weight_budget(&weights, req.weight, policy.weight_epsilon)?;

    let (quiz_id, practice_id) = match req.kind {
        PartialKind::Theory => (req.quiz_id, None),
        PartialKind::Simulation | PartialKind::Practical => (None, req.practice_id),
    };

    let id = sqlx::query(
        r#"
        INSERT INTO final_exam_partials
        (final_exam_id, kind, weight, start_time, end_time, duration_minutes, quiz_id, practice_id)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(final_exam_id)
    .bind(req.kind.as_str())
    .bind(req.weight)
    .bind(req.start_time)
    .bind(req.end_time)
    .bind(req.duration_minutes)
    .bind(quiz_id)
    .bind(practice_id)
    .execute(&mut *tx)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(format!(
            "Final exam {} already has a {} partial",
            final_exam_id, req.kind
        )),
        other => AppError::from(other),
    })?
    .last_insert_rowid();

    let partial = load_partial(&mut tx, id).await?;
    let change = weight_change(&mut tx, partial, policy).await?;
    tx.commit().await?;
    Ok(change)
}

/// Updates weight, window or duration of a partial. Omitted fields keep their value.
pub async fn update_partial(
    pool: &SqlitePool,
    partial_id: i64,
    req: &UpdatePartialRequest,
    policy: &GradingPolicy,
) -> Result<PartialChange, AppError> {
    req.validate()?;

    let mut tx = begin_write(pool).await?;
    let current = load_partial(&mut tx, partial_id).await?;

    check_window(
        req.start_time.or(current.start_time),
        req.end_time.or(current.end_time),
    )?;

    if let Some(weight) = req.weight {
        let siblings: Vec<f64> = sqlx::query_scalar(
            "SELECT weight FROM final_exam_partials WHERE final_exam_id = ? AND id <> ?",
        )
        .bind(current.final_exam_id)
        .bind(partial_id)
        .fetch_all(&mut *tx)
        .await?;
        check_weight_budget(&siblings, weight, policy.weight_epsilon)?;
    }

    sqlx::query(
        r#"
        UPDATE final_exam_partials SET
            weight = COALESCE(?, weight),
            start_time = COALESCE(?, start_time),
            end_time = COALESCE(?, end_time),
            duration_minutes = COALESCE(?, duration_minutes)
        WHERE id = ?
        "#,
    )
    .bind(req.weight)
    .bind(req.start_time)
    .bind(req.end_time)
    .bind(req.duration_minutes)
    .bind(partial_id)
    .execute(&mut *tx)
    .await?;

    let partial = load_partial(&mut tx, partial_id).await?;
    let change = weight_change(&mut tx, partial, policy).await?;
    tx.commit().await?;
    Ok(change)
}

/// Reports the exam's weight sum after an authoring change. A sum away from 1
/// is allowed while partials are still being configured, but it is logged.
async fn weight_change(
    conn: &mut SqliteConnection,
    partial: FinalExamPartial,
    policy: &GradingPolicy,
) -> Result<PartialChange, AppError> {
    let weight_sum: f64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(weight), 0.0) FROM final_exam_partials WHERE final_exam_id = ?")
            .bind(partial.final_exam_id)
            .fetch_one(&mut *conn)
            .await?;
    let balanced = weights_balanced(weight_sum, policy.weight_epsilon);
    if !balanced {
        tracing::warn!(
            "Final exam {} partial weights sum to {:.4} after changing partial {}",
            partial.final_exam_id,
            weight_sum,
            partial.id
        );
    }

    Ok(PartialChange {
        partial,
        weight_sum,
        weights_balanced: balanced,
    })
}

/// Stores a Simulation task list or Practical checklist for a partial.
/// Theory results only come from a graded quiz submission.
pub async fn record_partial_result(
    pool: &SqlitePool,
    partial_id: i64,
    result: &PartialResult,
    now: DateTime<Utc>,
) -> Result<FinalExamPartial, AppError> {
    match result {
        PartialResult::Theory { .. } => {
            return Err(AppError::BadRequest(
                "Theory results are recorded by submitting the theory exam".to_string(),
            ));
        }
        PartialResult::Simulation { tasks } if tasks.is_empty() => {
            return Err(AppError::BadRequest("Simulation result has no tasks".to_string()));
        }
        PartialResult::Practical { checklist } if checklist.is_empty() => {
            return Err(AppError::BadRequest("Practical result has an empty checklist".to_string()));
        }
        _ => {}
    }

    let mut conn = pool.acquire().await?;
    let partial = load_partial(&mut conn, partial_id).await?;
    if partial.kind != result.kind() {
        return Err(AppError::BadRequest(format!(
            "Partial {} is {}, got a {} result",
            partial_id,
            partial.kind,
            result.kind()
        )));
    }

    store_result(&mut conn, partial_id, result, now).await?;
    load_partial(&mut conn, partial_id).await
}

pub(crate) async fn store_result(
    conn: &mut SqliteConnection,
    partial_id: i64,
    result: &PartialResult,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    sqlx::query("UPDATE final_exam_partials SET result = ?, mark = ?, completed_at = ? WHERE id = ?")
        .bind(Json(result))
        .bind(result.mark())
        .bind(now)
        .bind(partial_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Recomputes and stores a final exam's mark, verdict and status.
///
/// Safe to call any number of times: the stored values are a pure function
/// of the partial results.
pub async fn aggregate(
    pool: &SqlitePool,
    final_exam_id: i64,
    policy: &GradingPolicy,
) -> Result<ExamAggregate, AppError> {
    let mut conn = pool.acquire().await?;
    load_exam(&mut conn, final_exam_id).await?;
    let partials = load_partials(&mut conn, final_exam_id).await?;

    let outcome = aggregate_final_exam(&partials, policy);

    if !outcome.weights_balanced {
        tracing::warn!(
            "Final exam {} partial weights sum to {:.4}, expected 1",
            final_exam_id,
            outcome.weight_sum
        );
    }

    let is_pass = (outcome.status == FinalExamStatus::Completed).then_some(outcome.final_pass);
    let total_mark = (outcome.status != FinalExamStatus::Pending).then_some(outcome.final_mark);

    sqlx::query("UPDATE final_exams SET total_mark = ?, is_pass = ?, status = ? WHERE id = ?")
        .bind(total_mark)
        .bind(is_pass)
        .bind(outcome.status.as_str())
        .bind(final_exam_id)
        .execute(&mut *conn)
        .await?;

    Ok(outcome)
}
