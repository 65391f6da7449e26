// src/store/practice.rs

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use validator::Validate;

use crate::{
    db::begin_write,
    error::AppError,
    grading::checklist::{ChecklistEvaluation, PASSING_SCORE, evaluate},
    models::practice::{
        ConfirmedPractice, CreatePracticeRequest, CreateStepRequest, Practice, PracticeAttempt,
        PracticeStep, StepAttempt,
    },
};

const STEP_COLUMNS: &str = "id, practice_id, position, expected_result, action_id, component_id, is_deleted";

const ATTEMPT_COLUMNS: &str =
    "id, practice_id, learner_id, is_pass, score, confirmed_at, is_deleted, created_at";

const STEP_ATTEMPT_COLUMNS: &str =
    "id, practice_attempt_id, step_id, is_pass, score, is_deleted, created_at, updated_at";

pub async fn create_practice(pool: &SqlitePool, req: &CreatePracticeRequest) -> Result<Practice, AppError> {
    req.validate()?;

    let id = sqlx::query("INSERT INTO practices (title) VALUES (?)")
        .bind(&req.title)
        .execute(pool)
        .await?
        .last_insert_rowid();

    Ok(Practice {
        id,
        title: req.title.clone(),
    })
}

pub async fn get_practice(pool: &SqlitePool, practice_id: i64) -> Result<Practice, AppError> {
    sqlx::query_as::<_, Practice>("SELECT id, title FROM practices WHERE id = ?")
        .bind(practice_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Practice {} not found", practice_id)))
}

/// Appends a step at the end of the practice.
pub async fn add_step(
    pool: &SqlitePool,
    practice_id: i64,
    req: &CreateStepRequest,
) -> Result<PracticeStep, AppError> {
    req.validate()?;
    get_practice(pool, practice_id).await?;

    let position: i64 =
        sqlx::query_scalar("SELECT COALESCE(MAX(position), 0) + 1 FROM practice_steps WHERE practice_id = ?")
            .bind(practice_id)
            .fetch_one(pool)
            .await?;

    let id = sqlx::query(
        r#"
        INSERT INTO practice_steps (practice_id, position, expected_result, action_id, component_id)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(practice_id)
    .bind(position)
    .bind(&req.expected_result)
    .bind(req.action_id)
    .bind(req.component_id)
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(PracticeStep {
        id,
        practice_id,
        position,
        expected_result: req.expected_result.clone(),
        action_id: req.action_id,
        component_id: req.component_id,
        is_deleted: false,
    })
}

/// Soft-deletes a step. It stops being required for completeness.
pub async fn delete_step(pool: &SqlitePool, step_id: i64) -> Result<(), AppError> {
    let result = sqlx::query("UPDATE practice_steps SET is_deleted = 1 WHERE id = ? AND is_deleted = 0")
        .bind(step_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Step {} not found", step_id)));
    }
    Ok(())
}

async fn load_steps(conn: &mut SqliteConnection, practice_id: i64) -> Result<Vec<PracticeStep>, AppError> {
    let sql = format!(
        "SELECT {} FROM practice_steps WHERE practice_id = ? ORDER BY position, id",
        STEP_COLUMNS
    );
    Ok(sqlx::query_as::<_, PracticeStep>(&sql)
        .bind(practice_id)
        .fetch_all(conn)
        .await?)
}

async fn load_step_attempts(conn: &mut SqliteConnection, attempt_id: i64) -> Result<Vec<StepAttempt>, AppError> {
    let sql = format!(
        "SELECT {} FROM step_attempts WHERE practice_attempt_id = ? ORDER BY id",
        STEP_ATTEMPT_COLUMNS
    );
    Ok(sqlx::query_as::<_, StepAttempt>(&sql)
        .bind(attempt_id)
        .fetch_all(conn)
        .await?)
}

async fn load_attempt(
    conn: &mut SqliteConnection,
    attempt_id: i64,
    learner_id: i64,
) -> Result<PracticeAttempt, AppError> {
    let sql = format!(
        "SELECT {} FROM practice_attempts WHERE id = ? AND is_deleted = 0",
        ATTEMPT_COLUMNS
    );
    sqlx::query_as::<_, PracticeAttempt>(&sql)
        .bind(attempt_id)
        .fetch_optional(conn)
        .await?
        .filter(|a| a.learner_id == learner_id)
        .ok_or_else(|| AppError::NotFound(format!("Practice attempt {} not found", attempt_id)))
}

/// Live steps of a practice, in order.
pub async fn list_steps(pool: &SqlitePool, practice_id: i64) -> Result<Vec<PracticeStep>, AppError> {
    get_practice(pool, practice_id).await?;
    let mut conn = pool.acquire().await?;
    let steps = load_steps(&mut conn, practice_id).await?;
    Ok(steps.into_iter().filter(|s| !s.is_deleted).collect())
}

pub async fn start_attempt(
    pool: &SqlitePool,
    practice_id: i64,
    learner_id: i64,
    now: DateTime<Utc>,
) -> Result<PracticeAttempt, AppError> {
    get_practice(pool, practice_id).await?;

    let id = sqlx::query("INSERT INTO practice_attempts (practice_id, learner_id, created_at) VALUES (?, ?, ?)")
        .bind(practice_id)
        .bind(learner_id)
        .bind(now)
        .execute(pool)
        .await?
        .last_insert_rowid();

    Ok(PracticeAttempt {
        id,
        practice_id,
        learner_id,
        is_pass: None,
        score: None,
        confirmed_at: None,
        is_deleted: false,
        created_at: now,
    })
}

pub async fn get_attempt(pool: &SqlitePool, attempt_id: i64, learner_id: i64) -> Result<PracticeAttempt, AppError> {
    let mut conn = pool.acquire().await?;
    load_attempt(&mut conn, attempt_id, learner_id).await
}

/// Records the outcome of one step. The step attempt is created on first
/// interaction; later interactions overwrite its result.
pub async fn record_step_result(
    pool: &SqlitePool,
    attempt_id: i64,
    learner_id: i64,
    step_id: i64,
    is_pass: bool,
    now: DateTime<Utc>,
) -> Result<StepAttempt, AppError> {
    let mut tx = begin_write(pool).await?;

    let attempt = load_attempt(&mut tx, attempt_id, learner_id).await?;

    let step_practice: Option<i64> =
        sqlx::query_scalar("SELECT practice_id FROM practice_steps WHERE id = ? AND is_deleted = 0")
            .bind(step_id)
            .fetch_optional(&mut *tx)
            .await?;

    match step_practice {
        None => return Err(AppError::NotFound(format!("Step {} not found", step_id))),
        Some(practice_id) if practice_id != attempt.practice_id => {
            return Err(AppError::BadRequest(format!(
                "Step {} is not part of practice {}",
                step_id, attempt.practice_id
            )));
        }
        Some(_) => {}
    }

    let score = if is_pass { PASSING_SCORE } else { 0.0 };

    let existing: Option<(i64, DateTime<Utc>)> = sqlx::query_as(
        "SELECT id, created_at FROM step_attempts WHERE practice_attempt_id = ? AND step_id = ? AND is_deleted = 0",
    )
    .bind(attempt_id)
    .bind(step_id)
    .fetch_optional(&mut *tx)
    .await?;

    let (id, created_at) = match existing {
        Some((id, created_at)) => {
            sqlx::query("UPDATE step_attempts SET is_pass = ?, score = ?, updated_at = ? WHERE id = ?")
                .bind(is_pass)
                .bind(score)
                .bind(now)
                .bind(id)
                .execute(&mut *tx)
                .await?;
            (id, created_at)
        }
        None => {
            let id = sqlx::query(
                r#"
                INSERT INTO step_attempts
                (practice_attempt_id, step_id, is_pass, score, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(attempt_id)
            .bind(step_id)
            .bind(is_pass)
            .bind(score)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();
            (id, now)
        }
    };

    tx.commit().await?;

    Ok(StepAttempt {
        id,
        practice_attempt_id: attempt_id,
        step_id,
        is_pass,
        score,
        is_deleted: false,
        created_at,
        updated_at: now,
    })
}

/// Read-only completeness/passing check of a practice attempt.
pub async fn evaluate_practice_attempt(
    pool: &SqlitePool,
    attempt_id: i64,
    learner_id: i64,
) -> Result<ChecklistEvaluation, AppError> {
    let mut conn = pool.acquire().await?;
    let attempt = load_attempt(&mut conn, attempt_id, learner_id).await?;
    let steps = load_steps(&mut conn, attempt.practice_id).await?;
    let step_attempts = load_step_attempts(&mut conn, attempt_id).await?;
    Ok(evaluate(&steps, &step_attempts))
}

/// Grades the attempt: the only place its `is_pass` and `score` are written.
pub async fn confirm_practice_attempt(
    pool: &SqlitePool,
    attempt_id: i64,
    learner_id: i64,
    now: DateTime<Utc>,
) -> Result<ConfirmedPractice, AppError> {
    let mut tx = begin_write(pool).await?;

    let mut attempt = load_attempt(&mut tx, attempt_id, learner_id).await?;
    let steps = load_steps(&mut tx, attempt.practice_id).await?;
    let step_attempts = load_step_attempts(&mut tx, attempt_id).await?;

    let evaluation = evaluate(&steps, &step_attempts);
    if evaluation.recorded_steps == 0 {
        return Err(AppError::BadRequest(format!(
            "Practice attempt {} has no recorded steps to grade",
            attempt_id
        )));
    }

    let is_pass = evaluation.is_pass();
    let score = evaluation.score();

    sqlx::query("UPDATE practice_attempts SET is_pass = ?, score = ?, confirmed_at = ? WHERE id = ?")
        .bind(is_pass)
        .bind(score)
        .bind(now)
        .bind(attempt_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(
        "Practice attempt {} confirmed (complete: {}, passing: {})",
        attempt_id,
        evaluation.is_complete,
        evaluation.is_passing
    );

    attempt.is_pass = Some(is_pass);
    attempt.score = Some(score);
    attempt.confirmed_at = Some(now);

    Ok(ConfirmedPractice { attempt, evaluation })
}
