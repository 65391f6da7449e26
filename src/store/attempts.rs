// src/store/attempts.rs
//
// Attempt ledger: append-only quiz attempts with exactly one current
// attempt per target once anything has been submitted.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{SqlitePool, types::Json};

use crate::{
    config::GradingPolicy,
    db::begin_write,
    error::AppError,
    grading::quiz::{GradedQuiz, grade_quiz_submission},
    models::attempt::{Attempt, AttemptRow, AttemptTarget},
    store::{enrollments::resolve_target_quiz, quizzes::load_quiz_template},
};

const ATTEMPT_COLUMNS: &str = "id, target_kind, target_id, learner_id, attempt_order, is_current, \
     total_score, max_score, is_pass, breakdown, created_at";

/// Appends a graded attempt and makes it the target's only current attempt.
///
/// Runs as one `BEGIN IMMEDIATE` transaction, so it holds the database write
/// lock before the next order is read; a concurrent submit for the same
/// target waits on the lock and then sees this attempt. The partial unique
/// index on `is_current = 1` backs this up.
pub async fn record_attempt(
    pool: &SqlitePool,
    target: &AttemptTarget,
    graded: &GradedQuiz,
    now: DateTime<Utc>,
) -> Result<Attempt, AppError> {
    let mut tx = begin_write(pool).await?;

    sqlx::query(
        "UPDATE attempts SET is_current = 0 \
         WHERE target_kind = ? AND target_id = ? AND learner_id = ? AND is_current = 1",
    )
    .bind(target.kind.as_str())
    .bind(target.target_id)
    .bind(target.learner_id)
    .execute(&mut *tx)
    .await?;

    let attempt_order: i64 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(attempt_order), 0) + 1 FROM attempts \
         WHERE target_kind = ? AND target_id = ? AND learner_id = ?",
    )
    .bind(target.kind.as_str())
    .bind(target.target_id)
    .bind(target.learner_id)
    .fetch_one(&mut *tx)
    .await?;

    let id = sqlx::query(
        r#"
        INSERT INTO attempts
        (target_kind, target_id, learner_id, attempt_order, is_current,
         total_score, max_score, is_pass, breakdown, created_at)
        VALUES (?, ?, ?, ?, 1, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(target.kind.as_str())
    .bind(target.target_id)
    .bind(target.learner_id)
    .bind(attempt_order)
    .bind(graded.total_score)
    .bind(graded.max_score)
    .bind(graded.is_pass)
    .bind(Json(&graded.breakdown))
    .bind(now)
    .execute(&mut *tx)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::InvariantViolation(format!("concurrent submission on {}: {}", target, db))
        }
        other => AppError::from(other),
    })?
    .last_insert_rowid();

    let current: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM attempts \
         WHERE target_kind = ? AND target_id = ? AND learner_id = ? AND is_current = 1",
    )
    .bind(target.kind.as_str())
    .bind(target.target_id)
    .bind(target.learner_id)
    .fetch_one(&mut *tx)
    .await?;

    if current != 1 {
        // Dropping `tx` rolls the whole submit back.
        return Err(AppError::InvariantViolation(format!(
            "{} would have {} current attempts",
            target, current
        )));
    }

    tx.commit().await?;

    tracing::info!(
        "Recorded attempt #{} for {} (score {}/{}, pass: {})",
        attempt_order,
        target,
        graded.total_score,
        graded.max_score,
        graded.is_pass
    );

    Ok(Attempt {
        id,
        target: *target,
        attempt_order,
        is_current: true,
        total_score: graded.total_score,
        max_score: graded.max_score,
        is_pass: graded.is_pass,
        breakdown: graded.breakdown.clone(),
        created_at: now,
    })
}

/// The target's current attempt, if anything was submitted.
pub async fn latest(pool: &SqlitePool, target: &AttemptTarget) -> Result<Option<Attempt>, AppError> {
    let sql = format!(
        "SELECT {} FROM attempts \
         WHERE target_kind = ? AND target_id = ? AND learner_id = ? AND is_current = 1",
        ATTEMPT_COLUMNS
    );

    sqlx::query_as::<_, AttemptRow>(&sql)
        .bind(target.kind.as_str())
        .bind(target.target_id)
        .bind(target.learner_id)
        .fetch_optional(pool)
        .await?
        .map(Attempt::try_from)
        .transpose()
}

/// Every attempt for the target, newest first.
pub async fn history(pool: &SqlitePool, target: &AttemptTarget) -> Result<Vec<Attempt>, AppError> {
    let sql = format!(
        "SELECT {} FROM attempts \
         WHERE target_kind = ? AND target_id = ? AND learner_id = ? \
         ORDER BY attempt_order DESC",
        ATTEMPT_COLUMNS
    );

    sqlx::query_as::<_, AttemptRow>(&sql)
        .bind(target.kind.as_str())
        .bind(target.target_id)
        .bind(target.learner_id)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(Attempt::try_from)
        .collect()
}

/// Grades a learner's answers for a target and records the attempt.
pub async fn submit_quiz(
    pool: &SqlitePool,
    target: &AttemptTarget,
    answers: &HashMap<i64, Vec<i64>>,
    policy: &GradingPolicy,
    now: DateTime<Utc>,
) -> Result<Attempt, AppError> {
    let quiz_id = resolve_target_quiz(pool, target).await?;
    let template = load_quiz_template(pool, quiz_id).await?;
    let graded = grade_quiz_submission(&template, answers, policy)?;

    if !graded.ignored_question_ids.is_empty() {
        tracing::warn!(
            "Ignored unknown questions {:?} submitted to quiz {}",
            graded.ignored_question_ids,
            quiz_id
        );
    }

    record_attempt(pool, target, &graded, now).await
}
