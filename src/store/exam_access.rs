// src/store/exam_access.rs
//
// Exam codes and the Theory gate. Every refusal surfaces as the same
// `AccessDenied`; only the log line says which check failed.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rand::Rng;
use sqlx::{SqliteConnection, SqlitePool, types::Json};

use crate::{
    config::{GradingPolicy, MAX_CODE_GENERATION_ATTEMPTS},
    db::begin_write,
    error::AppError,
    grading::{
        access::{DenialReason, TheoryGate, check_theory_access, generate_unique_code, is_code_active, within_window},
        quiz::grade_quiz_submission,
    },
    models::final_exam::{FinalExamPartial, IssuedCode, PartialKind, PartialResult, TheoryContent, TheoryOutcome},
    store::{
        final_exams::{aggregate, load_exam, load_partial},
        quizzes::{load_quiz_template, public_questions},
    },
};

fn deny(partial_id: i64, requester_id: i64, reason: DenialReason) -> AppError {
    tracing::warn!(
        "Denied theory access to partial {} for learner {}: {}",
        partial_id,
        requester_id,
        reason
    );
    AppError::AccessDenied(reason.to_string())
}

/// Learner owning the final exam a partial belongs to.
async fn partial_owner(conn: &mut SqliteConnection, partial_id: i64) -> Result<Option<i64>, AppError> {
    Ok(sqlx::query_scalar(
        r#"
        SELECT e.learner_id
        FROM final_exam_partials p
        JOIN final_exams f ON f.id = p.final_exam_id
        JOIN enrollments e ON e.id = f.enrollment_id
        WHERE p.id = ?
        "#,
    )
    .bind(partial_id)
    .fetch_optional(conn)
    .await?)
}

/// Issues a fresh code for the exam's Theory partial, replacing any old one.
///
/// The code is unique among the active codes of the exam's class. Candidates
/// come from the injected `rng` and are redrawn on collision.
pub async fn issue_exam_code<R>(
    pool: &SqlitePool,
    final_exam_id: i64,
    rng: &mut R,
    policy: &GradingPolicy,
    now: DateTime<Utc>,
) -> Result<IssuedCode, AppError>
where
    R: Rng + Send + ?Sized,
{
    let mut tx = begin_write(pool).await?;

    let exam = load_exam(&mut tx, final_exam_id).await?;

    let partial_id: i64 = sqlx::query_scalar(
        "SELECT id FROM final_exam_partials WHERE final_exam_id = ? AND kind = ?",
    )
    .bind(exam.id)
    .bind(PartialKind::Theory.as_str())
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Final exam {} has no theory partial", final_exam_id)))?;

    // The transaction already holds the write lock, so two issuances in the
    // same class cannot both see a code as free.
    sqlx::query("UPDATE final_exam_partials SET exam_code = NULL WHERE id = ?")
        .bind(partial_id)
        .execute(&mut *tx)
        .await?;

    let class_codes: Vec<(String, Option<DateTime<Utc>>)> = sqlx::query_as(
        r#"
        SELECT p.exam_code, p.end_time
        FROM final_exam_partials p
        JOIN final_exams f ON f.id = p.final_exam_id
        JOIN enrollments e ON e.id = f.enrollment_id
        WHERE e.class_id = (
            SELECT e2.class_id FROM final_exams f2
            JOIN enrollments e2 ON e2.id = f2.enrollment_id
            WHERE f2.id = ?
        )
        AND p.exam_code IS NOT NULL
        "#,
    )
    .bind(exam.id)
    .fetch_all(&mut *tx)
    .await?;

    let active: HashSet<String> = class_codes
        .into_iter()
        .filter(|(_, end)| is_code_active(*end, now))
        .map(|(code, _)| code)
        .collect();

    let code = generate_unique_code(
        rng,
        policy.exam_code_length,
        MAX_CODE_GENERATION_ATTEMPTS,
        |candidate| active.contains(candidate),
    )
    .ok_or_else(|| {
        AppError::Conflict(format!(
            "Could not find a free exam code for final exam {}",
            final_exam_id
        ))
    })?;

    sqlx::query("UPDATE final_exam_partials SET exam_code = ? WHERE id = ?")
        .bind(&code)
        .bind(partial_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!("Issued exam code for final exam {} (partial {})", final_exam_id, partial_id);

    Ok(IssuedCode {
        final_exam_id,
        partial_id,
        exam_code: code,
    })
}

/// Opens a Theory partial for its owner when the code and window check out.
///
/// The first successful call stamps the start time; later calls before
/// submission keep the original stamp, so the duration limit cannot be reset.
pub async fn validate_exam_access(
    pool: &SqlitePool,
    partial_id: i64,
    supplied_code: &str,
    requester_id: i64,
    now: DateTime<Utc>,
) -> Result<TheoryContent, AppError> {
    let mut conn = pool.acquire().await?;

    let partial = match load_partial(&mut conn, partial_id).await {
        Ok(partial) => partial,
        Err(AppError::NotFound(_)) => return Err(deny(partial_id, requester_id, DenialReason::UnknownPartial)),
        Err(e) => return Err(e),
    };
    let owner = partial_owner(&mut conn, partial_id)
        .await?
        .ok_or_else(|| deny(partial_id, requester_id, DenialReason::UnknownPartial))?;

    let gate = TheoryGate {
        kind_is_theory: partial.kind == PartialKind::Theory,
        owner_learner_id: owner,
        exam_code: partial.exam_code.as_deref(),
        start_time: partial.start_time,
        end_time: partial.end_time,
        already_submitted: partial.result.is_some(),
    };
    check_theory_access(&gate, supplied_code, requester_id, now)
        .map_err(|reason| deny(partial_id, requester_id, reason))?;

    let quiz_id = partial
        .quiz_id
        .ok_or_else(|| AppError::InternalServerError(format!("Theory partial {} has no quiz", partial_id)))?;

    // Refuse before stamping so a bad duration cannot lock the learner out.
    partial.deadline_from(partial.theory_started_at.unwrap_or(now))?;

    sqlx::query(
        "UPDATE final_exam_partials SET theory_started_at = ? WHERE id = ? AND theory_started_at IS NULL",
    )
    .bind(now)
    .bind(partial_id)
    .execute(&mut *conn)
    .await?;

    let partial = load_partial(&mut conn, partial_id).await?;
    drop(conn);

    let started_at = partial.theory_started_at.unwrap_or(now);
    tracing::info!(
        "Learner {} opened theory partial {} (started {})",
        requester_id,
        partial_id,
        started_at
    );

    Ok(TheoryContent {
        partial_id,
        quiz_id,
        started_at,
        deadline: partial.theory_deadline()?,
        questions: public_questions(pool, quiz_id).await?,
    })
}

/// Grades the learner's Theory answers, stores the mark and re-aggregates the exam.
pub async fn submit_theory(
    pool: &SqlitePool,
    partial_id: i64,
    requester_id: i64,
    answers: &HashMap<i64, Vec<i64>>,
    policy: &GradingPolicy,
    now: DateTime<Utc>,
) -> Result<TheoryOutcome, AppError> {
    let mut conn = pool.acquire().await?;

    let partial: FinalExamPartial = match load_partial(&mut conn, partial_id).await {
        Ok(partial) => partial,
        Err(AppError::NotFound(_)) => return Err(deny(partial_id, requester_id, DenialReason::UnknownPartial)),
        Err(e) => return Err(e),
    };
    let owner = partial_owner(&mut conn, partial_id).await?;
    drop(conn);

    if partial.kind != PartialKind::Theory {
        return Err(deny(partial_id, requester_id, DenialReason::NotTheory));
    }
    if owner != Some(requester_id) {
        return Err(deny(partial_id, requester_id, DenialReason::NotOwner));
    }
    if partial.theory_started_at.is_none() {
        return Err(deny(partial_id, requester_id, DenialReason::NotStarted));
    }
    if partial.result.is_some() {
        return Err(deny(partial_id, requester_id, DenialReason::AlreadySubmitted));
    }
    if !within_window(partial.start_time, partial.end_time, now) {
        return Err(deny(partial_id, requester_id, DenialReason::OutsideWindow));
    }
    if let Some(deadline) = partial.theory_deadline()? {
        if now > deadline {
            return Err(AppError::BadRequest(format!(
                "Time limit for partial {} ended at {}",
                partial_id, deadline
            )));
        }
    }

    let quiz_id = partial
        .quiz_id
        .ok_or_else(|| AppError::InternalServerError(format!("Theory partial {} has no quiz", partial_id)))?;
    let template = load_quiz_template(pool, quiz_id).await?;
    let graded = grade_quiz_submission(&template, answers, policy)?;
    let result = PartialResult::theory(graded.total_score, graded.max_score);

    let stored = sqlx::query(
        "UPDATE final_exam_partials SET result = ?, mark = ?, completed_at = ? WHERE id = ? AND result IS NULL",
    )
    .bind(Json(&result))
    .bind(result.mark())
    .bind(now)
    .bind(partial_id)
    .execute(pool)
    .await?;
    if stored.rows_affected() == 0 {
        return Err(AppError::Conflict(format!("Partial {} was already submitted", partial_id)));
    }

    tracing::info!(
        "Theory partial {} graded: {}/{} (mark {:.1})",
        partial_id,
        graded.total_score,
        graded.max_score,
        result.mark()
    );

    let exam = aggregate(pool, partial.final_exam_id, policy).await?;

    Ok(TheoryOutcome {
        partial_id,
        mark: result.mark(),
        graded,
        exam,
    })
}
