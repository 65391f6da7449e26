// src/store/enrollments.rs

use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::{
        attempt::{AttemptTarget, TargetKind},
        enrollment::{ActivityRecord, Enrollment, SectionQuiz},
    },
    store::quizzes::get_quiz,
};

pub async fn create_enrollment(pool: &SqlitePool, learner_id: i64, class_id: i64) -> Result<Enrollment, AppError> {
    let id = sqlx::query("INSERT INTO enrollments (learner_id, class_id) VALUES (?, ?)")
        .bind(learner_id)
        .bind(class_id)
        .execute(pool)
        .await?
        .last_insert_rowid();

    Ok(Enrollment {
        id,
        learner_id,
        class_id,
    })
}

pub async fn get_enrollment(pool: &SqlitePool, enrollment_id: i64) -> Result<Enrollment, AppError> {
    sqlx::query_as::<_, Enrollment>("SELECT id, learner_id, class_id FROM enrollments WHERE id = ?")
        .bind(enrollment_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Enrollment {} not found", enrollment_id)))
}

pub async fn create_activity_record(
    pool: &SqlitePool,
    enrollment_id: i64,
    quiz_id: i64,
) -> Result<ActivityRecord, AppError> {
    get_enrollment(pool, enrollment_id).await?;
    get_quiz(pool, quiz_id).await?;

    let id = sqlx::query("INSERT INTO activity_records (enrollment_id, quiz_id) VALUES (?, ?)")
        .bind(enrollment_id)
        .bind(quiz_id)
        .execute(pool)
        .await?
        .last_insert_rowid();

    Ok(ActivityRecord {
        id,
        enrollment_id,
        quiz_id,
    })
}

pub async fn create_section_quiz(pool: &SqlitePool, quiz_id: i64) -> Result<SectionQuiz, AppError> {
    get_quiz(pool, quiz_id).await?;

    let id = sqlx::query("INSERT INTO section_quizzes (quiz_id) VALUES (?)")
        .bind(quiz_id)
        .execute(pool)
        .await?
        .last_insert_rowid();

    Ok(SectionQuiz { id, quiz_id })
}

/// Finds the quiz a target is graded against, checking the learner may
/// submit to it. Activity records belong to one enrollment's learner;
/// section quizzes are open to any learner.
pub async fn resolve_target_quiz(pool: &SqlitePool, target: &AttemptTarget) -> Result<i64, AppError> {
    match target.kind {
        TargetKind::Activity => {
            let row: Option<(i64, i64)> = sqlx::query_as(
                r#"
                SELECT a.quiz_id, e.learner_id
                FROM activity_records a
                JOIN enrollments e ON e.id = a.enrollment_id
                WHERE a.id = ?
                "#,
            )
            .bind(target.target_id)
            .fetch_optional(pool)
            .await?;

            let (quiz_id, owner) =
                row.ok_or_else(|| AppError::NotFound(format!("Activity {} not found", target.target_id)))?;

            // Someone else's activity looks the same as a missing one.
            if owner != target.learner_id {
                return Err(AppError::NotFound(format!("Activity {} not found", target.target_id)));
            }
            Ok(quiz_id)
        }
        TargetKind::SectionQuiz => sqlx::query_scalar("SELECT quiz_id FROM section_quizzes WHERE id = ?")
            .bind(target.target_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Section quiz {} not found", target.target_id))),
    }
}
