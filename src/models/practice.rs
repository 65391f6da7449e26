// src/models/practice.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::grading::checklist::ChecklistEvaluation;

/// Represents the 'practices' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Practice {
    pub id: i64,
    pub title: String,
}

/// One ordered step of a practice, bound to a simulation action and component.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PracticeStep {
    pub id: i64,
    pub practice_id: i64,
    pub position: i64,
    pub expected_result: String,
    pub action_id: i64,
    pub component_id: i64,
    pub is_deleted: bool,
}

/// A learner's run through a practice. `is_pass` and `score` stay empty
/// until the attempt is confirmed.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PracticeAttempt {
    pub id: i64,
    pub practice_id: i64,
    pub learner_id: i64,
    pub is_pass: Option<bool>,
    pub score: Option<f64>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

/// Result of one step inside a practice attempt. Created on first interaction.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StepAttempt {
    pub id: i64,
    pub practice_attempt_id: i64,
    pub step_id: i64,
    pub is_pass: bool,
    pub score: f64,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePracticeRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateStepRequest {
    #[validate(length(min = 1, max = 1000))]
    pub expected_result: String,
    pub action_id: i64,
    pub component_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct RecordStepRequest {
    pub step_id: i64,
    pub is_pass: bool,
}

/// Confirmed attempt plus the evaluation that produced its verdict.
#[derive(Debug, Serialize)]
pub struct ConfirmedPractice {
    pub attempt: PracticeAttempt,
    pub evaluation: ChecklistEvaluation,
}
