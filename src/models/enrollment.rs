// src/models/enrollment.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'enrollments' table: one learner in one class.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: i64,
    pub learner_id: i64,
    pub class_id: i64,
}

/// A quiz activity inside an enrollment.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: i64,
    pub enrollment_id: i64,
    pub quiz_id: i64,
}

/// A quiz attached to a course section, open to every learner.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SectionQuiz {
    pub id: i64,
    pub quiz_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateEnrollmentRequest {
    pub learner_id: i64,
    pub class_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateActivityRequest {
    pub enrollment_id: i64,
    pub quiz_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateSectionQuizRequest {
    pub quiz_id: i64,
}
