// src/models/attempt.rs

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};

use crate::{error::AppError, grading::quiz::QuestionResult};

/// What a quiz attempt is submitted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// A quiz inside an enrollment's activity record.
    Activity,
    /// A quiz attached to a course section.
    SectionQuiz,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Activity => "activity",
            Self::SectionQuiz => "section_quiz",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "activity" => Ok(Self::Activity),
            "section_quiz" => Ok(Self::SectionQuiz),
            other => Err(AppError::BadRequest(format!("unknown attempt target '{}'", other))),
        }
    }
}

/// The (learner, assessment) pairing an attempt belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttemptTarget {
    pub kind: TargetKind,
    pub target_id: i64,
    pub learner_id: i64,
}

impl fmt::Display for AttemptTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/learner:{}", self.kind, self.target_id, self.learner_id)
    }
}

/// Represents the 'attempts' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct AttemptRow {
    pub id: i64,
    pub target_kind: String,
    pub target_id: i64,
    pub learner_id: i64,
    pub attempt_order: i64,
    pub is_current: bool,
    pub total_score: f64,
    pub max_score: f64,
    pub is_pass: bool,
    pub breakdown: Json<Vec<QuestionResult>>,
    pub created_at: DateTime<Utc>,
}

/// One append-only quiz submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub id: i64,
    pub target: AttemptTarget,

    /// 1-based, gap-free per target.
    pub attempt_order: i64,

    pub is_current: bool,
    pub total_score: f64,
    pub max_score: f64,
    pub is_pass: bool,
    pub breakdown: Vec<QuestionResult>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<AttemptRow> for Attempt {
    type Error = AppError;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        let kind = row
            .target_kind
            .parse()
            .map_err(|_| AppError::InternalServerError(format!("bad target kind '{}'", row.target_kind)))?;

        Ok(Self {
            id: row.id,
            target: AttemptTarget {
                kind,
                target_id: row.target_id,
                learner_id: row.learner_id,
            },
            attempt_order: row.attempt_order,
            is_current: row.is_current,
            total_score: row.total_score,
            max_score: row.max_score,
            is_pass: row.is_pass,
            breakdown: row.breakdown.0,
            created_at: row.created_at,
        })
    }
}

/// DTO for submitting a quiz attempt.
#[derive(Debug, Deserialize)]
pub struct SubmitQuizRequest {
    /// Key: Question ID, Value: selected option IDs.
    pub answers: HashMap<i64, Vec<i64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_kind_round_trips_through_str() {
        for kind in [TargetKind::Activity, TargetKind::SectionQuiz] {
            assert_eq!(kind.as_str().parse::<TargetKind>().unwrap(), kind);
        }
        assert!("exam".parse::<TargetKind>().is_err());
    }

    #[test]
    fn test_submission_accepts_numeric_string_keys() {
        let req: SubmitQuizRequest =
            serde_json::from_str(r#"{"answers": {"1": [3], "2": [4, 5]}}"#).unwrap();
        assert_eq!(req.answers[&2], vec![4, 5]);
    }
}
