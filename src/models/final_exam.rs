// src/models/final_exam.rs

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use validator::Validate;

use crate::{
    error::AppError,
    grading::{aggregate::ExamAggregate, checklist::PASSING_SCORE, quiz::GradedQuiz},
    models::quiz::PublicQuestion,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialKind {
    Theory,
    Simulation,
    Practical,
}

impl PartialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Theory => "theory",
            Self::Simulation => "simulation",
            Self::Practical => "practical",
        }
    }
}

impl fmt::Display for PartialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PartialKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "theory" => Ok(Self::Theory),
            "simulation" => Ok(Self::Simulation),
            "practical" => Ok(Self::Practical),
            other => Err(AppError::InternalServerError(format!(
                "unknown partial kind '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalExamStatus {
    /// No partial graded yet.
    Pending,
    /// Some partials graded.
    InProgress,
    /// Every partial graded.
    Completed,
}

impl FinalExamStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl FromStr for FinalExamStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            other => Err(AppError::InternalServerError(format!(
                "unknown final exam status '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationTask {
    pub name: String,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub item: String,
    pub checked: bool,
}

/// Graded payload of one partial, tagged by partial type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PartialResult {
    Theory {
        total_score: f64,
        max_score: f64,
        /// Percentage, `0.0..=100.0`.
        mark: f64,
    },
    Simulation {
        tasks: Vec<SimulationTask>,
    },
    Practical {
        checklist: Vec<ChecklistItem>,
    },
}

impl PartialResult {
    /// Theory result from a graded quiz. An unscorable quiz counts as full marks.
    pub fn theory(total_score: f64, max_score: f64) -> Self {
        let mark = if max_score <= 0.0 {
            PASSING_SCORE
        } else {
            (total_score / max_score * PASSING_SCORE).clamp(0.0, PASSING_SCORE)
        };
        Self::Theory {
            total_score,
            max_score,
            mark,
        }
    }

    pub fn kind(&self) -> PartialKind {
        match self {
            Self::Theory { .. } => PartialKind::Theory,
            Self::Simulation { .. } => PartialKind::Simulation,
            Self::Practical { .. } => PartialKind::Practical,
        }
    }

    /// Pass flag for the binary partial types; Theory carries a mark instead.
    pub fn passed(&self) -> Option<bool> {
        match self {
            Self::Theory { .. } => None,
            Self::Simulation { tasks } => Some(!tasks.is_empty() && tasks.iter().all(|t| t.passed)),
            Self::Practical { checklist } => {
                Some(!checklist.is_empty() && checklist.iter().all(|c| c.checked))
            }
        }
    }

    /// Mark on the 0..=100 scale fed into the weighted sum.
    pub fn mark(&self) -> f64 {
        match self {
            Self::Theory { mark, .. } => *mark,
            Self::Simulation { .. } | Self::Practical { .. } => {
                if self.passed().unwrap_or(false) {
                    PASSING_SCORE
                } else {
                    0.0
                }
            }
        }
    }
}

/// Represents the 'final_exams' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct FinalExamRow {
    pub id: i64,
    pub enrollment_id: i64,
    pub total_mark: Option<f64>,
    pub is_pass: Option<bool>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalExam {
    pub id: i64,
    pub enrollment_id: i64,
    pub total_mark: Option<f64>,
    pub is_pass: Option<bool>,
    pub status: FinalExamStatus,
}

impl TryFrom<FinalExamRow> for FinalExam {
    type Error = AppError;

    fn try_from(row: FinalExamRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            enrollment_id: row.enrollment_id,
            total_mark: row.total_mark,
            is_pass: row.is_pass,
            status: row.status.parse()?,
        })
    }
}

/// Represents the 'final_exam_partials' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct PartialRow {
    pub id: i64,
    pub final_exam_id: i64,
    pub kind: String,
    pub weight: f64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub quiz_id: Option<i64>,
    pub practice_id: Option<i64>,
    pub exam_code: Option<String>,
    pub result: Option<Json<PartialResult>>,
    pub theory_started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalExamPartial {
    pub id: i64,
    pub final_exam_id: i64,
    pub kind: PartialKind,
    pub weight: f64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub quiz_id: Option<i64>,
    pub practice_id: Option<i64>,

    /// Never serialized; handed out only through code issuance.
    #[serde(skip)]
    pub exam_code: Option<String>,

    pub result: Option<PartialResult>,
    pub theory_started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl FinalExamPartial {
    /// Deadline for a Theory run begun at `started`, if the partial has a duration limit.
    pub fn deadline_from(&self, started: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, AppError> {
        let Some(minutes) = self.duration_minutes else {
            return Ok(None);
        };
        TimeDelta::try_minutes(minutes)
            .and_then(|limit| started.checked_add_signed(limit))
            .map(Some)
            .ok_or_else(|| {
                AppError::ConfigError(format!(
                    "Partial {} has an unusable duration of {} minutes",
                    self.id, minutes
                ))
            })
    }

    /// Deadline for a started Theory partial, if it has a duration limit.
    pub fn theory_deadline(&self) -> Result<Option<DateTime<Utc>>, AppError> {
        match self.theory_started_at {
            Some(started) => self.deadline_from(started),
            None => Ok(None),
        }
    }
}

impl TryFrom<PartialRow> for FinalExamPartial {
    type Error = AppError;

    fn try_from(row: PartialRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            final_exam_id: row.final_exam_id,
            kind: row.kind.parse()?,
            weight: row.weight,
            start_time: row.start_time,
            end_time: row.end_time,
            duration_minutes: row.duration_minutes,
            quiz_id: row.quiz_id,
            practice_id: row.practice_id,
            exam_code: row.exam_code,
            result: row.result.map(|r| r.0),
            theory_started_at: row.theory_started_at,
            completed_at: row.completed_at,
        })
    }
}

/// Final exam with all of its partials.
#[derive(Debug, Clone, Serialize)]
pub struct FinalExamDetail {
    #[serde(flatten)]
    pub exam: FinalExam,
    pub partials: Vec<FinalExamPartial>,
}

#[derive(Debug, Deserialize)]
pub struct CreateFinalExamRequest {
    pub enrollment_id: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePartialRequest {
    pub kind: PartialKind,
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub weight: f64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[validate(range(min = 1, max = 1440))]
    pub duration_minutes: Option<i64>,
    pub quiz_id: Option<i64>,
    pub practice_id: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePartialRequest {
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub weight: Option<f64>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[validate(range(min = 1, max = 1440))]
    pub duration_minutes: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StartTheoryRequest {
    pub exam_code: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitTheoryRequest {
    /// Key: Question ID, Value: selected option IDs.
    pub answers: HashMap<i64, Vec<i64>>,
}

/// Quiz content released once the exam gate opens.
#[derive(Debug, Serialize)]
pub struct TheoryContent {
    pub partial_id: i64,
    pub quiz_id: i64,
    pub started_at: DateTime<Utc>,
    pub deadline: Option<DateTime<Utc>>,
    pub questions: Vec<PublicQuestion>,
}

/// A partial as stored after an authoring change, with the weight sum of
/// its exam at that point.
#[derive(Debug, Clone, Serialize)]
pub struct PartialChange {
    #[serde(flatten)]
    pub partial: FinalExamPartial,
    pub weight_sum: f64,
    pub weights_balanced: bool,
}

/// Graded Theory submission and the exam aggregate it produced.
#[derive(Debug, Serialize)]
pub struct TheoryOutcome {
    pub partial_id: i64,
    pub mark: f64,
    pub graded: GradedQuiz,
    pub exam: ExamAggregate,
}

#[derive(Debug, Serialize)]
pub struct IssuedCode {
    pub final_exam_id: i64,
    pub partial_id: i64,
    pub exam_code: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theory_mark_is_percentage() {
        assert_eq!(PartialResult::theory(8.0, 10.0).mark(), 80.0);
        assert_eq!(PartialResult::theory(0.0, 0.0).mark(), 100.0);
    }

    #[test]
    fn test_simulation_needs_every_task() {
        let passed = PartialResult::Simulation {
            tasks: vec![
                SimulationTask { name: "open valve".into(), passed: true },
                SimulationTask { name: "start pump".into(), passed: true },
            ],
        };
        let failed = PartialResult::Simulation {
            tasks: vec![
                SimulationTask { name: "open valve".into(), passed: true },
                SimulationTask { name: "start pump".into(), passed: false },
            ],
        };
        assert_eq!(passed.mark(), 100.0);
        assert_eq!(failed.mark(), 0.0);
        assert_eq!(PartialResult::Simulation { tasks: vec![] }.passed(), Some(false));
    }

    #[test]
    fn test_result_json_is_tagged() {
        let result: PartialResult = serde_json::from_value(serde_json::json!({
            "type": "practical",
            "checklist": [{"item": "PPE worn", "checked": true}]
        }))
        .unwrap();
        assert_eq!(result.kind(), PartialKind::Practical);
        assert_eq!(result.passed(), Some(true));
    }

    fn theory_partial(duration_minutes: Option<i64>) -> FinalExamPartial {
        FinalExamPartial {
            id: 1,
            final_exam_id: 1,
            kind: PartialKind::Theory,
            weight: 1.0,
            start_time: None,
            end_time: None,
            duration_minutes,
            quiz_id: Some(1),
            practice_id: None,
            exam_code: None,
            result: None,
            theory_started_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn test_deadline_adds_duration_to_start() {
        let started = Utc::now();
        let mut partial = theory_partial(Some(45));
        assert_eq!(partial.theory_deadline().unwrap(), None);

        partial.theory_started_at = Some(started);
        assert_eq!(partial.theory_deadline().unwrap(), Some(started + TimeDelta::minutes(45)));
        assert_eq!(theory_partial(None).deadline_from(started).unwrap(), None);
    }

    #[test]
    fn test_oversized_duration_is_a_config_error() {
        let partial = theory_partial(Some(10_000_000_000_000));
        assert!(matches!(partial.deadline_from(Utc::now()), Err(AppError::ConfigError(_))));
    }

    #[test]
    fn test_duration_is_bounded_to_a_day() {
        let req = UpdatePartialRequest {
            weight: None,
            start_time: None,
            end_time: None,
            duration_minutes: Some(1441),
        };
        assert!(req.validate().is_err());
    }
}
