// src/grading/checklist.rs

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::practice::{PracticeStep, StepAttempt};

/// Score written for a step or a whole practice attempt that passes.
pub const PASSING_SCORE: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistEvaluation {
    /// Every live step of the practice has a live step attempt.
    pub is_complete: bool,

    /// Every live step attempt passed.
    pub is_passing: bool,

    pub recorded_steps: usize,
    pub missing_step_ids: Vec<i64>,
    pub failed_step_ids: Vec<i64>,
}

impl ChecklistEvaluation {
    pub fn is_pass(&self) -> bool {
        self.is_complete && self.is_passing
    }

    pub fn score(&self) -> f64 {
        if self.is_pass() { PASSING_SCORE } else { 0.0 }
    }
}

/// Evaluates a practice attempt against the practice's steps.
///
/// Deleted steps and deleted step attempts are invisible to both predicates.
pub fn evaluate(steps: &[PracticeStep], step_attempts: &[StepAttempt]) -> ChecklistEvaluation {
    let required: BTreeSet<i64> = steps.iter().filter(|s| !s.is_deleted).map(|s| s.id).collect();

    let live: Vec<&StepAttempt> = step_attempts.iter().filter(|a| !a.is_deleted).collect();
    let recorded: BTreeSet<i64> = live.iter().map(|a| a.step_id).collect();

    let missing_step_ids: Vec<i64> = required.difference(&recorded).copied().collect();

    let failed: BTreeSet<i64> = live.iter().filter(|a| !a.is_pass).map(|a| a.step_id).collect();

    ChecklistEvaluation {
        is_complete: missing_step_ids.is_empty(),
        is_passing: failed.is_empty(),
        recorded_steps: recorded.len(),
        missing_step_ids,
        failed_step_ids: failed.into_iter().collect(),
    }
}
