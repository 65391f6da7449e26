// src/grading/aggregate.rs

use serde::{Deserialize, Serialize};

use crate::{
    config::GradingPolicy,
    error::AppError,
    models::final_exam::{FinalExamPartial, FinalExamStatus, PartialKind, PartialResult},
};

/// What one graded partial adds to the final mark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub partial_id: i64,
    pub kind: PartialKind,
    pub weight: f64,
    pub mark: f64,
    pub weighted: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamAggregate {
    pub final_mark: f64,
    pub final_pass: bool,
    pub status: FinalExamStatus,
    pub weight_sum: f64,

    /// False when the partial weights do not sum to 1 within epsilon.
    pub weights_balanced: bool,

    pub contributions: Vec<Contribution>,
    pub pending_partial_ids: Vec<i64>,
}

/// Weighted contribution of one partial result.
///
/// | type       | contribution                   |
/// |------------|--------------------------------|
/// | Theory     | weight * mark                  |
/// | Simulation | weight * (100 if pass else 0)  |
/// | Practical  | weight * (100 if pass else 0)  |
fn contribution(partial_id: i64, weight: f64, result: &PartialResult) -> Contribution {
    let mark = result.mark();
    Contribution {
        partial_id,
        kind: result.kind(),
        weight,
        mark,
        weighted: weight * mark,
    }
}

/// Combines graded partials into a final mark and verdict.
///
/// Pure and deterministic: the same partials always give the same aggregate.
/// Ungraded partials contribute nothing and keep the exam from completing.
/// A weight sum away from 1 is reported, never rescaled.
pub fn aggregate_final_exam(partials: &[FinalExamPartial], policy: &GradingPolicy) -> ExamAggregate {
    let mut contributions = Vec::new();
    let mut pending_partial_ids = Vec::new();

    for partial in partials {
        match &partial.result {
            Some(result) => contributions.push(contribution(partial.id, partial.weight, result)),
            None => pending_partial_ids.push(partial.id),
        }
    }

    let weight_sum: f64 = partials.iter().map(|p| p.weight).sum();
    let weights_balanced = weights_balanced(weight_sum, policy.weight_epsilon);
    let final_mark: f64 = contributions.iter().map(|c| c.weighted).sum();

    let status = if partials.is_empty() || contributions.is_empty() {
        FinalExamStatus::Pending
    } else if pending_partial_ids.is_empty() {
        FinalExamStatus::Completed
    } else {
        FinalExamStatus::InProgress
    };

    let final_pass = status == FinalExamStatus::Completed
        && final_mark + policy.weight_epsilon >= policy.final_pass_mark;

    ExamAggregate {
        final_mark,
        final_pass,
        status,
        weight_sum,
        weights_balanced,
        contributions,
        pending_partial_ids,
    }
}

/// True when a partial weight sum equals 1 within `epsilon`.
pub fn weights_balanced(weight_sum: f64, epsilon: f64) -> bool {
    (weight_sum - 1.0).abs() <= epsilon
}

/// Authoring-time weight check: the running sum may stay below 1 while
/// partials are still being added, but may never exceed it.
pub fn check_weight_budget(existing: &[f64], candidate: f64, epsilon: f64) -> Result<(), AppError> {
    if !(candidate > 0.0 && candidate <= 1.0 + epsilon) {
        return Err(AppError::ConfigError(format!(
            "Partial weight {} must be in (0, 1]",
            candidate
        )));
    }

    let sum: f64 = existing.iter().sum::<f64>() + candidate;
    if sum > 1.0 + epsilon {
        return Err(AppError::ConfigError(format!(
            "Partial weights would sum to {:.4}, above 1",
            sum
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::final_exam::{ChecklistItem, SimulationTask};

    fn partial(id: i64, kind: PartialKind, weight: f64, result: Option<PartialResult>) -> FinalExamPartial {
        FinalExamPartial {
            id,
            final_exam_id: 1,
            kind,
            weight,
            start_time: None,
            end_time: None,
            duration_minutes: None,
            quiz_id: None,
            practice_id: None,
            exam_code: None,
            result,
            theory_started_at: None,
            completed_at: None,
        }
    }

    fn theory(mark: f64) -> PartialResult {
        PartialResult::Theory {
            total_score: mark,
            max_score: 100.0,
            mark,
        }
    }

    fn simulation(passed: bool) -> PartialResult {
        PartialResult::Simulation {
            tasks: vec![SimulationTask { name: "isolate line".into(), passed }],
        }
    }

    fn practical(checked: bool) -> PartialResult {
        PartialResult::Practical {
            checklist: vec![ChecklistItem { item: "lockout applied".into(), checked }],
        }
    }

    fn three_part_exam() -> Vec<FinalExamPartial> {
        vec![
            partial(1, PartialKind::Theory, 0.4, Some(theory(80.0))),
            partial(2, PartialKind::Simulation, 0.3, Some(simulation(true))),
            partial(3, PartialKind::Practical, 0.3, Some(practical(false))),
        ]
    }

    #[test]
    fn test_weighted_mark() {
        let agg = aggregate_final_exam(&three_part_exam(), &GradingPolicy::default());

        assert!((agg.final_mark - 62.0).abs() < 1e-9);
        assert_eq!(agg.status, FinalExamStatus::Completed);
        assert!(agg.weights_balanced);
        assert!(agg.final_pass);
        assert_eq!(agg.contributions.len(), 3);
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let partials = three_part_exam();
        let policy = GradingPolicy::default();
        assert_eq!(
            aggregate_final_exam(&partials, &policy),
            aggregate_final_exam(&partials, &policy)
        );
    }

    #[test]
    fn test_below_pass_mark_fails() {
        let policy = GradingPolicy {
            final_pass_mark: 70.0,
            ..GradingPolicy::default()
        };
        let agg = aggregate_final_exam(&three_part_exam(), &policy);
        assert!(!agg.final_pass);
    }

    #[test]
    fn test_ungraded_partial_keeps_exam_in_progress() {
        let partials = vec![
            partial(1, PartialKind::Theory, 0.5, Some(theory(100.0))),
            partial(2, PartialKind::Practical, 0.5, None),
        ];
        let agg = aggregate_final_exam(&partials, &GradingPolicy::default());

        assert_eq!(agg.status, FinalExamStatus::InProgress);
        assert_eq!(agg.final_mark, 50.0);
        assert!(!agg.final_pass);
        assert_eq!(agg.pending_partial_ids, vec![2]);
    }

    #[test]
    fn test_no_partials_is_pending() {
        let agg = aggregate_final_exam(&[], &GradingPolicy::default());
        assert_eq!(agg.status, FinalExamStatus::Pending);
        assert!(!agg.final_pass);
        assert!(!agg.weights_balanced);
    }

    #[test]
    fn test_unbalanced_weights_are_surfaced_not_fixed() {
        let partials = vec![
            partial(1, PartialKind::Theory, 0.5, Some(theory(100.0))),
            partial(2, PartialKind::Simulation, 0.3, Some(simulation(true))),
        ];
        let agg = aggregate_final_exam(&partials, &GradingPolicy::default());

        assert!(!agg.weights_balanced);
        assert!((agg.weight_sum - 0.8).abs() < 1e-9);
        assert!((agg.final_mark - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_weight_budget() {
        assert!(check_weight_budget(&[0.4, 0.3], 0.3, 1e-6).is_ok());
        assert!(check_weight_budget(&[], 0.4, 1e-6).is_ok());
        assert!(matches!(
            check_weight_budget(&[0.4, 0.3], 0.4, 1e-6),
            Err(AppError::ConfigError(_))
        ));
        assert!(matches!(
            check_weight_budget(&[], 0.0, 1e-6),
            Err(AppError::ConfigError(_))
        ));
    }

    #[test]
    fn test_weights_balanced_tolerates_float_noise() {
        assert!(weights_balanced(0.1 + 0.2 + 0.7, 1e-6));
        assert!(!weights_balanced(0.9, 1e-6));
        assert!(!weights_balanced(1.1, 1e-6));
    }
}
