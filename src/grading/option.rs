// src/grading/option.rs

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Whether one selected option was among the correct ones.
/// Review display only, never part of the pass decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSelection {
    pub option_id: i64,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionGrade {
    pub is_correct: bool,

    /// The question has no correct option, so nothing can satisfy it.
    pub unsatisfiable: bool,

    pub selections: Vec<OptionSelection>,
}

/// Grades one question by strict set equality of `selected` against `correct`.
///
/// Subsets and supersets are both wrong. An empty `correct` set makes the
/// question unsatisfiable: even an empty selection is not correct.
pub fn grade_question(correct: &BTreeSet<i64>, selected: &BTreeSet<i64>) -> OptionGrade {
    let selections = selected
        .iter()
        .map(|id| OptionSelection {
            option_id: *id,
            is_correct: correct.contains(id),
        })
        .collect();

    if correct.is_empty() {
        return OptionGrade {
            is_correct: false,
            unsatisfiable: true,
            selections,
        };
    }

    OptionGrade {
        is_correct: selected == correct,
        unsatisfiable: false,
        selections,
    }
}

/// Authoring-time check for a question's option flags.
///
/// Rejects option-less questions, questions with no correct option and
/// single-answer questions with more than one correct option.
pub fn check_question_config(is_multiple_answers: bool, correct_flags: &[bool]) -> Result<(), AppError> {
    if correct_flags.is_empty() {
        return Err(AppError::ConfigError("Question has no options".to_string()));
    }

    let correct_count = correct_flags.iter().filter(|c| **c).count();

    if correct_count == 0 {
        return Err(AppError::ConfigError(
            "Question has no correct option".to_string(),
        ));
    }

    if !is_multiple_answers && correct_count > 1 {
        return Err(AppError::ConfigError(format!(
            "Single-answer question has {} correct options",
            correct_count
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[i64]) -> BTreeSet<i64> {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_exact_match_is_correct() {
        let grade = grade_question(&set(&[3, 4]), &set(&[4, 3]));
        assert!(grade.is_correct);
        assert!(!grade.unsatisfiable);
    }

    #[test]
    fn test_subset_is_wrong() {
        let grade = grade_question(&set(&[3, 4]), &set(&[3]));
        assert!(!grade.is_correct);
        assert_eq!(
            grade.selections,
            vec![OptionSelection { option_id: 3, is_correct: true }]
        );
    }

    #[test]
    fn test_superset_is_wrong() {
        let grade = grade_question(&set(&[3, 4]), &set(&[3, 4, 5]));
        assert!(!grade.is_correct);
        let wrong: Vec<i64> = grade
            .selections
            .iter()
            .filter(|s| !s.is_correct)
            .map(|s| s.option_id)
            .collect();
        assert_eq!(wrong, vec![5]);
    }

    #[test]
    fn test_disjoint_is_wrong() {
        let grade = grade_question(&set(&[1]), &set(&[2]));
        assert!(!grade.is_correct);
        assert!(grade.selections.iter().all(|s| !s.is_correct));
    }

    #[test]
    fn test_empty_correct_set_is_unsatisfiable() {
        let grade = grade_question(&set(&[]), &set(&[]));
        assert!(!grade.is_correct);
        assert!(grade.unsatisfiable);

        let grade = grade_question(&set(&[]), &set(&[9]));
        assert!(!grade.is_correct);
        assert!(grade.unsatisfiable);
    }

    #[test]
    fn test_empty_selection_against_nonempty_correct_is_wrong() {
        let grade = grade_question(&set(&[1]), &set(&[]));
        assert!(!grade.is_correct);
        assert!(grade.selections.is_empty());
    }

    #[test]
    fn test_single_answer_allows_at_most_one_correct() {
        assert!(check_question_config(false, &[true, false, false]).is_ok());
        assert!(matches!(
            check_question_config(false, &[true, true, false]),
            Err(AppError::ConfigError(_))
        ));
        assert!(check_question_config(true, &[true, true, false]).is_ok());
    }

    #[test]
    fn test_question_needs_a_correct_option() {
        assert!(matches!(
            check_question_config(true, &[false, false]),
            Err(AppError::ConfigError(_))
        ));
        assert!(matches!(
            check_question_config(false, &[]),
            Err(AppError::ConfigError(_))
        ));
    }
}
