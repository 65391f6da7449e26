// src/grading/quiz.rs

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::{
    config::{GradingPolicy, UnknownQuestionPolicy},
    error::AppError,
    grading::option::{OptionSelection, grade_question},
};

/// Slack for float division when comparing a ratio to the pass threshold.
const RATIO_EPSILON: f64 = 1e-9;

/// Answer key for one question, as loaded from the quiz.
#[derive(Debug, Clone)]
pub struct QuestionKey {
    pub id: i64,
    pub weight: f64,
    pub is_multiple_answers: bool,
    pub option_ids: BTreeSet<i64>,
    pub correct_option_ids: BTreeSet<i64>,
}

/// Read-only grading view of a quiz. Safe to share between concurrent gradings.
#[derive(Debug, Clone)]
pub struct QuizTemplate {
    pub quiz_id: i64,
    pub pass_threshold: f64,
    pub questions: Vec<QuestionKey>,
}

/// Per-question outcome stored with the attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question_id: i64,
    pub answered: bool,
    pub is_correct: bool,
    pub unsatisfiable: bool,
    pub weight: f64,
    pub awarded: f64,
    pub selections: Vec<OptionSelection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedQuiz {
    pub quiz_id: i64,
    pub total_score: f64,
    pub max_score: f64,
    pub is_pass: bool,
    pub breakdown: Vec<QuestionResult>,

    /// Submitted question ids that are not part of the quiz (ignored).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignored_question_ids: Vec<i64>,
}

/// `total / max >= threshold`. A quiz with nothing to score always passes.
pub fn is_passing(total_score: f64, max_score: f64, pass_threshold: f64) -> bool {
    if max_score <= 0.0 {
        return true;
    }
    total_score / max_score + RATIO_EPSILON >= pass_threshold
}

/// Grades a submission (question id -> selected option ids) against a quiz.
///
/// * Full weight for a correct question, zero otherwise.
/// * Unanswered questions count toward `max_score` only.
/// * Unknown question ids are ignored or rejected per `policy.unknown_questions`.
pub fn grade_quiz_submission(
    template: &QuizTemplate,
    answers: &HashMap<i64, Vec<i64>>,
    policy: &GradingPolicy,
) -> Result<GradedQuiz, AppError> {
    if answers.is_empty() {
        return Err(AppError::BadRequest("No answers submitted".to_string()));
    }

    let mut ignored_question_ids: Vec<i64> = answers
        .keys()
        .filter(|id| !template.questions.iter().any(|q| q.id == **id))
        .copied()
        .collect();
    ignored_question_ids.sort_unstable();

    if !ignored_question_ids.is_empty() && policy.unknown_questions == UnknownQuestionPolicy::Reject {
        return Err(AppError::BadRequest(format!(
            "Questions {:?} are not part of quiz {}",
            ignored_question_ids, template.quiz_id
        )));
    }

    let mut breakdown = Vec::with_capacity(template.questions.len());
    let mut total_score = 0.0;
    let mut max_score = 0.0;

    for question in &template.questions {
        max_score += question.weight;

        let Some(raw) = answers.get(&question.id) else {
            breakdown.push(QuestionResult {
                question_id: question.id,
                answered: false,
                is_correct: false,
                unsatisfiable: question.correct_option_ids.is_empty(),
                weight: question.weight,
                awarded: 0.0,
                selections: Vec::new(),
            });
            continue;
        };

        let selected: BTreeSet<i64> = raw.iter().copied().collect();

        if let Some(foreign) = selected.iter().find(|id| !question.option_ids.contains(id)) {
            return Err(AppError::BadRequest(format!(
                "Option {} does not belong to question {}",
                foreign, question.id
            )));
        }

        if !question.is_multiple_answers && selected.len() > 1 {
            return Err(AppError::BadRequest(format!(
                "Question {} accepts a single answer",
                question.id
            )));
        }

        let grade = grade_question(&question.correct_option_ids, &selected);
        if grade.unsatisfiable {
            tracing::warn!(
                "Question {} of quiz {} has no correct option; graded as wrong",
                question.id,
                template.quiz_id
            );
        }

        let awarded = if grade.is_correct { question.weight } else { 0.0 };
        total_score += awarded;

        breakdown.push(QuestionResult {
            question_id: question.id,
            answered: !selected.is_empty(),
            is_correct: grade.is_correct,
            unsatisfiable: grade.unsatisfiable,
            weight: question.weight,
            awarded,
            selections: grade.selections,
        });
    }

    Ok(GradedQuiz {
        quiz_id: template.quiz_id,
        total_score,
        max_score,
        is_pass: is_passing(total_score, max_score, template.pass_threshold),
        breakdown,
        ignored_question_ids,
    })
}
