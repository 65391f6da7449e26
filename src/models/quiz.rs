// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub title: String,

    /// Upper bound for the sum of question weights.
    pub total_score: f64,

    /// Fraction of the max score (`0.0..=1.0`) needed to pass.
    pub pass_threshold: f64,
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub quiz_id: i64,

    /// The text content of the question.
    pub content: String,

    /// Score weight awarded when the question is answered correctly.
    pub score: f64,

    /// When false, at most one option may be marked correct.
    pub is_multiple_answers: bool,

    pub position: i64,
}

/// Represents the 'options' table in the database.
/// Named to stay clear of `std::option::Option`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: i64,
    pub question_id: i64,
    pub content: String,
    pub is_correct: bool,
    pub score: Option<f64>,
    pub position: i64,
}

/// DTO for sending question to client (excludes correctness).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub content: String,
    pub score: f64,
    pub is_multiple_answers: bool,
    pub options: Vec<PublicOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicOption {
    pub id: i64,
    pub content: String,
}

/// A question together with its options, as returned to authors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionDetail {
    #[serde(flatten)]
    pub question: Question,
    pub options: Vec<AnswerOption>,
}

/// DTO for creating a new quiz.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(range(min = 0.0))]
    pub total_score: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub pass_threshold: Option<f64>,
}

/// DTO for creating a question together with its options.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 1000))]
    pub content: String,
    #[validate(range(min = 0.0))]
    pub score: f64,
    #[serde(default)]
    pub is_multiple_answers: bool,
    #[validate(length(min = 1, max = 20), nested)]
    pub options: Vec<CreateOptionRequest>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateOptionRequest {
    #[validate(length(min = 1, max = 500))]
    pub content: String,
    #[serde(default)]
    pub is_correct: bool,
    #[validate(range(min = 0.0))]
    pub score: Option<f64>,
}
