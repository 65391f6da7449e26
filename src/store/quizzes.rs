// src/store/quizzes.rs

use std::collections::{BTreeSet, HashMap};

use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    config::DEFAULT_PASS_THRESHOLD,
    db::begin_write,
    error::AppError,
    grading::{
        option::check_question_config,
        quiz::{QuestionKey, QuizTemplate},
    },
    models::quiz::{
        AnswerOption, CreateQuestionRequest, CreateQuizRequest, PublicOption, PublicQuestion,
        Question, QuestionDetail, Quiz,
    },
};

/// Slack for comparing the running weight sum with a quiz's total score.
const SCORE_EPSILON: f64 = 1e-9;

pub async fn create_quiz(pool: &SqlitePool, req: &CreateQuizRequest) -> Result<Quiz, AppError> {
    req.validate()?;

    let pass_threshold = req.pass_threshold.unwrap_or(DEFAULT_PASS_THRESHOLD);

    let id = sqlx::query("INSERT INTO quizzes (title, total_score, pass_threshold) VALUES (?, ?, ?)")
        .bind(&req.title)
        .bind(req.total_score)
        .bind(pass_threshold)
        .execute(pool)
        .await?
        .last_insert_rowid();

    Ok(Quiz {
        id,
        title: req.title.clone(),
        total_score: req.total_score,
        pass_threshold,
    })
}

pub async fn get_quiz(pool: &SqlitePool, quiz_id: i64) -> Result<Quiz, AppError> {
    sqlx::query_as::<_, Quiz>("SELECT id, title, total_score, pass_threshold FROM quizzes WHERE id = ?")
        .bind(quiz_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Quiz {} not found", quiz_id)))
}

/// Adds a question and its options to a quiz.
///
/// Configuration errors are caught here so grading can trust the data:
/// the quiz's question weights may not exceed its total score, every question
/// needs a correct option, and single-answer questions get at most one.
pub async fn create_question(
    pool: &SqlitePool,
    quiz_id: i64,
    req: &CreateQuestionRequest,
) -> Result<QuestionDetail, AppError> {
    req.validate()?;

    let correct_flags: Vec<bool> = req.options.iter().map(|o| o.is_correct).collect();
    check_question_config(req.is_multiple_answers, &correct_flags)?;

    let mut tx = begin_write(pool).await?;

    let total_score: f64 = sqlx::query_scalar("SELECT total_score FROM quizzes WHERE id = ?")
        .bind(quiz_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Quiz {} not found", quiz_id)))?;

    let (used, count): (f64, i64) =
        sqlx::query_as("SELECT COALESCE(SUM(score), 0.0), COUNT(*) FROM questions WHERE quiz_id = ?")
            .bind(quiz_id)
            .fetch_one(&mut *tx)
            .await?;

    if used + req.score > total_score + SCORE_EPSILON {
        return Err(AppError::ConfigError(format!(
            "Question weights would reach {} but quiz {} allows {}",
            used + req.score,
            quiz_id,
            total_score
        )));
    }

    let position = count + 1;
    let question_id = sqlx::query(
        "INSERT INTO questions (quiz_id, content, score, is_multiple_answers, position) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(quiz_id)
    .bind(&req.content)
    .bind(req.score)
    .bind(req.is_multiple_answers)
    .bind(position)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    let mut options = Vec::with_capacity(req.options.len());
    for (idx, opt) in req.options.iter().enumerate() {
        let option_position = idx as i64 + 1;
        let option_id = sqlx::query(
            "INSERT INTO options (question_id, content, is_correct, score, position) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(question_id)
        .bind(&opt.content)
        .bind(opt.is_correct)
        .bind(opt.score)
        .bind(option_position)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        options.push(AnswerOption {
            id: option_id,
            question_id,
            content: opt.content.clone(),
            is_correct: opt.is_correct,
            score: opt.score,
            position: option_position,
        });
    }

    tx.commit().await?;

    tracing::info!("Question {} added to quiz {}", question_id, quiz_id);

    Ok(QuestionDetail {
        question: Question {
            id: question_id,
            quiz_id,
            content: req.content.clone(),
            score: req.score,
            is_multiple_answers: req.is_multiple_answers,
            position,
        },
        options,
    })
}

async fn fetch_questions(pool: &SqlitePool, quiz_id: i64) -> Result<(Vec<Question>, HashMap<i64, Vec<AnswerOption>>), AppError> {
    let questions = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, quiz_id, content, score, is_multiple_answers, position
        FROM questions
        WHERE quiz_id = ?
        ORDER BY position, id
        "#,
    )
    .bind(quiz_id)
    .fetch_all(pool)
    .await?;

    let options = sqlx::query_as::<_, AnswerOption>(
        r#"
        SELECT o.id, o.question_id, o.content, o.is_correct, o.score, o.position
        FROM options o
        JOIN questions q ON q.id = o.question_id
        WHERE q.quiz_id = ?
        ORDER BY o.position, o.id
        "#,
    )
    .bind(quiz_id)
    .fetch_all(pool)
    .await?;

    let mut by_question: HashMap<i64, Vec<AnswerOption>> = HashMap::new();
    for option in options {
        by_question.entry(option.question_id).or_default().push(option);
    }

    Ok((questions, by_question))
}

/// Loads the read-only answer key used for grading.
pub async fn load_quiz_template(pool: &SqlitePool, quiz_id: i64) -> Result<QuizTemplate, AppError> {
    let quiz = get_quiz(pool, quiz_id).await?;
    let (questions, options) = fetch_questions(pool, quiz_id).await?;

    let questions = questions
        .into_iter()
        .map(|q| {
            let opts = options.get(&q.id).map(Vec::as_slice).unwrap_or_default();
            QuestionKey {
                id: q.id,
                weight: q.score,
                is_multiple_answers: q.is_multiple_answers,
                option_ids: opts.iter().map(|o| o.id).collect(),
                correct_option_ids: opts
                    .iter()
                    .filter(|o| o.is_correct)
                    .map(|o| o.id)
                    .collect::<BTreeSet<i64>>(),
            }
        })
        .collect();

    Ok(QuizTemplate {
        quiz_id: quiz.id,
        pass_threshold: quiz.pass_threshold,
        questions,
    })
}

/// Questions and options with correctness stripped, for learners.
pub async fn public_questions(pool: &SqlitePool, quiz_id: i64) -> Result<Vec<PublicQuestion>, AppError> {
    get_quiz(pool, quiz_id).await?;
    let (questions, mut options) = fetch_questions(pool, quiz_id).await?;

    Ok(questions
        .into_iter()
        .map(|q| PublicQuestion {
            id: q.id,
            content: q.content,
            score: q.score,
            is_multiple_answers: q.is_multiple_answers,
            options: options
                .remove(&q.id)
                .unwrap_or_default()
                .into_iter()
                .map(|o| PublicOption {
                    id: o.id,
                    content: o.content,
                })
                .collect(),
        })
        .collect())
}
