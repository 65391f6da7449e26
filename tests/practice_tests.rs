// tests/practice_tests.rs

use assessment_backend::{
    db,
    error::AppError,
    models::practice::{CreatePracticeRequest, CreateStepRequest, PracticeStep},
    store::practice,
};
use chrono::Utc;
use sqlx::SqlitePool;

const LEARNER: i64 = 11;

async fn seed_practice(pool: &SqlitePool, steps: usize) -> (i64, Vec<PracticeStep>) {
    let created = practice::create_practice(
        pool,
        &CreatePracticeRequest {
            title: "Pump start-up".to_string(),
        },
    )
    .await
    .expect("Failed to create practice");

    let mut added = Vec::new();
    for i in 0..steps as i64 {
        let step = practice::add_step(
            pool,
            created.id,
            &CreateStepRequest {
                expected_result: format!("Valve {} open", i + 1),
                action_id: 100 + i,
                component_id: 200 + i,
            },
        )
        .await
        .expect("Failed to add step");
        added.push(step);
    }
    (created.id, added)
}

#[tokio::test]
async fn all_steps_passed_confirms_as_pass() {
    let pool = db::connect_in_memory().await.unwrap();
    let (practice_id, steps) = seed_practice(&pool, 3).await;
    let attempt = practice::start_attempt(&pool, practice_id, LEARNER, Utc::now()).await.unwrap();
    assert!(attempt.is_pass.is_none());

    for step in &steps {
        practice::record_step_result(&pool, attempt.id, LEARNER, step.id, true, Utc::now())
            .await
            .unwrap();
    }

    let confirmed = practice::confirm_practice_attempt(&pool, attempt.id, LEARNER, Utc::now())
        .await
        .unwrap();
    assert!(confirmed.evaluation.is_complete);
    assert!(confirmed.evaluation.is_passing);
    assert_eq!(confirmed.attempt.is_pass, Some(true));
    assert_eq!(confirmed.attempt.score, Some(100.0));
    assert!(confirmed.attempt.confirmed_at.is_some());
}

#[tokio::test]
async fn missing_step_fails_even_when_recorded_steps_pass() {
    let pool = db::connect_in_memory().await.unwrap();
    let (practice_id, steps) = seed_practice(&pool, 3).await;
    let attempt = practice::start_attempt(&pool, practice_id, LEARNER, Utc::now()).await.unwrap();

    for step in &steps[..2] {
        practice::record_step_result(&pool, attempt.id, LEARNER, step.id, true, Utc::now())
            .await
            .unwrap();
    }

    let evaluation = practice::evaluate_practice_attempt(&pool, attempt.id, LEARNER).await.unwrap();
    assert!(!evaluation.is_complete);
    assert!(evaluation.is_passing);
    assert_eq!(evaluation.missing_step_ids, vec![steps[2].id]);

    let confirmed = practice::confirm_practice_attempt(&pool, attempt.id, LEARNER, Utc::now())
        .await
        .unwrap();
    assert_eq!(confirmed.attempt.is_pass, Some(false));
    assert_eq!(confirmed.attempt.score, Some(0.0));
}

#[tokio::test]
async fn failed_step_fails_the_attempt() {
    let pool = db::connect_in_memory().await.unwrap();
    let (practice_id, steps) = seed_practice(&pool, 2).await;
    let attempt = practice::start_attempt(&pool, practice_id, LEARNER, Utc::now()).await.unwrap();

    practice::record_step_result(&pool, attempt.id, LEARNER, steps[0].id, true, Utc::now())
        .await
        .unwrap();
    practice::record_step_result(&pool, attempt.id, LEARNER, steps[1].id, false, Utc::now())
        .await
        .unwrap();

    let confirmed = practice::confirm_practice_attempt(&pool, attempt.id, LEARNER, Utc::now())
        .await
        .unwrap();
    assert!(confirmed.evaluation.is_complete);
    assert!(!confirmed.evaluation.is_passing);
    assert_eq!(confirmed.evaluation.failed_step_ids, vec![steps[1].id]);
    assert_eq!(confirmed.attempt.is_pass, Some(false));
}

#[tokio::test]
async fn rerecording_a_step_overwrites_its_result() {
    let pool = db::connect_in_memory().await.unwrap();
    let (practice_id, steps) = seed_practice(&pool, 1).await;
    let attempt = practice::start_attempt(&pool, practice_id, LEARNER, Utc::now()).await.unwrap();

    let first = practice::record_step_result(&pool, attempt.id, LEARNER, steps[0].id, false, Utc::now())
        .await
        .unwrap();
    let second = practice::record_step_result(&pool, attempt.id, LEARNER, steps[0].id, true, Utc::now())
        .await
        .unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.score, 100.0);

    let evaluation = practice::evaluate_practice_attempt(&pool, attempt.id, LEARNER).await.unwrap();
    assert_eq!(evaluation.recorded_steps, 1);
    assert!(evaluation.is_pass());
}

#[tokio::test]
async fn deleted_steps_are_not_required() {
    let pool = db::connect_in_memory().await.unwrap();
    let (practice_id, steps) = seed_practice(&pool, 3).await;
    let attempt = practice::start_attempt(&pool, practice_id, LEARNER, Utc::now()).await.unwrap();

    for step in &steps[..2] {
        practice::record_step_result(&pool, attempt.id, LEARNER, step.id, true, Utc::now())
            .await
            .unwrap();
    }
    practice::delete_step(&pool, steps[2].id).await.unwrap();

    let live = practice::list_steps(&pool, practice_id).await.unwrap();
    assert_eq!(live.len(), 2);

    let evaluation = practice::evaluate_practice_attempt(&pool, attempt.id, LEARNER).await.unwrap();
    assert!(evaluation.is_pass());

    // Deleting twice reports the step as gone.
    let result = practice::delete_step(&pool, steps[2].id).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn confirming_without_any_step_is_rejected() {
    let pool = db::connect_in_memory().await.unwrap();
    let (practice_id, _) = seed_practice(&pool, 2).await;
    let attempt = practice::start_attempt(&pool, practice_id, LEARNER, Utc::now()).await.unwrap();

    let result = practice::confirm_practice_attempt(&pool, attempt.id, LEARNER, Utc::now()).await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    let stored = practice::get_attempt(&pool, attempt.id, LEARNER).await.unwrap();
    assert!(stored.is_pass.is_none());
}

#[tokio::test]
async fn steps_from_another_practice_are_rejected() {
    let pool = db::connect_in_memory().await.unwrap();
    let (practice_id, _) = seed_practice(&pool, 1).await;
    let (_, other_steps) = seed_practice(&pool, 1).await;
    let attempt = practice::start_attempt(&pool, practice_id, LEARNER, Utc::now()).await.unwrap();

    let result =
        practice::record_step_result(&pool, attempt.id, LEARNER, other_steps[0].id, true, Utc::now()).await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn attempts_are_private_to_their_learner() {
    let pool = db::connect_in_memory().await.unwrap();
    let (practice_id, steps) = seed_practice(&pool, 1).await;
    let attempt = practice::start_attempt(&pool, practice_id, LEARNER, Utc::now()).await.unwrap();

    let result = practice::record_step_result(&pool, attempt.id, LEARNER + 1, steps[0].id, true, Utc::now()).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    let result = practice::evaluate_practice_attempt(&pool, attempt.id, LEARNER + 1).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn concurrent_step_recording_keeps_every_result() {
    let path = std::env::temp_dir().join(format!(
        "practice_{}_{}.db",
        std::process::id(),
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));
    let url = format!("sqlite://{}?mode=rwc", path.display());
    let pool = db::connect(&url, 4).await.unwrap();
    db::migrate(&pool).await.unwrap();

    let (practice_id, steps) = seed_practice(&pool, 8).await;
    let attempt = practice::start_attempt(&pool, practice_id, LEARNER, Utc::now()).await.unwrap();

    let attempt_id = attempt.id;
    let mut handles = Vec::new();
    for step in &steps {
        let pool = pool.clone();
        let step_id = step.id;
        handles.push(tokio::spawn(async move {
            practice::record_step_result(&pool, attempt_id, LEARNER, step_id, true, Utc::now()).await
        }));
    }
    for handle in handles {
        if let Err(e) = handle.await.unwrap() {
            panic!("recording failed under contention: {:?}", e);
        }
    }

    let confirmed = practice::confirm_practice_attempt(&pool, attempt.id, LEARNER, Utc::now())
        .await
        .unwrap();
    assert_eq!(confirmed.evaluation.recorded_steps, 8);
    assert_eq!(confirmed.attempt.is_pass, Some(true));

    pool.close().await;
    let _ = std::fs::remove_file(&path);
}
