// tests/api_tests.rs

use std::collections::HashMap;

use assessment_backend::{
    config::{Config, GradingPolicy},
    db, routes,
    state::AppState,
    utils::jwt::{Role, sign_token},
};
use serde_json::{Value, json};

const TEST_SECRET: &str = "test_secret_for_integration_tests";
const ADMIN_ID: i64 = 1;
const LEARNER_ID: i64 = 42;

struct TestApp {
    address: String,
    client: reqwest::Client,
    admin_token: String,
    learner_token: String,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    async fn admin_post(&self, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(&self.admin_token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }
}

/// Helper function to spawn the app on a random port for testing.
/// Every app gets its own in-memory database.
async fn spawn_app() -> TestApp {
    // 1. Create a pool with the schema applied
    let pool = db::connect_in_memory()
        .await
        .expect("Failed to create in-memory database");

    // 2. Create test configuration and state
    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: TEST_SECRET.to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        listen_addr: "127.0.0.1:0".to_string(),
        grading: GradingPolicy::default(),
    };

    let state = AppState { pool, config };

    // 3. Create the router with the app state
    let app = routes::create_router(state);

    // 4. Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // 5. Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        client: reqwest::Client::new(),
        admin_token: sign_token(ADMIN_ID, Role::Admin, TEST_SECRET, 600).unwrap(),
        learner_token: sign_token(LEARNER_ID, Role::Learner, TEST_SECRET, 600).unwrap(),
    }
}

/// Creates a 10-point quiz with one single-answer question and a section quiz for it.
/// Returns (quiz id, section quiz id, question json).
async fn seed_section_quiz(app: &TestApp) -> (i64, i64, Value) {
    let quiz: Value = app
        .admin_post(
            "/api/admin/quizzes",
            json!({ "title": "Signals", "total_score": 10.0, "pass_threshold": 0.6 }),
        )
        .await
        .json()
        .await
        .unwrap();
    let quiz_id = quiz["id"].as_i64().unwrap();

    let question_resp = app
        .admin_post(
            &format!("/api/admin/quizzes/{}/questions", quiz_id),
            json!({
                "content": "Red light means?",
                "score": 10.0,
                "options": [
                    { "content": "Stop", "is_correct": true },
                    { "content": "Go" }
                ]
            }),
        )
        .await;
    assert_eq!(question_resp.status().as_u16(), 201);
    let question: Value = question_resp.json().await.unwrap();

    let section: Value = app
        .admin_post("/api/admin/section-quizzes", json!({ "quiz_id": quiz_id }))
        .await
        .json()
        .await
        .unwrap();

    (quiz_id, section["id"].as_i64().unwrap(), question)
}

#[tokio::test]
async fn health_check_404() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let response = app
        .client
        .get(app.url("/random_path_that_does_not_exist"))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn requests_without_token_are_unauthorized() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/api/attempts/section_quiz/1/history"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn learners_cannot_use_admin_routes() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(app.url("/api/admin/quizzes"))
        .bearer_auth(&app.learner_token)
        .json(&json!({ "title": "Sneaky", "total_score": 1.0 }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn quiz_creation_fails_validation() {
    let app = spawn_app().await;

    // Act: Send an empty title
    let response = app
        .admin_post("/api/admin/quizzes", json!({ "title": "", "total_score": 10.0 }))
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn misconfigured_question_is_unprocessable() {
    let app = spawn_app().await;
    let (quiz_id, _, _) = seed_section_quiz(&app).await;

    let response = app
        .admin_post(
            &format!("/api/admin/quizzes/{}/questions", quiz_id),
            json!({
                "content": "Nothing is right",
                "score": 0.0,
                "options": [{ "content": "A" }, { "content": "B" }]
            }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 422);
}

#[tokio::test]
async fn section_quiz_attempt_flow() {
    // Arrange
    let app = spawn_app().await;
    let (quiz_id, section_id, question) = seed_section_quiz(&app).await;

    // 1. Learner fetches questions without the answer key
    let questions: Vec<Value> = app
        .client
        .get(app.url(&format!("/api/quizzes/{}/questions", quiz_id)))
        .bearer_auth(&app.learner_token)
        .send()
        .await
        .expect("Fetch questions failed")
        .json()
        .await
        .unwrap();
    assert_eq!(questions.len(), 1);
    assert!(questions[0]["options"][0].get("is_correct").is_none());

    let question_id = question["id"].as_i64().unwrap();
    let options = question["options"].as_array().unwrap();
    let correct = options.iter().find(|o| o["is_correct"] == true).unwrap()["id"].as_i64().unwrap();
    let wrong = options.iter().find(|o| o["is_correct"] == false).unwrap()["id"].as_i64().unwrap();

    let submit_path = format!("/api/attempts/section_quiz/{}", section_id);

    // 2. Fail first
    let first = app
        .client
        .post(app.url(&submit_path))
        .bearer_auth(&app.learner_token)
        .json(&json!({ "answers": HashMap::from([(question_id, vec![wrong])]) }))
        .send()
        .await
        .expect("Submit failed");
    assert_eq!(first.status().as_u16(), 201);
    let first: Value = first.json().await.unwrap();
    assert_eq!(first["is_pass"], false);
    assert_eq!(first["attempt_order"], 1);

    // 3. Pass on retry
    let second: Value = app
        .client
        .post(app.url(&submit_path))
        .bearer_auth(&app.learner_token)
        .json(&json!({ "answers": HashMap::from([(question_id, vec![correct])]) }))
        .send()
        .await
        .expect("Submit failed")
        .json()
        .await
        .unwrap();
    assert_eq!(second["is_pass"], true);
    assert_eq!(second["total_score"], 10.0);
    assert_eq!(second["attempt_order"], 2);

    // 4. Latest is the retry
    let latest: Value = app
        .client
        .get(app.url(&format!("{}/latest", submit_path)))
        .bearer_auth(&app.learner_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(latest["id"], second["id"]);
    assert_eq!(latest["is_current"], true);

    // 5. History keeps both, newest first, one current
    let history: Vec<Value> = app
        .client
        .get(app.url(&format!("{}/history", submit_path)))
        .bearer_auth(&app.learner_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["attempt_order"], 2);
    assert_eq!(history.iter().filter(|a| a["is_current"] == true).count(), 1);
}

#[tokio::test]
async fn unknown_target_kind_is_bad_request() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(app.url("/api/attempts/homework/1"))
        .bearer_auth(&app.learner_token)
        .json(&json!({ "answers": { "1": [1] } }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn theory_denials_look_identical() {
    let app = spawn_app().await;
    let (quiz_id, _, _) = seed_section_quiz(&app).await;

    let enrollment: Value = app
        .admin_post("/api/admin/enrollments", json!({ "learner_id": LEARNER_ID, "class_id": 1 }))
        .await
        .json()
        .await
        .unwrap();
    let exam: Value = app
        .admin_post(
            "/api/admin/final-exams",
            json!({ "enrollment_id": enrollment["id"] }),
        )
        .await
        .json()
        .await
        .unwrap();
    let exam_id = exam["id"].as_i64().unwrap();

    let partial: Value = app
        .admin_post(
            &format!("/api/admin/final-exams/{}/partials", exam_id),
            json!({ "kind": "theory", "weight": 1.0, "quiz_id": quiz_id, "duration_minutes": 20 }),
        )
        .await
        .json()
        .await
        .unwrap();
    let partial_id = partial["id"].as_i64().unwrap();
    assert!(partial.get("exam_code").is_none());

    let issued = app
        .admin_post(&format!("/api/admin/final-exams/{}/code", exam_id), json!({}))
        .await;
    assert_eq!(issued.status().as_u16(), 201);
    let issued: Value = issued.json().await.unwrap();
    let code = issued["exam_code"].as_str().unwrap().to_string();

    let start_path = format!("/api/final-exams/partials/{}/start", partial_id);

    // Wrong code as the owner
    let wrong_code = app
        .client
        .post(app.url(&start_path))
        .bearer_auth(&app.learner_token)
        .json(&json!({ "exam_code": "0000000" }))
        .send()
        .await
        .unwrap();

    // Right code as someone else
    let intruder_token = sign_token(LEARNER_ID + 1, Role::Learner, TEST_SECRET, 600).unwrap();
    let wrong_owner = app
        .client
        .post(app.url(&start_path))
        .bearer_auth(&intruder_token)
        .json(&json!({ "exam_code": code }))
        .send()
        .await
        .unwrap();

    assert_eq!(wrong_code.status().as_u16(), 403);
    assert_eq!(wrong_owner.status().as_u16(), 403);
    let wrong_code_body: Value = wrong_code.json().await.unwrap();
    let wrong_owner_body: Value = wrong_owner.json().await.unwrap();
    assert_eq!(wrong_code_body, wrong_owner_body);

    // Owner with the right code gets the questions
    let opened = app
        .client
        .post(app.url(&start_path))
        .bearer_auth(&app.learner_token)
        .json(&json!({ "exam_code": code }))
        .send()
        .await
        .unwrap();
    assert_eq!(opened.status().as_u16(), 200);
    let content: Value = opened.json().await.unwrap();
    assert_eq!(content["questions"].as_array().unwrap().len(), 1);
    assert!(content["deadline"].is_string());
}
