// src/routes.rs

use axum::{
    Router,
    http::{Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{admin, final_exam, practice, quiz},
    state::AppState,
    utils::jwt::{require_admin, require_auth},
};

/// Assembles the main application router.
///
/// * Learner routes (quizzes, attempts, practice, final exams) require a valid token.
/// * Admin routes additionally require the admin role.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list([
            header::HeaderValue::from_static("http://localhost:3000"),
            header::HeaderValue::from_static("http://127.0.0.1:3000"),
        ]))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let quiz_routes = Router::new().route("/{id}/questions", get(quiz::get_questions));

    let attempt_routes = Router::new()
        .route("/{kind}/{target_id}", post(quiz::submit_attempt))
        .route("/{kind}/{target_id}/latest", get(quiz::latest_attempt))
        .route("/{kind}/{target_id}/history", get(quiz::attempt_history));

    let practice_routes = Router::new()
        .route("/{id}/steps", get(practice::list_steps))
        .route("/{id}/attempts", post(practice::start_attempt))
        .route("/attempts/{id}/steps", put(practice::record_step))
        .route("/attempts/{id}/evaluation", get(practice::evaluate_attempt))
        .route("/attempts/{id}/confirm", post(practice::confirm_attempt));

    let final_exam_routes = Router::new()
        .route("/{id}", get(final_exam::get_my_final_exam))
        .route("/partials/{id}/start", post(final_exam::start_theory))
        .route("/partials/{id}/submit", post(final_exam::submit_theory));

    let learner_routes = Router::new()
        .nest("/quizzes", quiz_routes)
        .nest("/attempts", attempt_routes)
        .nest("/practice", practice_routes)
        .nest("/final-exams", final_exam_routes)
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let admin_routes = Router::new()
        .route("/quizzes", post(admin::create_quiz))
        .route("/quizzes/{id}/questions", post(admin::create_question))
        .route("/enrollments", post(admin::create_enrollment))
        .route("/activities", post(admin::create_activity))
        .route("/section-quizzes", post(admin::create_section_quiz))
        .route("/practices", post(admin::create_practice))
        .route("/practices/{id}/steps", post(admin::add_step))
        .route("/steps/{id}", delete(admin::delete_step))
        .route("/final-exams", post(admin::create_final_exam))
        .route("/final-exams/{id}", get(admin::get_final_exam))
        .route("/final-exams/{id}/partials", post(admin::add_partial))
        .route("/final-exams/{id}/code", post(admin::issue_exam_code))
        .route("/final-exams/{id}/aggregate", post(admin::aggregate_final_exam))
        .route("/partials/{id}", put(admin::update_partial))
        .route("/partials/{id}/result", put(admin::record_partial_result))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .nest("/api", learner_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
