pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};

use crate::auth::handlers as auth_handlers;
use crate::auth::middleware::require_auth;
use crate::cv::handlers as cv_handlers;
use crate::interview::handlers as interview_handlers;
use crate::quiz::handlers as quiz_handlers;
use crate::report;
use crate::state::AppState;

/// Uploaded PDFs and audio clips; anything larger is rejected outright.
const UPLOAD_BODY_LIMIT: usize = 16 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    // Token issuance and registration are reachable without credentials.
    let public = Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/token/", post(auth_handlers::handle_login))
        .route("/api/token/refresh/", post(auth_handlers::handle_refresh))
        .route(
            "/api/users/register/",
            post(auth_handlers::handle_register),
        );

    let protected = Router::new()
        // CV API
        .route("/api/cv/upload/", post(cv_handlers::handle_upload_cv))
        .route("/api/cv/", post(cv_handlers::handle_create_cv))
        .route(
            "/api/cv/:id/confirm/",
            post(cv_handlers::handle_confirm_info),
        )
        // Quiz API
        .route("/api/ai/generate/", post(quiz_handlers::handle_generate_quiz))
        .route("/api/ai/submit/", post(quiz_handlers::handle_submit_quiz))
        .route(
            "/api/quiz/results/:id/",
            get(quiz_handlers::handle_get_result),
        )
        // Interview API
        .route(
            "/api/ai/interview/start/",
            post(interview_handlers::handle_start_interview),
        )
        .route(
            "/api/ai/interview/submit/",
            post(interview_handlers::handle_submit_interview),
        )
        // Report API
        .route("/api/ai/report/pdf/", post(report::handle_report_pdf))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    public
        .merge(protected)
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
        .with_state(state)
}
