use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::auth::{self, AppState};
use crate::middleware::require_auth;
use crate::{feedbacks, insights, issues, settings, team};

/// The REST surface. The WebSocket gateway is mounted by the server binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/reset-password", post(auth::request_password_reset))
        .route("/auth/reset-password/confirm", post(auth::confirm_password_reset))
        .route("/auth/username-available", get(auth::username_available));

    let protected_routes = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/feedbacks", post(feedbacks::create_feedback))
        .route("/feedbacks/query", post(feedbacks::query_feedbacks))
        .route("/feedbacks/{id}/processed", post(feedbacks::mark_processed))
        .route("/feedbacks/{id}", axum::routing::delete(feedbacks::delete_feedback))
        .route("/issues", get(issues::list_issues).post(issues::create_issue))
        .route("/issues/{id}", axum::routing::patch(issues::update_issue).delete(issues::delete_issue))
        .route("/team", get(team::roster))
        .route("/settings/profile", get(settings::get_profile).put(settings::update_profile))
        .route("/insights/overview", get(insights::get_overview))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
