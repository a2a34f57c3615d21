//! HTTP route handlers and router assembly

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::app::AppState;

pub mod applications;
pub mod auth;
pub mod gamification;
pub mod health;
pub mod jobs;
pub mod users;

/// Assemble the full API router
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Health
        .route("/health", get(health::health))
        .route("/health/ready", get(health::ready))
        // Auth
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        // Profile
        .route("/me", get(users::get_me).put(users::update_me))
        // Jobs
        .route("/jobs", post(jobs::create_job).get(jobs::list_jobs))
        .route(
            "/jobs/:id",
            get(jobs::get_job)
                .put(jobs::update_job)
                .delete(jobs::delete_job),
        )
        .route("/jobs/:id/publish", post(jobs::publish_job))
        .route("/jobs/:id/assign", post(jobs::assign_job))
        .route("/jobs/:id/complete", post(jobs::complete_job))
        .route("/jobs/:id/cancel", post(jobs::cancel_job))
        // Applications
        .route(
            "/jobs/:job_id/applications",
            post(applications::create_application).get(applications::list_job_applications),
        )
        .route("/applications", get(applications::list_my_applications))
        .route(
            "/applications/:id",
            get(applications::get_application)
                .put(applications::update_application)
                .delete(applications::delete_application),
        )
        .route(
            "/applications/:id/accept",
            post(applications::accept_application),
        )
        .route(
            "/applications/:id/reject",
            post(applications::reject_application),
        )
        .route(
            "/applications/:id/withdraw",
            post(applications::withdraw_application),
        )
        // Gamification
        .route("/gamification/stats", get(gamification::get_stats))
        .route("/gamification/leaderboard", get(gamification::leaderboard))
        .route(
            "/gamification/achievements",
            get(gamification::list_achievements).post(gamification::create_achievement),
        )
}
