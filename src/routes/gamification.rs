//! Gamification routes
//!
//! Thin handlers over [`GamificationService`]: personal stats, the global
//! leaderboard, and the achievement catalog.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::response::DataResponse;
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::gamification::CreateAchievementRequest;
use crate::domain::users::UserRole;
use crate::error::ApiError;

/// GET /gamification/stats
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let stats = state.gamification.stats(auth.user_id).await?;
    Ok(Json(DataResponse::new(stats)))
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

/// GET /gamification/leaderboard
pub async fn leaderboard(
    State(state): State<Arc<AppState>>,
    _auth: RequireAuth,
    Query(query): Query<LeaderboardQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = state.gamification.leaderboard(query.limit).await?;
    Ok(Json(DataResponse::new(entries)))
}

/// GET /gamification/achievements
///
/// Public: the catalog doubles as marketing material.
pub async fn list_achievements(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let catalog = state.gamification.achievements().await?;
    Ok(Json(DataResponse::new(catalog)))
}

/// POST /gamification/achievements (admin only)
pub async fn create_achievement(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Json(input): Json<CreateAchievementRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if auth.role != UserRole::Admin {
        return Err(ApiError::forbidden(
            "Only administrators can manage the achievement catalog",
        ));
    }
    if input.name.trim().is_empty() {
        return Err(ApiError::invalid_input("Achievement name is required"));
    }
    if input.criteria.target <= 0 {
        return Err(ApiError::invalid_input(
            "Criteria target must be positive",
        ));
    }

    let achievement = state.gamification.create_achievement(input).await?;

    Ok((
        StatusCode::CREATED,
        Json(DataResponse::new(achievement)),
    ))
}
