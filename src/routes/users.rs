//! Profile routes
//!
//! `/me` read and update. Profile updates feed the gamification engine as
//! `profile_updated` activities.

use axum::{extract::State, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::response::DataResponse;
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::gamification::ActivityType;
use crate::domain::users::{UpdateProfileRequest, UserResponse, UserRole, UserStats};
use crate::error::{ApiError, ApiResult};

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
    pub role: UserRole,
    pub jobs_posted: i32,
    pub jobs_completed: i32,
    pub gigs_created: i32,
    pub total_earnings: i64,
    pub total_spent: i64,
    pub rating: f64,
    pub reviews_count: i32,
    pub created_at: DateTime<Utc>,
}

impl From<UserRow> for UserResponse {
    fn from(r: UserRow) -> Self {
        UserResponse {
            id: r.id,
            email: r.email,
            first_name: r.first_name,
            last_name: r.last_name,
            avatar: r.avatar,
            role: r.role,
            stats: UserStats {
                jobs_posted: r.jobs_posted,
                jobs_completed: r.jobs_completed,
                gigs_created: r.gigs_created,
                total_earnings: r.total_earnings,
                total_spent: r.total_spent,
                rating: r.rating,
                reviews_count: r.reviews_count,
            },
            created_at: r.created_at,
        }
    }
}

const USER_COLUMNS: &str = "id, email, first_name, last_name, avatar, role, jobs_posted, \
     jobs_completed, gigs_created, total_earnings, total_spent, rating, reviews_count, created_at";

pub(crate) async fn fetch_user(db: &sqlx::PgPool, user_id: Uuid) -> ApiResult<UserResponse> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {} FROM users WHERE id = $1",
        USER_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(row.into())
}

/// GET /me
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let user = fetch_user(&state.db, auth.user_id).await?;
    Ok(Json(DataResponse::new(user)))
}

/// PUT /me
///
/// Merge profile fields and record a profile_updated activity.
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Json(input): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if input.is_empty() {
        let user = fetch_user(&state.db, auth.user_id).await?;
        return Ok(Json(DataResponse::new(user)));
    }

    let row = sqlx::query_as::<_, UserRow>(&format!(
        r#"
        UPDATE users SET
            first_name = COALESCE($1, first_name),
            last_name = COALESCE($2, last_name),
            avatar = COALESCE($3, avatar),
            updated_at = NOW()
        WHERE id = $4
        RETURNING {}
        "#,
        USER_COLUMNS
    ))
    .bind(&input.first_name)
    .bind(&input.last_name)
    .bind(&input.avatar)
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("User not found"))?;

    // Secondary write: a gamification failure must not fail the update
    if let Err(e) = state
        .gamification
        .record_activity(auth.user_id, ActivityType::ProfileUpdated, None)
        .await
    {
        tracing::warn!(user_id = %auth.user_id, error = %e, "Failed to record profile activity");
    }

    Ok(Json(DataResponse::new(UserResponse::from(row))))
}
