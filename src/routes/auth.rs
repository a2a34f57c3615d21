//! Authentication routes.
//!
//! Register, login, and token refresh. Login counts as a gamified activity
//! so daily streaks advance even for users who only browse.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::tokens::TokenIdentity;
use crate::auth::TokenKind;
use crate::domain::auth::{AuthResponse, LoginRequest, RefreshRequest, RegisterRequest, TokenResponse};
use crate::domain::gamification::ActivityType;
use crate::domain::users::UserRole;
use crate::error::{on_unique_violation, ApiError};
use crate::routes::users::fetch_user;

#[derive(Debug, sqlx::FromRow)]
struct CredentialsRow {
    id: Uuid,
    password_hash: String,
    role: UserRole,
    email: String,
}

/// POST /auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(input): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let role = input.role;
    if role == UserRole::Admin {
        return Err(ApiError::invalid_input("Role must be 'client' or 'freelancer'"));
    }

    if input.password.len() < state.settings.password_min_length {
        return Err(ApiError::invalid_input(format!(
            "Password must be at least {} characters",
            state.settings.password_min_length
        )));
    }
    if !input.email.contains('@') {
        return Err(ApiError::invalid_input("A valid email address is required"));
    }

    let password_hash =
        hash_password(&input.password).map_err(|e| ApiError::internal(e.to_string()))?;

    let user_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO users (email, password_hash, first_name, last_name, role)
        VALUES (LOWER($1), $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(&input.email)
    .bind(&password_hash)
    .bind(&input.first_name)
    .bind(&input.last_name)
    .bind(role)
    .fetch_one(&state.db)
    .await
    .map_err(|e| on_unique_violation(e, "An account with this email already exists"))?;

    tracing::info!(user_id = %user_id, role = %role, "User registered");

    let user = fetch_user(&state.db, user_id).await?;
    let tokens = state
        .tokens
        .issue_tokens(&TokenIdentity {
            user_id,
            role: role.as_str().to_string(),
            email: Some(user.email.clone()),
        })
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse { user, tokens }),
    ))
}

/// POST /auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(input): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let creds = sqlx::query_as::<_, CredentialsRow>(
        "SELECT id, password_hash, role, email FROM users WHERE email = LOWER($1)",
    )
    .bind(&input.email)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    let valid = verify_password(&input.password, &creds.password_hash)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    if !valid {
        return Err(ApiError::unauthorized("Invalid email or password"));
    }

    // Streaks advance on login; a gamification hiccup must not block sign-in
    if let Err(e) = state
        .gamification
        .record_activity(creds.id, ActivityType::Login, None)
        .await
    {
        tracing::warn!(user_id = %creds.id, error = %e, "Failed to record login activity");
    }

    let user = fetch_user(&state.db, creds.id).await?;
    let tokens = state
        .tokens
        .issue_tokens(&TokenIdentity {
            user_id: creds.id,
            role: creds.role.as_str().to_string(),
            email: Some(creds.email),
        })
        .map_err(|e| ApiError::internal(e.to_string()))?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(AuthResponse { user, tokens }))
}

/// POST /auth/refresh
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(input): Json<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = state
        .tokens
        .verify(&input.refresh_token, TokenKind::Refresh)
        .map_err(ApiError::unauthorized)?;

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| ApiError::unauthorized("Invalid token subject"))?;

    // Re-read the role so a demoted account cannot refresh stale privileges
    let creds = sqlx::query_as::<_, CredentialsRow>(
        "SELECT id, password_hash, role, email FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::unauthorized("Account no longer exists"))?;

    let tokens = state
        .tokens
        .issue_tokens(&TokenIdentity {
            user_id: creds.id,
            role: creds.role.as_str().to_string(),
            email: Some(creds.email),
        })
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(Json(TokenResponse { tokens }))
}
