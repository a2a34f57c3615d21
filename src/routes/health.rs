//! Health and readiness probes

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use crate::app::AppState;
use crate::db;

/// GET /health - liveness, always 200 while the process is up
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// GET /health/ready - readiness, checks Postgres and Redis
pub async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let db_ok = db::health_check(&state.db).await;
    let redis_ok = state.cache.health_check().await.is_ok();

    let status = if db_ok && redis_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if status == StatusCode::OK { "ready" } else { "degraded" },
            "checks": {
                "database": if db_ok { "ok" } else { "failed" },
                "redis": if redis_ok { "ok" } else { "failed" },
            }
        })),
    )
}
