//! Job routes
//!
//! Full lifecycle: draft -> open -> in_progress -> completed, with cancel as
//! an escape hatch everywhere short of completion. Transitions that touch two
//! rows (assign, complete) run in a transaction with the job row locked.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::pagination::{Paginated, PaginationParams};
use crate::api::response::{DataResponse, MessageResponse};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::gamification::ActivityType;
use crate::domain::jobs::{
    transition_allowed, AssignJobRequest, CreateJobRequest, HourlyRate, JobResponse, JobStats,
    JobStatus, JobType, UpdateJobRequest,
};
use crate::domain::users::UserRole;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    client_id: Uuid,
    title: String,
    description: String,
    status: JobStatus,
    job_type: JobType,
    budget: Option<i64>,
    hourly_rate_min: Option<i64>,
    hourly_rate_max: Option<i64>,
    assigned_freelancer_id: Option<Uuid>,
    views: i32,
    applications_count: i32,
    saved_count: i32,
    deadline: Option<DateTime<Utc>>,
    start_date: Option<DateTime<Utc>>,
    completion_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<JobRow> for JobResponse {
    fn from(r: JobRow) -> Self {
        let hourly_rate = match (r.hourly_rate_min, r.hourly_rate_max) {
            (Some(min), Some(max)) => Some(HourlyRate { min, max }),
            _ => None,
        };
        JobResponse {
            id: r.id,
            client_id: r.client_id,
            title: r.title,
            description: r.description,
            status: r.status,
            job_type: r.job_type,
            budget: r.budget,
            hourly_rate,
            assigned_freelancer_id: r.assigned_freelancer_id,
            stats: JobStats {
                views: r.views,
                applications_count: r.applications_count,
                saved_count: r.saved_count,
            },
            deadline: r.deadline,
            start_date: r.start_date,
            completion_date: r.completion_date,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

const JOB_COLUMNS: &str = "id, client_id, title, description, status, job_type, budget, \
     hourly_rate_min, hourly_rate_max, assigned_freelancer_id, views, applications_count, \
     saved_count, deadline, start_date, completion_date, created_at, updated_at";

/// Lightweight projection used for ownership and state checks
#[derive(Debug, sqlx::FromRow)]
struct JobHeadRow {
    client_id: Uuid,
    status: JobStatus,
}

async fn fetch_job_head<'e, E>(executor: E, job_id: Uuid, lock: bool) -> ApiResult<JobHeadRow>
where
    E: sqlx::PgExecutor<'e>,
{
    let sql = if lock {
        "SELECT client_id, status FROM jobs WHERE id = $1 FOR UPDATE"
    } else {
        "SELECT client_id, status FROM jobs WHERE id = $1"
    };
    sqlx::query_as::<_, JobHeadRow>(sql)
        .bind(job_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| ApiError::not_found("Job not found"))
}

fn validate_compensation(
    job_type: JobType,
    budget: Option<i64>,
    hourly_rate: &Option<HourlyRate>,
) -> ApiResult<()> {
    match job_type {
        JobType::FixedPrice => {
            let budget = budget
                .ok_or_else(|| ApiError::invalid_input("Fixed-price jobs require a budget"))?;
            if budget <= 0 {
                return Err(ApiError::invalid_input("Budget must be positive"));
            }
        }
        JobType::Hourly => {
            let rate = hourly_rate
                .as_ref()
                .ok_or_else(|| ApiError::invalid_input("Hourly jobs require an hourly rate"))?;
            if rate.min <= 0 || rate.max < rate.min {
                return Err(ApiError::invalid_input(
                    "Hourly rate must satisfy 0 < min <= max",
                ));
            }
        }
    }
    Ok(())
}

/// POST /jobs
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Json(input): Json<CreateJobRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !auth.role.can_post_jobs() {
        return Err(ApiError::forbidden("Only clients can post jobs"));
    }
    if input.title.trim().is_empty() {
        return Err(ApiError::invalid_input("Title is required"));
    }
    validate_compensation(input.job_type, input.budget, &input.hourly_rate)?;

    let (rate_min, rate_max) = match &input.hourly_rate {
        Some(r) => (Some(r.min), Some(r.max)),
        None => (None, None),
    };

    let mut tx = state.db.begin().await?;

    let row = sqlx::query_as::<_, JobRow>(&format!(
        r#"
        INSERT INTO jobs (client_id, title, description, job_type, budget,
                          hourly_rate_min, hourly_rate_max, deadline)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {}
        "#,
        JOB_COLUMNS
    ))
    .bind(auth.user_id)
    .bind(&input.title)
    .bind(&input.description)
    .bind(input.job_type)
    .bind(input.budget)
    .bind(rate_min)
    .bind(rate_max)
    .bind(input.deadline)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE users SET jobs_posted = jobs_posted + 1 WHERE id = $1")
        .bind(auth.user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(job_id = %row.id, client_id = %auth.user_id, "Job created");

    if let Err(e) = state
        .gamification
        .record_activity(
            auth.user_id,
            ActivityType::JobPosted,
            Some(json!({ "job_id": row.id })),
        )
        .await
    {
        tracing::warn!(job_id = %row.id, error = %e, "Failed to record job_posted activity");
    }

    Ok((
        StatusCode::CREATED,
        Json(DataResponse::new(JobResponse::from(row))),
    ))
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub client_id: Option<Uuid>,
}

/// GET /jobs
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    _auth: RequireAuth,
    Query(query): Query<ListJobsQuery>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let status = query.status.map(|s| s.to_string());

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM jobs
        WHERE ($1::text IS NULL OR status = $1)
          AND ($2::uuid IS NULL OR client_id = $2)
        "#,
    )
    .bind(&status)
    .bind(query.client_id)
    .fetch_one(&state.db)
    .await?;

    let rows = sqlx::query_as::<_, JobRow>(&format!(
        r#"
        SELECT {} FROM jobs
        WHERE ($1::text IS NULL OR status = $1)
          AND ($2::uuid IS NULL OR client_id = $2)
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#,
        JOB_COLUMNS
    ))
    .bind(&status)
    .bind(query.client_id)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?;

    let jobs: Vec<JobResponse> = rows.into_iter().map(Into::into).collect();

    Ok(Json(Paginated::new(jobs, &pagination, total as u64)))
}

/// GET /jobs/:id
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    _auth: RequireAuth,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let row = sqlx::query_as::<_, JobRow>(&format!(
        "SELECT {} FROM jobs WHERE id = $1",
        JOB_COLUMNS
    ))
    .bind(job_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Job not found"))?;

    // View counter is best-effort; the read must not fail over it
    sqlx::query("UPDATE jobs SET views = views + 1 WHERE id = $1")
        .bind(job_id)
        .execute(&state.db)
        .await
        .ok();

    Ok(Json(DataResponse::new(JobResponse::from(row))))
}

/// PUT /jobs/:id
pub async fn update_job(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(job_id): Path<Uuid>,
    Json(input): Json<UpdateJobRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let head = fetch_job_head(&state.db, job_id, false).await?;
    if head.client_id != auth.user_id {
        return Err(ApiError::forbidden("Only the job owner can update it"));
    }
    if !head.status.is_editable() {
        return Err(ApiError::invalid_state(format!(
            "Cannot update a {} job",
            head.status
        )));
    }

    let (rate_min, rate_max) = match &input.hourly_rate {
        Some(r) => (Some(r.min), Some(r.max)),
        None => (None, None),
    };

    let row = sqlx::query_as::<_, JobRow>(&format!(
        r#"
        UPDATE jobs SET
            title = COALESCE($1, title),
            description = COALESCE($2, description),
            budget = COALESCE($3, budget),
            hourly_rate_min = COALESCE($4, hourly_rate_min),
            hourly_rate_max = COALESCE($5, hourly_rate_max),
            deadline = COALESCE($6, deadline),
            updated_at = NOW()
        WHERE id = $7
        RETURNING {}
        "#,
        JOB_COLUMNS
    ))
    .bind(&input.title)
    .bind(&input.description)
    .bind(input.budget)
    .bind(rate_min)
    .bind(rate_max)
    .bind(input.deadline)
    .bind(job_id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(DataResponse::new(JobResponse::from(row))))
}

/// POST /jobs/:id/publish
pub async fn publish_job(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let head = fetch_job_head(&state.db, job_id, false).await?;
    if head.client_id != auth.user_id {
        return Err(ApiError::forbidden("Only the job owner can publish it"));
    }
    if !transition_allowed(head.status, JobStatus::Open) {
        return Err(ApiError::invalid_state(format!(
            "Cannot publish a {} job",
            head.status
        )));
    }

    let row = sqlx::query_as::<_, JobRow>(&format!(
        "UPDATE jobs SET status = 'open', updated_at = NOW() WHERE id = $1 RETURNING {}",
        JOB_COLUMNS
    ))
    .bind(job_id)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(job_id = %job_id, "Job published");

    Ok(Json(DataResponse::new(JobResponse::from(row))))
}

/// POST /jobs/:id/assign
///
/// Locks the job row so a concurrent assign or accept cannot double-book it.
pub async fn assign_job(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(job_id): Path<Uuid>,
    Json(input): Json<AssignJobRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut tx = state.db.begin().await?;

    let head = fetch_job_head(&mut *tx, job_id, true).await?;
    if head.client_id != auth.user_id {
        return Err(ApiError::forbidden("Only the job owner can assign it"));
    }
    if !transition_allowed(head.status, JobStatus::InProgress) {
        return Err(ApiError::invalid_state(format!(
            "Cannot assign a {} job",
            head.status
        )));
    }

    let freelancer_role: Option<UserRole> =
        sqlx::query_scalar("SELECT role FROM users WHERE id = $1")
            .bind(input.freelancer_id)
            .fetch_optional(&mut *tx)
            .await?;
    match freelancer_role {
        Some(UserRole::Freelancer) => {}
        Some(_) => {
            return Err(ApiError::invalid_input(
                "Assigned user must be a freelancer",
            ))
        }
        None => return Err(ApiError::invalid_input("Assigned user does not exist")),
    }

    let row = sqlx::query_as::<_, JobRow>(&format!(
        r#"
        UPDATE jobs SET
            status = 'in_progress',
            assigned_freelancer_id = $1,
            start_date = NOW(),
            updated_at = NOW()
        WHERE id = $2
        RETURNING {}
        "#,
        JOB_COLUMNS
    ))
    .bind(input.freelancer_id)
    .bind(job_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(job_id = %job_id, freelancer_id = %input.freelancer_id, "Job assigned");

    Ok(Json(DataResponse::new(JobResponse::from(row))))
}

/// POST /jobs/:id/complete
///
/// Bumps completion counters for both parties and awards the freelancer the
/// job_completed activity.
pub async fn complete_job(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut tx = state.db.begin().await?;

    let head = fetch_job_head(&mut *tx, job_id, true).await?;
    if head.client_id != auth.user_id {
        return Err(ApiError::forbidden("Only the job owner can complete it"));
    }
    if !transition_allowed(head.status, JobStatus::Completed) {
        return Err(ApiError::invalid_state(format!(
            "Cannot complete a {} job",
            head.status
        )));
    }

    let row = sqlx::query_as::<_, JobRow>(&format!(
        r#"
        UPDATE jobs SET
            status = 'completed',
            completion_date = NOW(),
            updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        JOB_COLUMNS
    ))
    .bind(job_id)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE users SET jobs_completed = jobs_completed + 1 WHERE id = $1")
        .bind(auth.user_id)
        .execute(&mut *tx)
        .await?;

    let freelancer_id = row.assigned_freelancer_id;
    if let Some(freelancer_id) = freelancer_id {
        sqlx::query("UPDATE users SET jobs_completed = jobs_completed + 1 WHERE id = $1")
            .bind(freelancer_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    tracing::info!(job_id = %job_id, "Job completed");

    if let Some(freelancer_id) = freelancer_id {
        if let Err(e) = state
            .gamification
            .record_activity(
                freelancer_id,
                ActivityType::JobCompleted,
                Some(json!({ "job_id": job_id })),
            )
            .await
        {
            tracing::warn!(job_id = %job_id, error = %e, "Failed to record job_completed activity");
        }
    }

    Ok(Json(DataResponse::new(JobResponse::from(row))))
}

/// POST /jobs/:id/cancel
pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let head = fetch_job_head(&state.db, job_id, false).await?;
    if head.client_id != auth.user_id {
        return Err(ApiError::forbidden("Only the job owner can cancel it"));
    }
    if !transition_allowed(head.status, JobStatus::Cancelled) {
        return Err(ApiError::invalid_state(format!(
            "Cannot cancel a {} job",
            head.status
        )));
    }

    let row = sqlx::query_as::<_, JobRow>(&format!(
        "UPDATE jobs SET status = 'cancelled', updated_at = NOW() WHERE id = $1 RETURNING {}",
        JOB_COLUMNS
    ))
    .bind(job_id)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(job_id = %job_id, "Job cancelled");

    Ok(Json(DataResponse::new(JobResponse::from(row))))
}

/// DELETE /jobs/:id
///
/// Hard delete, drafts only. Anything published goes through cancel instead.
pub async fn delete_job(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let head = fetch_job_head(&state.db, job_id, false).await?;
    if head.client_id != auth.user_id {
        return Err(ApiError::forbidden("Only the job owner can delete it"));
    }
    if head.status != JobStatus::Draft {
        return Err(ApiError::invalid_state(
            "Only draft jobs can be deleted; cancel it instead",
        ));
    }

    sqlx::query("DELETE FROM jobs WHERE id = $1")
        .bind(job_id)
        .execute(&state.db)
        .await?;

    tracing::info!(job_id = %job_id, "Job deleted");

    Ok(Json(MessageResponse::new("Job deleted")))
}
