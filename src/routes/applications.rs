//! Application routes
//!
//! Freelancers apply to open jobs; clients decide. Accepting one application
//! rejects every other pending application for the job inside the same
//! transaction, with the job row locked so two accepts cannot interleave.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::pagination::{Paginated, PaginationParams};
use crate::api::response::{DataResponse, MessageResponse};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::applications::{
    transition_allowed, ApplicationResponse, ApplicationStatus, CreateApplicationRequest,
    UpdateApplicationRequest,
};
use crate::domain::gamification::ActivityType;
use crate::domain::jobs::JobStatus;
use crate::domain::users::UserRole;
use crate::error::{on_unique_violation, ApiError, ApiResult};

#[derive(Debug, sqlx::FromRow)]
struct ApplicationRow {
    id: Uuid,
    job_id: Uuid,
    freelancer_id: Uuid,
    status: ApplicationStatus,
    cover_letter: String,
    proposed_rate: Option<i64>,
    proposed_duration: Option<String>,
    portfolio: Option<String>,
    applied_at: DateTime<Utc>,
    responded_at: Option<DateTime<Utc>>,
}

impl From<ApplicationRow> for ApplicationResponse {
    fn from(r: ApplicationRow) -> Self {
        ApplicationResponse {
            id: r.id,
            job_id: r.job_id,
            freelancer_id: r.freelancer_id,
            status: r.status,
            cover_letter: r.cover_letter,
            proposed_rate: r.proposed_rate,
            proposed_duration: r.proposed_duration,
            portfolio: r.portfolio,
            applied_at: r.applied_at,
            responded_at: r.responded_at,
        }
    }
}

const APPLICATION_COLUMNS: &str = "id, job_id, freelancer_id, status, cover_letter, \
     proposed_rate, proposed_duration, portfolio, applied_at, responded_at";

async fn fetch_application<'e, E>(executor: E, id: Uuid, lock: bool) -> ApiResult<ApplicationRow>
where
    E: sqlx::PgExecutor<'e>,
{
    let sql = if lock {
        format!(
            "SELECT {} FROM applications WHERE id = $1 FOR UPDATE",
            APPLICATION_COLUMNS
        )
    } else {
        format!("SELECT {} FROM applications WHERE id = $1", APPLICATION_COLUMNS)
    };
    sqlx::query_as::<_, ApplicationRow>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| ApiError::not_found("Application not found"))
}

#[derive(Debug, sqlx::FromRow)]
struct JobHeadRow {
    client_id: Uuid,
    status: JobStatus,
}

/// POST /jobs/:job_id/applications
pub async fn create_application(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(job_id): Path<Uuid>,
    Json(input): Json<CreateApplicationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if auth.role != UserRole::Freelancer {
        return Err(ApiError::forbidden("Only freelancers can apply to jobs"));
    }
    if input.cover_letter.trim().is_empty() {
        return Err(ApiError::invalid_input("A cover letter is required"));
    }
    if let Some(rate) = input.proposed_rate {
        if rate <= 0 {
            return Err(ApiError::invalid_input("Proposed rate must be positive"));
        }
    }

    let job = sqlx::query_as::<_, JobHeadRow>("SELECT client_id, status FROM jobs WHERE id = $1")
        .bind(job_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Job not found"))?;

    if job.client_id == auth.user_id {
        return Err(ApiError::forbidden("You cannot apply to your own job"));
    }
    if job.status != JobStatus::Open {
        return Err(ApiError::invalid_state("Job is not open for applications"));
    }

    let mut tx = state.db.begin().await?;

    let row = sqlx::query_as::<_, ApplicationRow>(&format!(
        r#"
        INSERT INTO applications (job_id, freelancer_id, cover_letter, proposed_rate,
                                  proposed_duration, portfolio)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {}
        "#,
        APPLICATION_COLUMNS
    ))
    .bind(job_id)
    .bind(auth.user_id)
    .bind(&input.cover_letter)
    .bind(input.proposed_rate)
    .bind(&input.proposed_duration)
    .bind(&input.portfolio)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| on_unique_violation(e, "You have already applied to this job"))?;

    sqlx::query("UPDATE jobs SET applications_count = applications_count + 1 WHERE id = $1")
        .bind(job_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(application_id = %row.id, job_id = %job_id, "Application submitted");

    if let Err(e) = state
        .gamification
        .record_activity(
            auth.user_id,
            ActivityType::ApplicationSent,
            Some(json!({ "job_id": job_id, "application_id": row.id })),
        )
        .await
    {
        tracing::warn!(application_id = %row.id, error = %e, "Failed to record application activity");
    }

    Ok((
        StatusCode::CREATED,
        Json(DataResponse::new(ApplicationResponse::from(row))),
    ))
}

/// GET /jobs/:job_id/applications
///
/// Visible to the job's client only.
pub async fn list_job_applications(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(job_id): Path<Uuid>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let job = sqlx::query_as::<_, JobHeadRow>("SELECT client_id, status FROM jobs WHERE id = $1")
        .bind(job_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Job not found"))?;

    if job.client_id != auth.user_id {
        return Err(ApiError::forbidden(
            "Only the job owner can view its applications",
        ));
    }

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM applications WHERE job_id = $1")
        .bind(job_id)
        .fetch_one(&state.db)
        .await?;

    let rows = sqlx::query_as::<_, ApplicationRow>(&format!(
        r#"
        SELECT {} FROM applications
        WHERE job_id = $1
        ORDER BY applied_at DESC
        LIMIT $2 OFFSET $3
        "#,
        APPLICATION_COLUMNS
    ))
    .bind(job_id)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?;

    let applications: Vec<ApplicationResponse> = rows.into_iter().map(Into::into).collect();

    Ok(Json(Paginated::new(applications, &pagination, total as u64)))
}

/// GET /applications
///
/// The caller's own applications, newest first.
pub async fn list_my_applications(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let total: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM applications WHERE freelancer_id = $1")
            .bind(auth.user_id)
            .fetch_one(&state.db)
            .await?;

    let rows = sqlx::query_as::<_, ApplicationRow>(&format!(
        r#"
        SELECT {} FROM applications
        WHERE freelancer_id = $1
        ORDER BY applied_at DESC
        LIMIT $2 OFFSET $3
        "#,
        APPLICATION_COLUMNS
    ))
    .bind(auth.user_id)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?;

    let applications: Vec<ApplicationResponse> = rows.into_iter().map(Into::into).collect();

    Ok(Json(Paginated::new(applications, &pagination, total as u64)))
}

/// GET /applications/:id
///
/// Visible to the applicant and the job's client.
pub async fn get_application(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(application_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let app = fetch_application(&state.db, application_id, false).await?;

    if app.freelancer_id != auth.user_id {
        let client_id: Uuid = sqlx::query_scalar("SELECT client_id FROM jobs WHERE id = $1")
            .bind(app.job_id)
            .fetch_one(&state.db)
            .await?;
        if client_id != auth.user_id {
            return Err(ApiError::forbidden(
                "You are not a party to this application",
            ));
        }
    }

    Ok(Json(DataResponse::new(ApplicationResponse::from(app))))
}

/// PUT /applications/:id
///
/// Merge edits, pending applications only.
pub async fn update_application(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(application_id): Path<Uuid>,
    Json(input): Json<UpdateApplicationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let app = fetch_application(&state.db, application_id, false).await?;
    if app.freelancer_id != auth.user_id {
        return Err(ApiError::forbidden("Only the applicant can edit this"));
    }
    if !app.status.is_pending() {
        return Err(ApiError::invalid_state(format!(
            "Cannot edit a {} application",
            app.status
        )));
    }

    let row = sqlx::query_as::<_, ApplicationRow>(&format!(
        r#"
        UPDATE applications SET
            cover_letter = COALESCE($1, cover_letter),
            proposed_rate = COALESCE($2, proposed_rate),
            proposed_duration = COALESCE($3, proposed_duration),
            portfolio = COALESCE($4, portfolio)
        WHERE id = $5
        RETURNING {}
        "#,
        APPLICATION_COLUMNS
    ))
    .bind(&input.cover_letter)
    .bind(input.proposed_rate)
    .bind(&input.proposed_duration)
    .bind(&input.portfolio)
    .bind(application_id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(DataResponse::new(ApplicationResponse::from(row))))
}

/// POST /applications/:id/accept
///
/// Client accepts one application; all other pending applications on the job
/// are rejected in the same transaction.
pub async fn accept_application(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(application_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut tx = state.db.begin().await?;

    let app = fetch_application(&mut *tx, application_id, true).await?;

    // Lock the job too: this is the serialization point for competing accepts
    let job = sqlx::query_as::<_, JobHeadRow>(
        "SELECT client_id, status FROM jobs WHERE id = $1 FOR UPDATE",
    )
    .bind(app.job_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found("Job not found"))?;

    if job.client_id != auth.user_id {
        return Err(ApiError::forbidden(
            "Only the job owner can accept applications",
        ));
    }
    if job.status != JobStatus::Open {
        return Err(ApiError::invalid_state("Job is no longer open"));
    }
    if !transition_allowed(app.status, ApplicationStatus::Accepted) {
        return Err(ApiError::invalid_state(format!(
            "Cannot accept a {} application",
            app.status
        )));
    }

    let row = sqlx::query_as::<_, ApplicationRow>(&format!(
        r#"
        UPDATE applications SET status = 'accepted', responded_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        APPLICATION_COLUMNS
    ))
    .bind(application_id)
    .fetch_one(&mut *tx)
    .await?;

    let rejected = sqlx::query(
        r#"
        UPDATE applications SET status = 'rejected', responded_at = NOW()
        WHERE job_id = $1 AND id <> $2 AND status = 'pending'
        "#,
    )
    .bind(app.job_id)
    .bind(application_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;

    tracing::info!(
        application_id = %application_id,
        job_id = %app.job_id,
        auto_rejected = rejected,
        "Application accepted"
    );

    if let Err(e) = state
        .gamification
        .record_activity(
            app.freelancer_id,
            ActivityType::ApplicationAccepted,
            Some(json!({ "job_id": app.job_id, "application_id": application_id })),
        )
        .await
    {
        tracing::warn!(application_id = %application_id, error = %e, "Failed to record acceptance activity");
    }

    Ok(Json(DataResponse::new(ApplicationResponse::from(row))))
}

/// POST /applications/:id/reject
pub async fn reject_application(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(application_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut tx = state.db.begin().await?;

    let app = fetch_application(&mut *tx, application_id, true).await?;

    let client_id: Uuid = sqlx::query_scalar("SELECT client_id FROM jobs WHERE id = $1")
        .bind(app.job_id)
        .fetch_one(&mut *tx)
        .await?;
    if client_id != auth.user_id {
        return Err(ApiError::forbidden(
            "Only the job owner can reject applications",
        ));
    }
    if !transition_allowed(app.status, ApplicationStatus::Rejected) {
        return Err(ApiError::invalid_state(format!(
            "Cannot reject a {} application",
            app.status
        )));
    }

    let row = sqlx::query_as::<_, ApplicationRow>(&format!(
        r#"
        UPDATE applications SET status = 'rejected', responded_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        APPLICATION_COLUMNS
    ))
    .bind(application_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(application_id = %application_id, "Application rejected");

    Ok(Json(DataResponse::new(ApplicationResponse::from(row))))
}

/// POST /applications/:id/withdraw
pub async fn withdraw_application(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(application_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut tx = state.db.begin().await?;

    let app = fetch_application(&mut *tx, application_id, true).await?;
    if app.freelancer_id != auth.user_id {
        return Err(ApiError::forbidden("Only the applicant can withdraw this"));
    }
    if !transition_allowed(app.status, ApplicationStatus::Withdrawn) {
        return Err(ApiError::invalid_state(format!(
            "Cannot withdraw a {} application",
            app.status
        )));
    }

    let row = sqlx::query_as::<_, ApplicationRow>(&format!(
        r#"
        UPDATE applications SET status = 'withdrawn', responded_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        APPLICATION_COLUMNS
    ))
    .bind(application_id)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE jobs SET applications_count = GREATEST(applications_count - 1, 0) WHERE id = $1",
    )
    .bind(app.job_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(application_id = %application_id, "Application withdrawn");

    Ok(Json(DataResponse::new(ApplicationResponse::from(row))))
}

/// DELETE /applications/:id
pub async fn delete_application(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(application_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut tx = state.db.begin().await?;

    let app = fetch_application(&mut *tx, application_id, true).await?;
    if app.freelancer_id != auth.user_id {
        return Err(ApiError::forbidden("Only the applicant can delete this"));
    }

    sqlx::query("DELETE FROM applications WHERE id = $1")
        .bind(application_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "UPDATE jobs SET applications_count = GREATEST(applications_count - 1, 0) WHERE id = $1",
    )
    .bind(app.job_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(application_id = %application_id, "Application deleted");

    Ok(Json(MessageResponse::new("Application deleted")))
}
