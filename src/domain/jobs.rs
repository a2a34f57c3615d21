//! Job domain types and lifecycle state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum JobStatus {
    Draft,
    Open,
    InProgress,
    Completed,
    Cancelled,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Draft => write!(f, "draft"),
            JobStatus::Open => write!(f, "open"),
            JobStatus::InProgress => write!(f, "in_progress"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl JobStatus {
    /// Direct field edits are only legal before the job reaches a terminal state
    pub fn is_editable(&self) -> bool {
        !matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Anything short of completion can still be cancelled
    pub fn is_cancellable(&self) -> bool {
        !matches!(self, Self::Completed)
    }
}

/// Forward transitions the owning client drives explicitly.
/// Cancellation is covered by [`JobStatus::is_cancellable`].
pub fn transition_allowed(from: JobStatus, to: JobStatus) -> bool {
    matches!(
        (from, to),
        (JobStatus::Draft, JobStatus::Open)
            | (JobStatus::Open, JobStatus::InProgress)
            | (JobStatus::InProgress, JobStatus::Completed)
    ) || (to == JobStatus::Cancelled && from.is_cancellable())
}

/// Compensation model
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum JobType {
    FixedPrice,
    Hourly,
}

/// Non-authoritative engagement counters
#[derive(Debug, Clone, Serialize)]
pub struct JobStats {
    pub views: i32,
    pub applications_count: i32,
    pub saved_count: i32,
}

/// Hourly rate range, in cents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyRate {
    pub min: i64,
    pub max: i64,
}

/// Request DTO for creating a job (starts in draft)
#[derive(Debug, Clone, Deserialize)]
pub struct CreateJobRequest {
    pub title: String,
    pub description: String,
    pub job_type: JobType,
    /// Fixed-price budget in cents; required for fixed_price jobs
    #[serde(default)]
    pub budget: Option<i64>,
    /// Required for hourly jobs
    #[serde(default)]
    pub hourly_rate: Option<HourlyRate>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
}

/// Request DTO for draft/open field edits (merge semantics)
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateJobRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub budget: Option<i64>,
    #[serde(default)]
    pub hourly_rate: Option<HourlyRate>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
}

/// Request DTO for assigning a freelancer
#[derive(Debug, Clone, Deserialize)]
pub struct AssignJobRequest {
    pub freelancer_id: Uuid,
}

/// Job response DTO
#[derive(Debug, Clone, Serialize)]
pub struct JobResponse {
    pub id: Uuid,
    pub client_id: Uuid,
    pub title: String,
    pub description: String,
    pub status: JobStatus,
    pub job_type: JobType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hourly_rate: Option<HourlyRate>,
    pub assigned_freelancer_id: Option<Uuid>,
    pub stats: JobStats,
    pub deadline: Option<DateTime<Utc>>,
    pub start_date: Option<DateTime<Utc>>,
    pub completion_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_path_is_allowed() {
        assert!(transition_allowed(JobStatus::Draft, JobStatus::Open));
        assert!(transition_allowed(JobStatus::Open, JobStatus::InProgress));
        assert!(transition_allowed(JobStatus::InProgress, JobStatus::Completed));
    }

    #[test]
    fn skipping_states_is_rejected() {
        assert!(!transition_allowed(JobStatus::Draft, JobStatus::InProgress));
        assert!(!transition_allowed(JobStatus::Draft, JobStatus::Completed));
        assert!(!transition_allowed(JobStatus::Open, JobStatus::Completed));
    }

    #[test]
    fn backward_transitions_are_rejected() {
        assert!(!transition_allowed(JobStatus::Open, JobStatus::Draft));
        assert!(!transition_allowed(JobStatus::InProgress, JobStatus::Open));
        assert!(!transition_allowed(JobStatus::Completed, JobStatus::InProgress));
    }

    #[test]
    fn cancel_allowed_except_after_completion() {
        assert!(transition_allowed(JobStatus::Draft, JobStatus::Cancelled));
        assert!(transition_allowed(JobStatus::Open, JobStatus::Cancelled));
        assert!(transition_allowed(JobStatus::InProgress, JobStatus::Cancelled));
        assert!(!transition_allowed(JobStatus::Completed, JobStatus::Cancelled));
    }

    #[test]
    fn terminal_states_are_not_editable() {
        assert!(JobStatus::Draft.is_editable());
        assert!(JobStatus::Open.is_editable());
        assert!(JobStatus::InProgress.is_editable());
        assert!(!JobStatus::Completed.is_editable());
        assert!(!JobStatus::Cancelled.is_editable());
    }
}
