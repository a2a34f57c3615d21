//! Application domain types and lifecycle state machine
//!
//! At most one application may exist per (job, freelancer) pair; the database
//! enforces this with a composite unique constraint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Application lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
    Withdrawn,
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplicationStatus::Pending => write!(f, "pending"),
            ApplicationStatus::Accepted => write!(f, "accepted"),
            ApplicationStatus::Rejected => write!(f, "rejected"),
            ApplicationStatus::Withdrawn => write!(f, "withdrawn"),
        }
    }
}

impl ApplicationStatus {
    /// Every transition out of the machine starts from pending; the three
    /// terminal states accept nothing further.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// All legal transitions: pending -> accepted | rejected | withdrawn
pub fn transition_allowed(from: ApplicationStatus, to: ApplicationStatus) -> bool {
    from.is_pending()
        && matches!(
            to,
            ApplicationStatus::Accepted | ApplicationStatus::Rejected | ApplicationStatus::Withdrawn
        )
}

/// Request DTO for applying to a job
#[derive(Debug, Clone, Deserialize)]
pub struct CreateApplicationRequest {
    pub cover_letter: String,
    /// Proposed rate in cents
    #[serde(default)]
    pub proposed_rate: Option<i64>,
    #[serde(default)]
    pub proposed_duration: Option<String>,
    #[serde(default)]
    pub portfolio: Option<String>,
}

/// Request DTO for editing a pending application (merge semantics)
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateApplicationRequest {
    #[serde(default)]
    pub cover_letter: Option<String>,
    #[serde(default)]
    pub proposed_rate: Option<i64>,
    #[serde(default)]
    pub proposed_duration: Option<String>,
    #[serde(default)]
    pub portfolio: Option<String>,
}

/// Application response DTO
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationResponse {
    pub id: Uuid,
    pub job_id: Uuid,
    pub freelancer_id: Uuid,
    pub status: ApplicationStatus,
    pub cover_letter: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposed_rate: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposed_duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portfolio: Option<String>,
    pub applied_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decisions_require_pending() {
        assert!(transition_allowed(
            ApplicationStatus::Pending,
            ApplicationStatus::Accepted
        ));
        assert!(transition_allowed(
            ApplicationStatus::Pending,
            ApplicationStatus::Rejected
        ));
        assert!(transition_allowed(
            ApplicationStatus::Pending,
            ApplicationStatus::Withdrawn
        ));
    }

    #[test]
    fn terminal_states_accept_nothing() {
        for from in [
            ApplicationStatus::Accepted,
            ApplicationStatus::Rejected,
            ApplicationStatus::Withdrawn,
        ] {
            for to in [
                ApplicationStatus::Pending,
                ApplicationStatus::Accepted,
                ApplicationStatus::Rejected,
                ApplicationStatus::Withdrawn,
            ] {
                assert!(!transition_allowed(from, to), "{} -> {}", from, to);
            }
        }
    }

    #[test]
    fn reverting_to_pending_is_rejected() {
        assert!(!transition_allowed(
            ApplicationStatus::Pending,
            ApplicationStatus::Pending
        ));
    }
}
