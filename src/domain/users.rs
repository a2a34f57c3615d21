//! User aggregate domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User role, fixed at registration (admin action aside)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum UserRole {
    Client,
    Freelancer,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Freelancer => "freelancer",
            Self::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "client" => Some(Self::Client),
            "freelancer" => Some(Self::Freelancer),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Only clients (and admins acting on their behalf) may post jobs
    pub fn can_post_jobs(&self) -> bool {
        matches!(self, Self::Client | Self::Admin)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Marketplace counters, monotonic except rating
#[derive(Debug, Clone, Serialize)]
pub struct UserStats {
    pub jobs_posted: i32,
    pub jobs_completed: i32,
    pub gigs_created: i32,
    pub total_earnings: i64,
    pub total_spent: i64,
    pub rating: f64,
    pub reviews_count: i32,
}

/// Profile response for `/me`
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
    pub role: UserRole,
    pub stats: UserStats,
    pub created_at: DateTime<Utc>,
}

/// Request DTO for profile updates (field merge)
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl UpdateProfileRequest {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none() && self.last_name.is_none() && self.avatar.is_none()
    }
}
