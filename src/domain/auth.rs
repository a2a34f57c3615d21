//! Authentication DTOs

use serde::{Deserialize, Serialize};

use super::users::{UserResponse, UserRole};
use crate::auth::TokenPair;

/// POST /auth/register payload
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
}

/// POST /auth/login payload
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /auth/refresh payload
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Issued on register/login/refresh
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub tokens: TokenPair,
}

/// Refresh returns tokens only; the profile is fetched separately
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub tokens: TokenPair,
}
