use uuid::Uuid;

use super::Claims;
use crate::domain::users::UserRole;

/// Authenticated user context resolved from a verified access token.
/// Lifecycle handlers trust this (user_id, role) pair.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: UserRole,
    pub email: Option<String>,
}

impl AuthContext {
    pub fn from_claims(claims: &Claims) -> Result<Self, &'static str> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| "Invalid user ID in token")?;
        let role = UserRole::from_str(&claims.role).ok_or("Invalid role in token")?;

        Ok(Self {
            user_id,
            role,
            email: claims.email.clone(),
        })
    }
}
