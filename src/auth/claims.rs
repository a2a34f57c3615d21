use serde::{Deserialize, Serialize};

/// Discriminates access tokens from refresh tokens so one can never be
/// presented where the other is expected.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims carried by tokens this service issues
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    /// Token kind (access or refresh)
    pub kind: TokenKind,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// User role
    pub role: String,

    /// User email - optional
    #[serde(default)]
    pub email: Option<String>,
}
