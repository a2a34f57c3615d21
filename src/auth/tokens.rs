//! Token issuance and verification
//!
//! HS256 JWTs with an embedded kind claim. Access tokens authenticate API
//! requests; refresh tokens are only accepted by the refresh endpoint.

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use uuid::Uuid;

use super::claims::{Claims, TokenKind};

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

/// Identity a token is issued for
#[derive(Debug, Clone)]
pub struct TokenIdentity {
    pub user_id: Uuid,
    pub role: String,
    pub email: Option<String>,
}

#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
}

impl TokenService {
    pub fn new(secret: &str, access_ttl_seconds: i64, refresh_ttl_seconds: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl_seconds,
            refresh_ttl_seconds,
        }
    }

    /// Issue a fresh access/refresh pair for the given identity
    pub fn issue_tokens(&self, identity: &TokenIdentity) -> Result<TokenPair, jsonwebtoken::errors::Error> {
        let access_token = self.issue(identity, TokenKind::Access, self.access_ttl_seconds)?;
        let refresh_token = self.issue(identity, TokenKind::Refresh, self.refresh_ttl_seconds)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.access_ttl_seconds,
        })
    }

    fn issue(
        &self,
        identity: &TokenIdentity,
        kind: TokenKind,
        ttl_seconds: i64,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: identity.user_id.to_string(),
            kind,
            iat: now,
            exp: now + ttl_seconds,
            role: identity.role.clone(),
            email: identity.email.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
    }

    /// Verify a token's signature and expiry, and that it is of the expected
    /// kind. Returns the claims on success.
    pub fn verify(&self, token: &str, expected_kind: TokenKind) -> Result<Claims, String> {
        let validation = Validation::default();
        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| format!("Token verification failed: {}", e))?;

        if data.claims.kind != expected_kind {
            return Err(format!(
                "Expected {:?} token, got {:?}",
                expected_kind, data.claims.kind
            ));
        }

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("test-secret", 900, 604_800)
    }

    fn identity() -> TokenIdentity {
        TokenIdentity {
            user_id: Uuid::new_v4(),
            role: "freelancer".to_string(),
            email: Some("dev@example.com".to_string()),
        }
    }

    #[test]
    fn issue_and_verify_roundtrip() {
        let svc = service();
        let id = identity();
        let pair = svc.issue_tokens(&id).expect("issuing should succeed");

        let claims = svc
            .verify(&pair.access_token, TokenKind::Access)
            .expect("access token should verify");
        assert_eq!(claims.sub, id.user_id.to_string());
        assert_eq!(claims.role, "freelancer");
        assert_eq!(claims.kind, TokenKind::Access);

        let claims = svc
            .verify(&pair.refresh_token, TokenKind::Refresh)
            .expect("refresh token should verify");
        assert_eq!(claims.kind, TokenKind::Refresh);
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let svc = service();
        let pair = svc.issue_tokens(&identity()).unwrap();

        assert!(svc.verify(&pair.refresh_token, TokenKind::Access).is_err());
        assert!(svc.verify(&pair.access_token, TokenKind::Refresh).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let pair = service().issue_tokens(&identity()).unwrap();
        let other = TokenService::new("different-secret", 900, 604_800);

        assert!(other.verify(&pair.access_token, TokenKind::Access).is_err());
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(service().verify("not-a-jwt", TokenKind::Access).is_err());
    }
}
