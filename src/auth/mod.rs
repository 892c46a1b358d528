pub mod password;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SecurityConfig;
use crate::database::models::UserId;

/// Claims carried by every identity token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub authorized: bool,
    pub user_id: UserId,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: UserId, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            authorized: true,
            user_id,
            exp: expires_at.timestamp(),
            iat: issued_at.timestamp(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingCredential,

    #[error("Authorization header must use Bearer token format")]
    MalformedCredential,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token has expired")]
    Expired,

    #[error("Token signing key is not configured")]
    SigningKeyUnavailable,

    #[error("JWT generation error: {0}")]
    TokenGeneration(String),
}

/// Issued token together with the instant it stops being accepted.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Stateless HS256 token issuer/verifier. Tokens are never stored server-side,
/// so a token stays valid until `exp` even after the holder logs out.
#[derive(Clone)]
pub struct TokenService {
    secret: Vec<u8>,
    ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenService {
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }

    /// A lifetime too large to represent is kept as zero, so every issue
    /// attempt fails with [`AuthError::TokenGeneration`] instead of panicking.
    pub fn from_config(security: &SecurityConfig) -> Self {
        let hours = security.jwt_expiry_hours;
        let ttl = i64::try_from(hours)
            .ok()
            .and_then(Duration::try_hours)
            .unwrap_or_else(|| {
                tracing::warn!("Token lifetime of {} hours is out of range", hours);
                Duration::zero()
            });

        Self::new(security.jwt_secret.clone().into_bytes(), ttl)
    }

    pub fn issue(&self, user_id: UserId) -> Result<IssuedToken, AuthError> {
        self.issue_at(user_id, Utc::now())
    }

    pub fn resolve(&self, token: &str) -> Result<UserId, AuthError> {
        self.resolve_at(token, Utc::now())
    }

    pub fn issue_at(&self, user_id: UserId, now: DateTime<Utc>) -> Result<IssuedToken, AuthError> {
        if self.secret.is_empty() {
            return Err(AuthError::SigningKeyUnavailable);
        }
        if self.ttl <= Duration::zero() {
            return Err(AuthError::TokenGeneration(
                "token lifetime must be positive".to_string(),
            ));
        }

        let expires_at = now.checked_add_signed(self.ttl).ok_or_else(|| {
            AuthError::TokenGeneration("token lifetime out of range".to_string())
        })?;

        let claims = Claims::new(user_id, now, expires_at);
        let encoding_key = EncodingKey::from_secret(&self.secret);

        let token = encode(&Header::new(Algorithm::HS256), &claims, &encoding_key)
            .map_err(|e| AuthError::TokenGeneration(e.to_string()))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Verify signature and payload, then reject anything at or past `exp`.
    /// Expiry is checked here instead of by `jsonwebtoken` so the boundary is
    /// exact (no leeway) and so callers can supply the clock.
    pub fn resolve_at(&self, token: &str, now: DateTime<Utc>) -> Result<UserId, AuthError> {
        if self.secret.is_empty() {
            return Err(AuthError::SigningKeyUnavailable);
        }

        let decoding_key = DecodingKey::from_secret(&self.secret);
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        let token_data = decode::<Claims>(token, &decoding_key, &validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        let claims = token_data.claims;
        if now.timestamp() >= claims.exp {
            return Err(AuthError::Expired);
        }
        if !claims.authorized {
            return Err(AuthError::InvalidToken("token not authorized".to_string()));
        }

        Ok(claims.user_id)
    }
}
