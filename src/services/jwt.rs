//! Access tokens
//!
//! HS256 JSON Web Tokens carrying the user id and role. Tokens are stateless;
//! the auth middleware reloads the user on every request.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::models::UserRole;

/// Token payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub role: UserRole,
    /// Expiry as a unix timestamp
    pub exp: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Failed to create token: {0}")]
    Create(String),

    #[error("Invalid token: {0}")]
    Invalid(String),
}

/// Issues and verifies access tokens with a shared secret
#[derive(Clone)]
pub struct TokenService {
    secret: String,
    expiration: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: impl Into<String>, expiration_hours: i64) -> Self {
        Self {
            secret: secret.into(),
            expiration: Duration::hours(expiration_hours.max(1)),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.jwt_secret.clone(), config.token_expiration_hours)
    }

    pub fn create_token(&self, user_id: &str, role: UserRole) -> Result<String, TokenError> {
        let exp = Utc::now()
            .checked_add_signed(self.expiration)
            .ok_or_else(|| TokenError::Create("expiry out of range".to_string()))?
            .timestamp() as usize;

        let claims = Claims {
            sub: user_id.to_string(),
            role,
            exp,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| TokenError::Create(e.to_string()))
    }

    /// Decode and validate signature and expiry
    pub fn verify_token(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| TokenError::Invalid(e.to_string()))
    }
}
