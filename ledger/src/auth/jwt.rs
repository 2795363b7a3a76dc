//! Access tokens.
//!
//! Tokens are HS256 JWTs carrying the user id as `sub`. The `role` and
//! `aud` claims are both `"authenticated"`, and `aud` is checked on every
//! verification.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::AuthError;
use crate::config::{ACCESS_TOKEN_TTL, AUTHENTICATED_ROLE, MIN_JWT_SECRET_LENGTH};

/// Payload of an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub email: String,
    pub role: String,
    pub aud: String,
    pub iat: u64,
    pub exp: u64,
}

/// Mints and verifies access tokens with a shared secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Refuses secrets shorter than [`MIN_JWT_SECRET_LENGTH`].
    pub fn new(secret: &str) -> Result<Self, AuthError> {
        Self::with_ttl(secret, ACCESS_TOKEN_TTL)
    }

    pub fn with_ttl(secret: &str, ttl: Duration) -> Result<Self, AuthError> {
        if secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(AuthError::WeakSecret {
                min: MIN_JWT_SECRET_LENGTH,
            });
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        })
    }

    pub fn issue(&self, user_id: &str, email: &str) -> Result<String, AuthError> {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            role: AUTHENTICATED_ROLE.to_string(),
            aud: AUTHENTICATED_ROLE.to_string(),
            iat: now,
            exp: now + self.ttl.as_secs(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Issue(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[AUTHENTICATED_ROLE]);

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }

    /// Checks an `Authorization` header value and returns the claims.
    pub fn authenticate(&self, header: Option<&str>) -> Result<Claims, AuthError> {
        let header = header.ok_or(AuthError::MissingToken)?;
        let token = extract_bearer(header).ok_or(AuthError::InvalidToken)?;
        self.verify(token)
    }
}

/// Strips the `Bearer ` prefix from an `Authorization` header value.
pub fn extract_bearer(header: &str) -> Option<&str> {
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
