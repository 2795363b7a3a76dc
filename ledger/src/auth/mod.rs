//! # Authentication
//!
//! HS256 access tokens and argon2id password hashes. Account lifecycle
//! (signup, signin) lives in [`crate::accounts`]; this module only knows
//! how to mint, check, and hash.

use thiserror::Error;

pub mod jwt;
pub mod password;

pub use jwt::{extract_bearer, Claims, TokenIssuer};
pub use password::{hash_password, verify_password};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No `Authorization` header was sent.
    #[error("Unauthorized")]
    MissingToken,

    /// The token was malformed, expired, or signed with another key.
    #[error("Invalid token")]
    InvalidToken,

    #[error("JWT secret must be at least {min} characters")]
    WeakSecret { min: usize },

    #[error("failed to issue token: {0}")]
    Issue(String),

    #[error("password hashing failed: {0}")]
    Hashing(String),
}
