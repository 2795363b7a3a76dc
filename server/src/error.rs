//! HTTP error mapping.
//!
//! Every failure leaves the server as a JSON body with an `error` field.
//! Insufficient-credit responses also carry `required` and `available`.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use grantees_catalog::CatalogError;
use grantees_ledger::auth::AuthError;
use grantees_ledger::email::EmailError;
use grantees_ledger::payments::PaymentError;
use grantees_ledger::{AccountError, DbError, LedgerError};

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Body of a 402 for a spend the balance cannot cover.
#[derive(Debug, Serialize, Deserialize)]
pub struct InsufficientCreditsResponse {
    pub error: String,
    pub required: u64,
    pub available: u64,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Insufficient credits")]
    InsufficientCredits { required: u64, available: u64 },

    #[error("{0}")]
    PaymentRequired(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InsufficientCredits { .. } | ApiError::PaymentRequired(_) => {
                StatusCode::PAYMENT_REQUIRED
            }
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        match self {
            ApiError::InsufficientCredits {
                required,
                available,
            } => (
                status,
                Json(InsufficientCreditsResponse {
                    error: "Insufficient credits".into(),
                    required,
                    available,
                }),
            )
                .into_response(),
            other => (
                status,
                Json(ErrorResponse {
                    error: other.to_string(),
                }),
            )
                .into_response(),
        }
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken | AuthError::InvalidToken => {
                ApiError::Unauthorized(err.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::ProfileNotFound(_) => ApiError::NotFound("Profile not found".into()),
            LedgerError::InsufficientCredits {
                required,
                available,
            } => ApiError::InsufficientCredits {
                required,
                available,
            },
            LedgerError::UnknownPackage(_) => ApiError::BadRequest("Invalid package".into()),
            LedgerError::InvalidAmount(_)
            | LedgerError::InvalidAward(_)
            | LedgerError::InvalidTxHash(_) => {
                ApiError::BadRequest(err.to_string())
            }
            LedgerError::DuplicatePayment(_) => ApiError::Conflict(err.to_string()),
            LedgerError::BalanceOverflow
            | LedgerError::Storage(_)
            | LedgerError::Serialization(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::InvalidEmail
            | AccountError::WeakPassword { .. }
            | AccountError::Onboarding(_) => ApiError::BadRequest(err.to_string()),
            AccountError::EmailTaken => ApiError::Conflict(err.to_string()),
            AccountError::InvalidCredentials => ApiError::Unauthorized(err.to_string()),
            AccountError::ProfileNotFound(_) => ApiError::NotFound("Profile not found".into()),
            AccountError::Auth(e) => e.into(),
            AccountError::Ledger(e) => e.into(),
            AccountError::ReferralCodeExhausted | AccountError::Storage(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::MissingTxHash | PaymentError::MalformedTxHash(_) => {
                ApiError::BadRequest(err.to_string())
            }
            PaymentError::Rpc(_) => ApiError::Internal(err.to_string()),
            other => ApiError::PaymentRequired(format!("Payment not verified: {other}")),
        }
    }
}

impl From<EmailError> for ApiError {
    fn from(err: EmailError) -> Self {
        match err {
            EmailError::InvalidRecipient => ApiError::BadRequest(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        ApiError::Internal(format!("Database error: {err}"))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::BadRequest(format!("Invalid request body: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_errors_map_to_statuses() {
        let cases = [
            (LedgerError::ProfileNotFound("u".into()), StatusCode::NOT_FOUND),
            (
                LedgerError::InsufficientCredits {
                    required: 3,
                    available: 1,
                },
                StatusCode::PAYMENT_REQUIRED,
            ),
            (LedgerError::InvalidAmount(0), StatusCode::BAD_REQUEST),
            (LedgerError::UnknownPackage("x".into()), StatusCode::BAD_REQUEST),
            (LedgerError::DuplicatePayment("0x1".into()), StatusCode::CONFLICT),
            (LedgerError::BalanceOverflow, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn auth_messages_are_fixed() {
        assert_eq!(ApiError::from(AuthError::MissingToken).to_string(), "Unauthorized");
        assert_eq!(ApiError::from(AuthError::InvalidToken).to_string(), "Invalid token");
        assert_eq!(
            ApiError::from(AuthError::InvalidToken).status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn payment_failures() {
        assert_eq!(
            ApiError::from(PaymentError::NotFound("0x1".into())).status(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            ApiError::from(PaymentError::MissingTxHash).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(PaymentError::MalformedTxHash("0x1".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(LedgerError::InvalidTxHash("0x1".into())).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn unknown_package_message() {
        assert_eq!(
            ApiError::from(LedgerError::UnknownPackage("gold".into())).to_string(),
            "Invalid package"
        );
    }
}
