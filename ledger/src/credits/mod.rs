//! # Credits
//!
//! Credits are the unit builders spend on AI actions. They are bought in
//! fixed [`CreditPackage`]s, earned through referrals and bonuses, and
//! spent one action at a time.
//!
//! ```text
//!   purchase ──┐
//!   referral ──┼──▶ Profile.credits_balance ──▶ spend
//!   bonus ─────┘            │
//!                           ▼
//!                   credit_log (append-only)
//! ```
//!
//! The stored balance is authoritative. The log explains it, and
//! [`Ledger::audit`] replays the log to detect drift.

use thiserror::Error;

use crate::storage::DbError;

pub mod ledger;
pub mod package;
pub mod profile;
pub mod summary;
pub mod transaction;

pub use ledger::{Ledger, LedgerAudit, LedgerReceipt};
pub use package::CreditPackage;
pub use profile::Profile;
pub use summary::{credit_score, CreditSummary};
pub use transaction::{CreditTransaction, TransactionType};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("profile not found for user {0}")]
    ProfileNotFound(String),

    /// The balance cannot cover the requested spend. Nothing was written.
    #[error("insufficient credits: required {required}, available {available}")]
    InsufficientCredits { required: u64, available: u64 },

    /// Credit amounts must be strictly positive.
    #[error("invalid credit amount: {0}")]
    InvalidAmount(i64),

    #[error("unknown credit package '{0}'")]
    UnknownPackage(String),

    /// Only referral and bonus credits can be awarded directly.
    #[error("{0} credits cannot be awarded")]
    InvalidAward(TransactionType),

    /// The payment hash is neither a well-formed EVM hash nor a demo hash.
    #[error("malformed tx_hash '{0}'")]
    InvalidTxHash(String),

    /// The payment hash has already been credited.
    #[error("payment {0} has already been credited")]
    DuplicatePayment(String),

    #[error("balance overflow")]
    BalanceOverflow,

    #[error("storage error: {0}")]
    Storage(DbError),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<DbError> for LedgerError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Serialization(msg) => LedgerError::Serialization(msg),
            other => LedgerError::Storage(other),
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
