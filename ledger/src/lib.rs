// Copyright (c) 2026 Grantees Team. MIT License.
// See LICENSE for details.

//! # Grantees Ledger
//!
//! Everything in Grantees that owns state: accounts, the credit ledger,
//! payment verification, email delivery, and the analytics log. The HTTP
//! server is a thin layer on top of this crate.
//!
//! ## Architecture
//!
//! - **credits**: packages, the append-only credit log, and the ledger
//!   that keeps balances and log entries in step.
//! - **storage**: sled trees with bincode rows.
//! - **auth**: HS256 access tokens and argon2id password hashes.
//! - **accounts**: signup, signin, referrals, and profile edits.
//! - **payments**: on-chain verification of credit purchases.
//! - **email**: the welcome email over the Resend API.
//! - **analytics**: fire-and-forget product events.
//! - **session**: an explicit signed-in state with a credit guard.
//! - **config**: fixed constants.
//!
//! ## Ground Rules
//!
//! 1. A balance never goes negative, and a rejected spend writes nothing.
//! 2. Every balance change and its log entry commit together.
//! 3. A payment hash is credited at most once.

pub mod accounts;
pub mod analytics;
pub mod auth;
pub mod config;
pub mod credits;
pub mod email;
pub mod payments;
pub mod session;
pub mod storage;

pub use accounts::{AccountError, AccountPolicy, AccountService, ProfileUpdate};
pub use credits::{
    CreditPackage, CreditSummary, CreditTransaction, Ledger, LedgerAudit, LedgerError,
    LedgerReceipt, Profile, TransactionType,
};
pub use storage::{DbError, GranteesDb};
