//! # Storage Module
//!
//! Persistent storage for Grantees: one sled database with a tree per
//! record kind. Rows are bincode-encoded; JSON is for the API only.

pub mod db;

pub use db::{DbError, DbResult, GranteesDb, Referral, UserRecord};
