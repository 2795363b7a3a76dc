//! # GranteesDb: Persistent Storage Engine
//!
//! The persistence layer for Grantees, built on sled's embedded key-value
//! store. Every account, profile, and credit log entry flows through this
//! module.
//!
//! ## Tree Layout
//!
//! | Tree             | Key                          | Value                       |
//! |------------------|------------------------------|-----------------------------|
//! | `users`          | email (UTF-8, lowercase)     | `bincode(UserRecord)`       |
//! | `profiles`       | user_id (UTF-8)              | `bincode(Profile)`          |
//! | `credit_log`     | user_id `/` seq (8B BE)      | `bincode(CreditTransaction)`|
//! | `payment_hashes` | tx_hash (UTF-8)              | user_id (UTF-8)             |
//! | `referral_codes` | code (UTF-8)                 | user_id (UTF-8)             |
//! | `referrals`      | referrer `/` referred        | `bincode(Referral)`         |
//! | `analytics`      | seq (8B BE)                  | `bincode(StoredEvent)`      |
//! | `metadata`       | key (UTF-8)                  | value (bytes)               |
//!
//! Sequence numbers come from sled's monotonic id generator and are stored
//! big-endian so that lexicographic order matches insertion order. A
//! prefix scan over `credit_log` therefore returns a user's log oldest
//! first.
//!
//! ## Atomicity
//!
//! Balance changes never go through the plain accessors here. The ledger
//! runs them as multi-tree transactions over `profiles`, `credit_log`, and
//! `payment_hashes`, so a balance write and its log entry land together or
//! not at all.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Tree};
use std::path::Path;

use crate::credits::{CreditTransaction, Profile};

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Encodes a row for storage.
pub(crate) fn encode<T: Serialize>(value: &T) -> DbResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| DbError::Serialization(e.to_string()))
}

/// Decodes a stored row.
pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> DbResult<T> {
    bincode::deserialize(bytes).map_err(|e| DbError::Serialization(e.to_string()))
}

/// Lifts a codec error inside a transaction closure into an abort.
pub(crate) fn aborting<T, E: From<DbError>>(
    result: DbResult<T>,
) -> Result<T, ConflictableTransactionError<E>> {
    result.map_err(|e| ConflictableTransactionError::Abort(E::from(e)))
}

/// Flattens a finished transaction's error into the caller's error type.
pub(crate) fn flatten_tx_error<E: From<DbError>>(err: TransactionError<E>) -> E {
    match err {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => E::from(DbError::Sled(e)),
    }
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Well-known key in the `metadata` tree for the on-disk schema version.
const META_SCHEMA_VERSION: &[u8] = b"schema_version";

/// Current schema version, written on first open.
pub const SCHEMA_VERSION: u32 = 1;

/// `user_id/` prefix shared by a user's log and referral keys.
pub(crate) fn user_prefix(user_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(user_id.len() + 1);
    key.extend_from_slice(user_id.as_bytes());
    key.push(b'/');
    key
}

/// Key of one credit log entry.
pub(crate) fn log_key(user_id: &str, seq: u64) -> Vec<u8> {
    let mut key = user_prefix(user_id);
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

/// Key of one referral edge.
pub(crate) fn referral_key(referrer_id: &str, referred_id: &str) -> Vec<u8> {
    let mut key = user_prefix(referrer_id);
    key.extend_from_slice(referred_id.as_bytes());
    key
}

// ---------------------------------------------------------------------------
// Rows that only the storage layer knows about
// ---------------------------------------------------------------------------

/// Login credentials, keyed by normalised email.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    /// Argon2id PHC string.
    pub password_hash: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A referral edge: `referrer_id` invited `referred_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Referral {
    pub referrer_id: String,
    pub referred_id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

// ---------------------------------------------------------------------------
// GranteesDb
// ---------------------------------------------------------------------------

/// Persistent storage engine for Grantees.
///
/// Wraps a sled `Db` and exposes typed reads plus the raw trees that the
/// ledger and account service need for transactions. sled handles are
/// reference counted, so cloning is cheap and every clone sees the same
/// data.
#[derive(Debug, Clone)]
pub struct GranteesDb {
    db: Db,
    users: Tree,
    profiles: Tree,
    credit_log: Tree,
    payment_hashes: Tree,
    referral_codes: Tree,
    referrals: Tree,
    analytics: Tree,
    metadata: Tree,
}

impl GranteesDb {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary database that is removed when dropped.
    pub fn open_temporary() -> DbResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> DbResult<Self> {
        let this = Self {
            users: db.open_tree("users")?,
            profiles: db.open_tree("profiles")?,
            credit_log: db.open_tree("credit_log")?,
            payment_hashes: db.open_tree("payment_hashes")?,
            referral_codes: db.open_tree("referral_codes")?,
            referrals: db.open_tree("referrals")?,
            analytics: db.open_tree("analytics")?,
            metadata: db.open_tree("metadata")?,
            db,
        };

        if this.metadata.get(META_SCHEMA_VERSION)?.is_none() {
            this.metadata
                .insert(META_SCHEMA_VERSION, &SCHEMA_VERSION.to_be_bytes())?;
        }

        Ok(this)
    }

    /// Next value of sled's monotonic id generator.
    pub fn generate_id(&self) -> DbResult<u64> {
        Ok(self.db.generate_id()?)
    }

    // -- Raw trees ----------------------------------------------------------

    pub(crate) fn users(&self) -> &Tree {
        &self.users
    }

    pub(crate) fn profiles(&self) -> &Tree {
        &self.profiles
    }

    pub(crate) fn credit_log(&self) -> &Tree {
        &self.credit_log
    }

    pub(crate) fn payment_hashes(&self) -> &Tree {
        &self.payment_hashes
    }

    pub(crate) fn referral_codes(&self) -> &Tree {
        &self.referral_codes
    }

    pub(crate) fn referrals(&self) -> &Tree {
        &self.referrals
    }

    pub(crate) fn analytics(&self) -> &Tree {
        &self.analytics
    }

    // -- Users --------------------------------------------------------------

    /// Looks up credentials by normalised email.
    pub fn get_user(&self, email: &str) -> DbResult<Option<UserRecord>> {
        self.users
            .get(email.as_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    // -- Profiles -----------------------------------------------------------

    pub fn get_profile(&self, user_id: &str) -> DbResult<Option<Profile>> {
        self.profiles
            .get(user_id.as_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    /// Applies `edit` to a stored profile inside a single-tree transaction
    /// and returns the updated row. `None` if the profile does not exist.
    ///
    /// The balance must not be changed here; that is the ledger's job.
    pub fn update_profile<F>(&self, user_id: &str, edit: F) -> DbResult<Option<Profile>>
    where
        F: Fn(&mut Profile),
    {
        self.profiles
            .transaction(|profiles| -> sled::transaction::ConflictableTransactionResult<Option<Profile>, DbError> {
                let Some(bytes) = profiles.get(user_id.as_bytes())? else {
                    return Ok(None);
                };
                let mut profile: Profile = aborting(decode(&bytes))?;
                edit(&mut profile);
                profile.touch();
                profiles.insert(user_id.as_bytes(), aborting(encode(&profile))?)?;
                Ok(Some(profile))
            })
            .map_err(flatten_tx_error)
    }

    /// Resolves a referral code to the owning user id.
    pub fn user_for_referral_code(&self, code: &str) -> DbResult<Option<String>> {
        Ok(self
            .referral_codes
            .get(code.as_bytes())?
            .map(|v| String::from_utf8_lossy(&v).into_owned()))
    }

    // -- Credit log ---------------------------------------------------------

    /// A user's full credit log, oldest first.
    pub fn credit_log_for(&self, user_id: &str) -> DbResult<Vec<CreditTransaction>> {
        let mut entries = Vec::new();
        for item in self.credit_log.scan_prefix(user_prefix(user_id)) {
            let (_key, value) = item?;
            entries.push(decode(&value)?);
        }
        Ok(entries)
    }

    /// Up to `limit` of a user's most recent log entries, newest first.
    pub fn recent_credit_log(&self, user_id: &str, limit: usize) -> DbResult<Vec<CreditTransaction>> {
        let mut entries = Vec::with_capacity(limit);
        for item in self.credit_log.scan_prefix(user_prefix(user_id)).rev() {
            if entries.len() >= limit {
                break;
            }
            let (_key, value) = item?;
            entries.push(decode(&value)?);
        }
        Ok(entries)
    }

    /// Which user a payment hash was credited to, if any.
    pub fn payment_owner(&self, tx_hash: &str) -> DbResult<Option<String>> {
        Ok(self
            .payment_hashes
            .get(tx_hash.as_bytes())?
            .map(|v| String::from_utf8_lossy(&v).into_owned()))
    }

    // -- Referrals ----------------------------------------------------------

    /// Number of builders `referrer_id` has referred.
    pub fn referral_count(&self, referrer_id: &str) -> usize {
        self.referrals.scan_prefix(user_prefix(referrer_id)).count()
    }

    // -- Metadata -----------------------------------------------------------

    pub fn schema_version(&self) -> DbResult<Option<u32>> {
        match self.metadata.get(META_SCHEMA_VERSION)? {
            Some(bytes) => {
                let version = u32::from_be_bytes(
                    bytes
                        .as_ref()
                        .try_into()
                        .map_err(|_| DbError::Serialization("invalid schema version bytes".to_string()))?,
                );
                Ok(Some(version))
            }
            None => Ok(None),
        }
    }

    // -- Utility operations -------------------------------------------------

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn profile_count(&self) -> usize {
        self.profiles.len()
    }

    pub fn transaction_count(&self) -> usize {
        self.credit_log.len()
    }

    pub fn event_count(&self) -> usize {
        self.analytics.len()
    }

    /// Force a flush of all pending writes to disk.
    pub fn flush(&self) -> DbResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_profile(db: &GranteesDb, user_id: &str) -> Profile {
        let profile = Profile::new(user_id, &format!("{user_id}@example.com"), "CODE0001".into());
        db.profiles()
            .insert(user_id.as_bytes(), encode(&profile).unwrap())
            .unwrap();
        profile
    }

    #[test]
    fn open_temporary_database() {
        let db = GranteesDb::open_temporary().expect("should create temp db");
        assert_eq!(db.profile_count(), 0);
        assert_eq!(db.transaction_count(), 0);
        assert_eq!(db.schema_version().unwrap(), Some(SCHEMA_VERSION));
    }

    #[test]
    fn open_persistent_database() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let db = GranteesDb::open(dir.path()).expect("should open db");
            seed_profile(&db, "u1");
            db.flush().unwrap();
        }

        let db = GranteesDb::open(dir.path()).expect("should reopen db");
        assert_eq!(db.profile_count(), 1);
        assert!(db.get_profile("u1").unwrap().is_some());
    }

    #[test]
    fn log_keys_sort_by_sequence() {
        assert!(log_key("u1", 2) < log_key("u1", 10));
        assert!(log_key("u1", 255) < log_key("u1", 256));
        assert!(log_key("u1", 1).starts_with(&user_prefix("u1")));
    }

    #[test]
    fn user_prefix_does_not_bleed_between_ids() {
        // "u1/" must not match entries belonging to "u10".
        assert!(!log_key("u10", 1).starts_with(&user_prefix("u1")));
    }

    #[test]
    fn update_profile_edits_in_place() {
        let db = GranteesDb::open_temporary().unwrap();
        seed_profile(&db, "u1");

        let updated = db
            .update_profile("u1", |p| p.display_name = Some("Ada".into()))
            .unwrap()
            .expect("profile exists");
        assert_eq!(updated.display_name.as_deref(), Some("Ada"));
        assert_eq!(
            db.get_profile("u1").unwrap().unwrap().display_name.as_deref(),
            Some("Ada")
        );
    }

    #[test]
    fn update_missing_profile_returns_none() {
        let db = GranteesDb::open_temporary().unwrap();
        assert!(db.update_profile("ghost", |_| {}).unwrap().is_none());
    }

    #[test]
    fn generated_ids_increase() {
        let db = GranteesDb::open_temporary().unwrap();
        let a = db.generate_id().unwrap();
        let b = db.generate_id().unwrap();
        assert!(b > a);
    }
}
