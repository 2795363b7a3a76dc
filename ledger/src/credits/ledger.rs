//! # Credit Ledger
//!
//! Every balance change is a single serializable sled transaction over
//! the `profiles`, `credit_log`, and (for purchases) `payment_hashes`
//! trees:
//!
//! 1. Load the profile.
//! 2. Check the request against the balance it just read.
//! 3. Write the new balance and append the log entry.
//!
//! Concurrent mutations for the same user conflict on the profile key and
//! sled retries the loser against the fresh balance, so two spends can
//! never both pass a check that only one of them should.
//!
//! Ids and timestamps are fixed before the transaction starts; a retried
//! closure reuses them, so a retry never appends a second entry.

use chrono::Utc;
use serde::Serialize;
use sled::transaction::{abort, ConflictableTransactionResult};
use sled::Transactional;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    CreditPackage, CreditTransaction, LedgerError, LedgerResult, Profile, TransactionType,
};
use crate::config::RECENT_TRANSACTIONS_LIMIT;
use crate::payments::normalize_tx_hash;
use crate::storage::db::{aborting, decode, encode, flatten_tx_error, log_key};
use crate::storage::GranteesDb;

/// Outcome of a successful balance mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LedgerReceipt {
    pub new_balance: u64,
    pub transaction: CreditTransaction,
}

/// Result of replaying a user's log against their stored balance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct LedgerAudit {
    pub stored_balance: u64,
    /// Sum of every `credits` value in the log.
    pub ledger_sum: i64,
    /// `stored_balance - ledger_sum`. Zero for a consistent account.
    pub drift: i64,
}

impl LedgerAudit {
    pub fn is_consistent(&self) -> bool {
        self.drift == 0
    }
}

/// A log entry waiting to be written, with its identity fixed up front.
struct PendingEntry {
    seq: u64,
    id: String,
    created_at: chrono::DateTime<Utc>,
}

/// The credit ledger over a [`GranteesDb`].
#[derive(Debug, Clone)]
pub struct Ledger {
    db: GranteesDb,
}

impl Ledger {
    pub fn new(db: GranteesDb) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &GranteesDb {
        &self.db
    }

    fn pending(&self) -> LedgerResult<PendingEntry> {
        Ok(PendingEntry {
            seq: self.db.generate_id()?,
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
        })
    }

    // -- Mutations ----------------------------------------------------------

    /// Spends `amount` credits.
    ///
    /// Fails with [`LedgerError::InsufficientCredits`] and writes nothing
    /// if the balance is short.
    pub fn consume(&self, user_id: &str, amount: i64, description: &str) -> LedgerResult<LedgerReceipt> {
        let debit = u64::try_from(amount)
            .ok()
            .filter(|a| *a > 0)
            .ok_or(LedgerError::InvalidAmount(amount))?;
        let entry = self.pending()?;

        let result = (self.db.profiles(), self.db.credit_log())
            .transaction(|(profiles, log)| -> ConflictableTransactionResult<LedgerReceipt, LedgerError> {
                let Some(bytes) = profiles.get(user_id.as_bytes())? else {
                    return abort(LedgerError::ProfileNotFound(user_id.to_string()));
                };
                let mut profile: Profile = aborting(decode(&bytes))?;

                if profile.credits_balance < debit {
                    return abort(LedgerError::InsufficientCredits {
                        required: debit,
                        available: profile.credits_balance,
                    });
                }

                profile.credits_balance -= debit;
                profile.updated_at = entry.created_at;

                let tx = CreditTransaction {
                    id: entry.id.clone(),
                    user_id: user_id.to_string(),
                    kind: TransactionType::Spend,
                    credits: -amount,
                    tx_hash: None,
                    description: Some(description.to_string()),
                    created_at: entry.created_at,
                };

                profiles.insert(user_id.as_bytes(), aborting(encode(&profile))?)?;
                log.insert(log_key(user_id, entry.seq), aborting(encode(&tx))?)?;

                Ok(LedgerReceipt {
                    new_balance: profile.credits_balance,
                    transaction: tx,
                })
            })
            .map_err(flatten_tx_error);

        match &result {
            Ok(receipt) => info!(
                user_id,
                amount = debit,
                new_balance = receipt.new_balance,
                "credits consumed"
            ),
            Err(LedgerError::InsufficientCredits { required, available }) => warn!(
                user_id,
                required, available, "consume rejected: insufficient credits"
            ),
            Err(e) => warn!(user_id, error = %e, "consume failed"),
        }
        result
    }

    /// Credits a purchased package and records the payment hash.
    ///
    /// The hash is stored and deduplicated in its canonical form, so a
    /// hash that has already been credited is rejected with
    /// [`LedgerError::DuplicatePayment`] whatever its letter case. Callers
    /// are expected to have verified the payment before calling this.
    pub fn purchase(
        &self,
        user_id: &str,
        wallet_address: &str,
        package: CreditPackage,
        tx_hash: &str,
    ) -> LedgerResult<LedgerReceipt> {
        let tx_hash = normalize_tx_hash(tx_hash)
            .map_err(|_| LedgerError::InvalidTxHash(tx_hash.trim().to_string()))?;
        let tx_hash = tx_hash.as_str();
        let entry = self.pending()?;
        let credits = package.credits();

        let result = (self.db.profiles(), self.db.credit_log(), self.db.payment_hashes())
            .transaction(|(profiles, log, hashes)| -> ConflictableTransactionResult<LedgerReceipt, LedgerError> {
                if hashes.get(tx_hash.as_bytes())?.is_some() {
                    return abort(LedgerError::DuplicatePayment(tx_hash.to_string()));
                }
                let Some(bytes) = profiles.get(user_id.as_bytes())? else {
                    return abort(LedgerError::ProfileNotFound(user_id.to_string()));
                };
                let mut profile: Profile = aborting(decode(&bytes))?;

                let Some(balance) = profile.credits_balance.checked_add(credits) else {
                    return abort(LedgerError::BalanceOverflow);
                };
                profile.credits_balance = balance;
                profile.wallet_address = Some(wallet_address.to_string());
                profile.updated_at = entry.created_at;

                let tx = CreditTransaction {
                    id: entry.id.clone(),
                    user_id: user_id.to_string(),
                    kind: TransactionType::Purchase,
                    credits: credits as i64,
                    tx_hash: Some(tx_hash.to_string()),
                    description: Some(format!(
                        "Purchased {} package ({} credits)",
                        package.name(),
                        credits
                    )),
                    created_at: entry.created_at,
                };

                profiles.insert(user_id.as_bytes(), aborting(encode(&profile))?)?;
                log.insert(log_key(user_id, entry.seq), aborting(encode(&tx))?)?;
                hashes.insert(tx_hash.as_bytes(), user_id.as_bytes())?;

                Ok(LedgerReceipt {
                    new_balance: balance,
                    transaction: tx,
                })
            })
            .map_err(flatten_tx_error);

        match &result {
            Ok(receipt) => info!(
                user_id,
                package = package.name(),
                credits,
                new_balance = receipt.new_balance,
                "credits purchased"
            ),
            Err(e) => warn!(user_id, package = package.name(), error = %e, "purchase rejected"),
        }
        result
    }

    /// Grants referral or bonus credits.
    pub fn award(
        &self,
        user_id: &str,
        kind: TransactionType,
        credits: u64,
        description: &str,
    ) -> LedgerResult<LedgerReceipt> {
        if !matches!(kind, TransactionType::Referral | TransactionType::Bonus) {
            return Err(LedgerError::InvalidAward(kind));
        }
        let signed = i64::try_from(credits).map_err(|_| LedgerError::BalanceOverflow)?;
        if signed == 0 {
            return Err(LedgerError::InvalidAmount(0));
        }
        let entry = self.pending()?;

        let result = (self.db.profiles(), self.db.credit_log())
            .transaction(|(profiles, log)| -> ConflictableTransactionResult<LedgerReceipt, LedgerError> {
                let Some(bytes) = profiles.get(user_id.as_bytes())? else {
                    return abort(LedgerError::ProfileNotFound(user_id.to_string()));
                };
                let mut profile: Profile = aborting(decode(&bytes))?;

                let Some(balance) = profile.credits_balance.checked_add(credits) else {
                    return abort(LedgerError::BalanceOverflow);
                };
                profile.credits_balance = balance;
                profile.updated_at = entry.created_at;

                let tx = CreditTransaction {
                    id: entry.id.clone(),
                    user_id: user_id.to_string(),
                    kind,
                    credits: signed,
                    tx_hash: None,
                    description: Some(description.to_string()),
                    created_at: entry.created_at,
                };

                profiles.insert(user_id.as_bytes(), aborting(encode(&profile))?)?;
                log.insert(log_key(user_id, entry.seq), aborting(encode(&tx))?)?;

                Ok(LedgerReceipt {
                    new_balance: balance,
                    transaction: tx,
                })
            })
            .map_err(flatten_tx_error);

        if let Ok(receipt) = &result {
            info!(user_id, kind = %kind, credits, new_balance = receipt.new_balance, "credits awarded");
        }
        result
    }

    // -- Reads --------------------------------------------------------------

    pub fn profile(&self, user_id: &str) -> LedgerResult<Profile> {
        self.db
            .get_profile(user_id)?
            .ok_or_else(|| LedgerError::ProfileNotFound(user_id.to_string()))
    }

    pub fn balance(&self, user_id: &str) -> LedgerResult<u64> {
        Ok(self.profile(user_id)?.credits_balance)
    }

    /// Most recent log entries, newest first.
    pub fn recent_transactions(&self, user_id: &str, limit: usize) -> LedgerResult<Vec<CreditTransaction>> {
        Ok(self.db.recent_credit_log(user_id, limit)?)
    }

    /// [`recent_transactions`](Self::recent_transactions) with the default limit.
    pub fn recent(&self, user_id: &str) -> LedgerResult<Vec<CreditTransaction>> {
        self.recent_transactions(user_id, RECENT_TRANSACTIONS_LIMIT)
    }

    /// The full log, oldest first.
    pub fn transactions(&self, user_id: &str) -> LedgerResult<Vec<CreditTransaction>> {
        Ok(self.db.credit_log_for(user_id)?)
    }

    /// Replays the log and compares it with the stored balance. Reports
    /// drift; never rewrites the balance.
    pub fn audit(&self, user_id: &str) -> LedgerResult<LedgerAudit> {
        let stored_balance = self.balance(user_id)?;
        let ledger_sum = self
            .transactions(user_id)?
            .iter()
            .try_fold(0i64, |acc, tx| acc.checked_add(tx.credits))
            .ok_or(LedgerError::BalanceOverflow)?;
        let stored = i64::try_from(stored_balance).map_err(|_| LedgerError::BalanceOverflow)?;
        let audit = LedgerAudit {
            stored_balance,
            ledger_sum,
            drift: stored - ledger_sum,
        };
        if !audit.is_consistent() {
            warn!(user_id, stored_balance, ledger_sum, drift = audit.drift, "ledger drift detected");
        }
        Ok(audit)
    }
}
