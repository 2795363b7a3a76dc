//! The credit summary shown on a builder's dashboard.

use serde::Serialize;

use super::{CreditTransaction, Ledger, LedgerResult};
use crate::config::MAX_CREDIT_SCORE;

/// Balance, referral standing, and recent activity for one user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CreditSummary {
    pub credits: u64,
    pub referral_code: String,
    pub referral_count: u64,
    pub recent_transactions: Vec<CreditTransaction>,
    pub credit_score: u64,
}

impl CreditSummary {
    pub fn load(ledger: &Ledger, user_id: &str) -> LedgerResult<Self> {
        let profile = ledger.profile(user_id)?;
        let referral_count = ledger.db().referral_count(user_id) as u64;
        let recent_transactions = ledger.recent(user_id)?;
        let credit_score = credit_score(
            profile.credits_balance,
            referral_count,
            recent_transactions.len() as u64,
        );

        Ok(Self {
            credits: profile.credits_balance,
            referral_code: profile.referral_code,
            referral_count,
            recent_transactions,
            credit_score,
        })
    }
}

/// `min(100, round(0.3 * credits + 10 * referrals + 2 * recent_tx))`,
/// computed in tenths to stay in integers.
pub fn credit_score(credits: u64, referrals: u64, recent_tx: u64) -> u64 {
    let tenths = credits
        .saturating_mul(3)
        .saturating_add(referrals.saturating_mul(100))
        .saturating_add(recent_tx.saturating_mul(20));
    (tenths.saturating_add(5) / 10).min(MAX_CREDIT_SCORE)
}
