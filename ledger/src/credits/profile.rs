//! The per-user profile row that carries the authoritative balance.

use chrono::{DateTime, Utc};
use grantees_catalog::BuilderProfile;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A builder's account profile.
///
/// `credits_balance` is unsigned, so a negative balance cannot be stored.
/// Ledger mutations write it in the same storage transaction as the log
/// entry that explains the change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub user_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub wallet_address: Option<String>,
    pub credits_balance: u64,
    pub is_premium: bool,
    pub premium_unlocked_at: Option<DateTime<Utc>>,
    pub stake_tx_hash: Option<String>,
    pub referral_code: String,
    /// User id of whoever referred this builder.
    pub referred_by: Option<String>,
    /// Filled in by the onboarding wizard.
    pub builder: Option<BuilderProfile>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// A fresh profile with a zero balance.
    pub fn new(user_id: &str, email: &str, referral_code: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            email: email.to_string(),
            display_name: None,
            wallet_address: None,
            credits_balance: 0,
            is_premium: false,
            premium_unlocked_at: None,
            stake_tx_hash: None,
            referral_code,
            referred_by: None,
            builder: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Marks the row as modified now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Whether the onboarding wizard has been completed.
    pub fn is_onboarded(&self) -> bool {
        self.builder.is_some()
    }
}
