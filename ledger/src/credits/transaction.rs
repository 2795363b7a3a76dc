//! Credit log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a balance changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Credits bought with an on-chain payment.
    Purchase,
    /// Credits spent on an AI action.
    Spend,
    /// Credits earned by referring a new builder.
    Referral,
    /// Promotional credits, e.g. a signup bonus.
    Bonus,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Purchase => "purchase",
            TransactionType::Spend => "spend",
            TransactionType::Referral => "referral",
            TransactionType::Bonus => "bonus",
        }
    }

    /// Whether entries of this kind add credits.
    pub fn is_credit(&self) -> bool {
        !matches!(self, TransactionType::Spend)
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One append-only entry in a user's credit log.
///
/// `credits` is signed: positive for purchases, referrals, and bonuses,
/// negative for spends. Summing a user's log reproduces their balance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditTransaction {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub credits: i64,
    /// On-chain payment hash, purchases only.
    pub tx_hash: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_shape() {
        let tx = CreditTransaction {
            id: "t1".into(),
            user_id: "u1".into(),
            kind: TransactionType::Spend,
            credits: -3,
            tx_hash: None,
            description: Some("AI action".into()),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["type"], "spend");
        assert_eq!(json["credits"], -3);
        assert!(json["tx_hash"].is_null());
    }

    #[test]
    fn only_spend_debits() {
        assert!(!TransactionType::Spend.is_credit());
        assert!(TransactionType::Purchase.is_credit());
        assert!(TransactionType::Referral.is_credit());
        assert!(TransactionType::Bonus.is_credit());
    }
}
