//! Purchasable credit packages.

use serde::{Deserialize, Serialize};

use super::LedgerError;
use crate::config::{
    navax_to_wei, ENTERPRISE_CREDITS, ENTERPRISE_PRICE_NAVAX, PRO_CREDITS, PRO_PRICE_NAVAX,
    STARTER_CREDITS, STARTER_PRICE_NAVAX,
};

/// One of the three fixed bundles a builder can buy with AVAX.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreditPackage {
    Starter,
    Pro,
    Enterprise,
}

impl CreditPackage {
    pub const ALL: [CreditPackage; 3] = [
        CreditPackage::Starter,
        CreditPackage::Pro,
        CreditPackage::Enterprise,
    ];

    /// Wire name, as sent in the `package` field of a purchase request.
    pub fn name(&self) -> &'static str {
        match self {
            CreditPackage::Starter => "starter",
            CreditPackage::Pro => "pro",
            CreditPackage::Enterprise => "enterprise",
        }
    }

    pub fn credits(&self) -> u64 {
        match self {
            CreditPackage::Starter => STARTER_CREDITS,
            CreditPackage::Pro => PRO_CREDITS,
            CreditPackage::Enterprise => ENTERPRISE_CREDITS,
        }
    }

    /// Quoted price in nano-AVAX.
    pub fn price_navax(&self) -> u64 {
        match self {
            CreditPackage::Starter => STARTER_PRICE_NAVAX,
            CreditPackage::Pro => PRO_PRICE_NAVAX,
            CreditPackage::Enterprise => ENTERPRISE_PRICE_NAVAX,
        }
    }

    /// Minimum on-chain `value` a payment must carry, in wei.
    pub fn price_wei(&self) -> u128 {
        navax_to_wei(self.price_navax())
    }
}

impl std::fmt::Display for CreditPackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for CreditPackage {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "starter" => Ok(CreditPackage::Starter),
            "pro" => Ok(CreditPackage::Pro),
            "enterprise" => Ok(CreditPackage::Enterprise),
            other => Err(LedgerError::UnknownPackage(other.to_string())),
        }
    }
}
