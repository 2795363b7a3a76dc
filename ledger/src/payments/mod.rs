//! # Payment Verification
//!
//! A credit purchase is only as good as the payment behind it. Before the
//! ledger credits a package, the server asks a [`PaymentVerifier`] whether
//! the claimed transaction really paid for it.
//!
//! - [`UnverifiedPayments`] accepts every claim. It exists for local
//!   development and demo deployments and logs a warning each time.
//! - [`EvmRpcVerifier`] looks the transaction up on an EVM node (the
//!   Avalanche C-Chain in production) and checks sender, recipient,
//!   success, and value.
//!
//! Replay protection is not the verifier's job: the ledger refuses a
//! transaction hash it has already credited. Hashes are compared in their
//! canonical form (see [`normalize_tx_hash`]), so a hash resubmitted in
//! different letter case is still a replay.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::config::{DEMO_TX_PREFIX, EVM_TX_HASH_HEX_DIGITS};
use crate::credits::CreditPackage;

pub mod rpc;

pub use rpc::EvmRpcVerifier;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    #[error("transaction {0} not found")]
    NotFound(String),

    #[error("transaction {0} did not succeed")]
    Failed(String),

    #[error("transaction was sent from {actual}, not the claimed wallet")]
    WrongSender { actual: String },

    #[error("transaction was sent to {actual}, not the treasury")]
    WrongRecipient { actual: String },

    #[error("underpaid: expected {expected} wei, got {paid} wei")]
    Underpaid { expected: u128, paid: u128 },

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("tx_hash is required")]
    MissingTxHash,

    #[error("malformed tx_hash '{0}'")]
    MalformedTxHash(String),
}

/// Canonical form of a payment transaction hash.
///
/// An EVM hash must be `0x` followed by exactly 64 hex digits and comes
/// back lowercased. A server-issued demo hash (`demo_` plus up to 64 ASCII
/// alphanumerics) is lowercased the same way. Anything else is malformed.
pub fn normalize_tx_hash(raw: &str) -> Result<String, PaymentError> {
    let hash = raw.trim();
    if hash.is_empty() {
        return Err(PaymentError::MissingTxHash);
    }
    let lower = hash.to_ascii_lowercase();
    let well_formed = if let Some(digits) = lower.strip_prefix("0x") {
        digits.len() == EVM_TX_HASH_HEX_DIGITS && digits.bytes().all(|b| b.is_ascii_hexdigit())
    } else if let Some(id) = lower.strip_prefix(DEMO_TX_PREFIX) {
        !id.is_empty()
            && id.len() <= EVM_TX_HASH_HEX_DIGITS
            && id.bytes().all(|b| b.is_ascii_alphanumeric())
    } else {
        false
    };
    if well_formed {
        Ok(lower)
    } else {
        Err(PaymentError::MalformedTxHash(hash.to_string()))
    }
}

/// Returns `true` for a canonical hash that came from the demo flow rather
/// than a chain.
pub fn is_demo_tx_hash(hash: &str) -> bool {
    hash.starts_with(DEMO_TX_PREFIX)
}

/// What the client says it paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentClaim {
    pub tx_hash: String,
    pub wallet_address: String,
    pub package: CreditPackage,
}

impl PaymentClaim {
    /// Builds a claim with the hash in canonical form.
    pub fn new(
        tx_hash: &str,
        wallet_address: impl Into<String>,
        package: CreditPackage,
    ) -> Result<Self, PaymentError> {
        Ok(Self {
            tx_hash: normalize_tx_hash(tx_hash)?,
            wallet_address: wallet_address.into(),
            package,
        })
    }
}

#[async_trait]
pub trait PaymentVerifier: Send + Sync {
    /// Short name for status reporting.
    fn mode(&self) -> &'static str;

    /// Whether purchases must carry a real transaction hash.
    fn requires_tx_hash(&self) -> bool;

    /// `Ok(())` if the claim is backed by a valid payment.
    async fn verify(&self, claim: &PaymentClaim) -> Result<(), PaymentError>;
}

/// Accepts every claim.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnverifiedPayments;

#[async_trait]
impl PaymentVerifier for UnverifiedPayments {
    fn mode(&self) -> &'static str {
        "unverified"
    }

    fn requires_tx_hash(&self) -> bool {
        false
    }

    async fn verify(&self, claim: &PaymentClaim) -> Result<(), PaymentError> {
        warn!(
            tx_hash = %claim.tx_hash,
            wallet = %claim.wallet_address,
            package = claim.package.name(),
            "crediting purchase without on-chain verification"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "0xAbCdEf0123456789abcdef0123456789ABCDEF0123456789abcdef0123456789";

    #[test]
    fn hashes_normalize_to_lowercase() {
        let canonical = normalize_tx_hash(HASH).unwrap();
        assert_eq!(canonical, HASH.to_ascii_lowercase());
        assert_eq!(normalize_tx_hash(&HASH.to_ascii_uppercase()).unwrap(), canonical);
        assert_eq!(normalize_tx_hash(&format!("  {HASH} ")).unwrap(), canonical);
        assert_eq!(normalize_tx_hash("demo_ABC123").unwrap(), "demo_abc123");
    }

    #[test]
    fn malformed_hashes_are_refused() {
        let too_long = format!("{HASH}00");
        for bad in ["0xabc", "0x", "abcdef", "demo_", "demo_a-b", too_long.as_str()] {
            assert!(
                matches!(normalize_tx_hash(bad), Err(PaymentError::MalformedTxHash(_))),
                "{bad} should be malformed"
            );
        }
        assert_eq!(normalize_tx_hash("   "), Err(PaymentError::MissingTxHash));
        let not_hex = format!("0x{}", "g".repeat(64));
        assert!(normalize_tx_hash(&not_hex).is_err());
    }

    #[test]
    fn claim_carries_canonical_hash() {
        let claim = PaymentClaim::new(HASH, "0xabc", CreditPackage::Starter).unwrap();
        assert_eq!(claim.tx_hash, HASH.to_ascii_lowercase());
        assert!(!is_demo_tx_hash(&claim.tx_hash));
    }

    #[tokio::test]
    async fn unverified_accepts_anything() {
        let claim = PaymentClaim::new("demo_1", "0xabc", CreditPackage::Pro).unwrap();
        assert!(UnverifiedPayments.verify(&claim).await.is_ok());
        assert!(!UnverifiedPayments.requires_tx_hash());
        assert_eq!(UnverifiedPayments.mode(), "unverified");
    }
}
