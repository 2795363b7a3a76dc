//! EVM JSON-RPC payment verification.
//!
//! Two calls per claim:
//!
//! ```text
//! eth_getTransactionByHash   ──▶ from, to, value
//! eth_getTransactionReceipt  ──▶ status (0x1 = success)
//! ```
//!
//! A transaction that is pending (no receipt yet) counts as not found. The
//! node is always queried with the lowercase canonical hash.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::{is_demo_tx_hash, normalize_tx_hash, PaymentClaim, PaymentError, PaymentVerifier};
use crate::config::OUTBOUND_HTTP_TIMEOUT;

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcTransaction {
    from: String,
    to: Option<String>,
    value: String,
}

#[derive(Debug, Deserialize)]
struct RpcReceipt {
    status: Option<String>,
}

/// Verifies payments against an EVM node.
#[derive(Debug, Clone)]
pub struct EvmRpcVerifier {
    client: Client,
    rpc_url: String,
    treasury: String,
}

impl EvmRpcVerifier {
    pub fn new(rpc_url: impl Into<String>, treasury: impl Into<String>) -> Result<Self, PaymentError> {
        let client = Client::builder()
            .timeout(OUTBOUND_HTTP_TIMEOUT)
            .build()
            .map_err(|e| PaymentError::Rpc(e.to_string()))?;
        Ok(Self {
            client,
            rpc_url: rpc_url.into(),
            treasury: treasury.into(),
        })
    }

    pub fn treasury(&self) -> &str {
        &self.treasury
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        tx_hash: &str,
    ) -> Result<Option<T>, PaymentError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": [tx_hash],
        });

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| PaymentError::Rpc(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PaymentError::Rpc(format!(
                "{method} returned HTTP {}",
                response.status()
            )));
        }

        let parsed: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| PaymentError::Rpc(format!("{method}: {e}")))?;

        if let Some(err) = parsed.error {
            return Err(PaymentError::Rpc(format!(
                "{method} failed ({}): {}",
                err.code, err.message
            )));
        }
        Ok(parsed.result)
    }
}

#[async_trait]
impl PaymentVerifier for EvmRpcVerifier {
    fn mode(&self) -> &'static str {
        "evm-rpc"
    }

    fn requires_tx_hash(&self) -> bool {
        true
    }

    async fn verify(&self, claim: &PaymentClaim) -> Result<(), PaymentError> {
        let canonical = normalize_tx_hash(&claim.tx_hash)?;
        if is_demo_tx_hash(&canonical) {
            return Err(PaymentError::MalformedTxHash(claim.tx_hash.clone()));
        }
        let hash = canonical.as_str();
        debug!(tx_hash = hash, package = claim.package.name(), "verifying payment");

        let tx: RpcTransaction = self
            .call("eth_getTransactionByHash", hash)
            .await?
            .ok_or_else(|| PaymentError::NotFound(hash.to_string()))?;
        let receipt: RpcReceipt = self
            .call("eth_getTransactionReceipt", hash)
            .await?
            .ok_or_else(|| PaymentError::NotFound(hash.to_string()))?;

        if receipt.status.as_deref() != Some("0x1") {
            warn!(tx_hash = hash, status = ?receipt.status, "payment transaction reverted");
            return Err(PaymentError::Failed(hash.to_string()));
        }

        if !tx.from.eq_ignore_ascii_case(claim.wallet_address.trim()) {
            return Err(PaymentError::WrongSender { actual: tx.from });
        }

        let to = tx.to.unwrap_or_default();
        if !to.eq_ignore_ascii_case(&self.treasury) {
            return Err(PaymentError::WrongRecipient { actual: to });
        }

        let paid = parse_quantity(&tx.value)?;
        let expected = claim.package.price_wei();
        if paid < expected {
            return Err(PaymentError::Underpaid { expected, paid });
        }

        info!(tx_hash = hash, paid = %paid, package = claim.package.name(), "payment verified");
        Ok(())
    }
}

/// Parses an Ethereum hex quantity such as `"0x1bc16d674ec80000"`.
fn parse_quantity(raw: &str) -> Result<u128, PaymentError> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .ok_or_else(|| PaymentError::Rpc(format!("malformed quantity '{raw}'")))?;
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16).map_err(|_| PaymentError::Rpc(format!("malformed quantity '{raw}'")))
}
