//! # Ledger Configuration & Constants
//!
//! Every fixed number the ledger relies on lives here: package sizes and
//! prices, default request values, limits, and default ports. Runtime
//! settings (secrets, URLs, toggles) belong to the server's config file;
//! these are the values that stay the same across deployments.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

/// Crate version, reported by `/status` and `grantees-server version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ---------------------------------------------------------------------------
// Credit Packages
// ---------------------------------------------------------------------------

/// Credits granted by each package.
pub const STARTER_CREDITS: u64 = 100;
pub const PRO_CREDITS: u64 = 500;
pub const ENTERPRISE_CREDITS: u64 = 2_000;

/// Quoted package prices in nano-AVAX (1 AVAX = 10^9 nAVAX).
pub const STARTER_PRICE_NAVAX: u64 = 500_000_000;
pub const PRO_PRICE_NAVAX: u64 = 2_000_000_000;
pub const ENTERPRISE_PRICE_NAVAX: u64 = 7_000_000_000;

/// AVAX uses 18 decimals on the C-Chain, so 1 nAVAX = 10^9 wei.
pub const WEI_PER_NAVAX: u128 = 1_000_000_000;

// ---------------------------------------------------------------------------
// Ledger Defaults
// ---------------------------------------------------------------------------

/// Credits spent by a consume request that names no amount.
pub const DEFAULT_CONSUME_AMOUNT: i64 = 1;

/// Description recorded by a consume request that names none.
pub const DEFAULT_CONSUME_DESCRIPTION: &str = "AI action";

/// How many transactions the credit summary carries.
pub const RECENT_TRANSACTIONS_LIMIT: usize = 20;

/// Credits awarded to a referrer for every signup using their code.
pub const REFERRAL_REWARD: u64 = 10;

/// Credits granted on signup. Zero: new accounts start empty.
pub const DEFAULT_SIGNUP_BONUS: u64 = 0;

/// Length of generated referral codes.
pub const REFERRAL_CODE_LENGTH: usize = 8;

/// Upper bound of the credit score.
pub const MAX_CREDIT_SCORE: u64 = 100;

/// Prefix of synthetic payment hashes used when verification is off and
/// the client sent none.
pub const DEMO_TX_PREFIX: &str = "demo_";

/// Hex digits after `0x` in an EVM transaction hash.
pub const EVM_TX_HASH_HEX_DIGITS: usize = 64;

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

/// HS256 secrets shorter than this are refused.
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Lifetime of issued access tokens.
pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

/// Role and audience claim carried by every access token.
pub const AUTHENTICATED_ROLE: &str = "authenticated";

/// Minimum password length accepted at signup.
pub const MIN_PASSWORD_LENGTH: usize = 6;

// ---------------------------------------------------------------------------
// Email
// ---------------------------------------------------------------------------

pub const RESEND_API_BASE: &str = "https://api.resend.com";
pub const WELCOME_EMAIL_FROM: &str = "Grantees <onboarding@resend.dev>";
pub const WELCOME_EMAIL_SUBJECT: &str = "Welcome to Grantees! 🎉";

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

pub const DEFAULT_API_PORT: u16 = 8787;
pub const DEFAULT_METRICS_PORT: u16 = 9787;

/// Timeout for outbound HTTP calls (RPC node, email provider).
pub const OUTBOUND_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Converts a nano-AVAX amount to wei.
pub fn navax_to_wei(navax: u64) -> u128 {
    navax as u128 * WEI_PER_NAVAX
}
