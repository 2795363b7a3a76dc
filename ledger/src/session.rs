//! # Session Store
//!
//! Client-side view of "who is signed in and how many credits do they
//! have", held as explicit state with a visible lifecycle:
//!
//! ```text
//! establish(user) ──▶ active ──▶ refresh() ... ──▶ teardown() ──▶ empty
//! ```
//!
//! The cached balance is a convenience for gating UI. The ledger still
//! decides every spend, so a stale cache can at worst refuse early; it can
//! never overspend.

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, warn};

use crate::credits::{CreditSummary, Ledger, LedgerResult, Profile};

/// Outcome of the credit guard in front of paid features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    /// Nobody is signed in.
    SignInRequired,
    /// Signed in, but out of credits.
    UnlockRequired,
    Granted,
}

#[derive(Debug, Clone)]
struct SessionState {
    user_id: String,
    profile: Profile,
    summary: CreditSummary,
}

#[derive(Debug)]
pub struct SessionStore {
    ledger: Ledger,
    state: RwLock<Option<SessionState>>,
}

impl SessionStore {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            ledger,
            state: RwLock::new(None),
        }
    }

    /// Loads the profile and credit summary for `user_id`, replacing any
    /// previous session.
    pub fn establish(&self, user_id: &str) -> LedgerResult<()> {
        let loaded = self.load(user_id)?;
        *self.state.write() = Some(loaded);
        debug!(user_id, "session established");
        Ok(())
    }

    /// Reloads the active session. A no-op when signed out.
    pub fn refresh(&self) -> LedgerResult<()> {
        let Some(user_id) = self.user_id() else {
            return Ok(());
        };
        let loaded = self.load(&user_id)?;
        *self.state.write() = Some(loaded);
        Ok(())
    }

    /// Clears every cached value.
    pub fn teardown(&self) {
        if let Some(prev) = self.state.write().take() {
            debug!(user_id = %prev.user_id, "session torn down");
        }
    }

    fn load(&self, user_id: &str) -> LedgerResult<SessionState> {
        Ok(SessionState {
            user_id: user_id.to_string(),
            profile: self.ledger.profile(user_id)?,
            summary: CreditSummary::load(&self.ledger, user_id)?,
        })
    }

    pub fn is_active(&self) -> bool {
        self.state.read().is_some()
    }

    pub fn user_id(&self) -> Option<String> {
        self.state.read().as_ref().map(|s| s.user_id.clone())
    }

    pub fn profile(&self) -> Option<Profile> {
        self.state.read().as_ref().map(|s| s.profile.clone())
    }

    pub fn summary(&self) -> Option<CreditSummary> {
        self.state.read().as_ref().map(|s| s.summary.clone())
    }

    /// Cached balance; zero when signed out.
    pub fn credits(&self) -> u64 {
        self.state
            .read()
            .as_ref()
            .map(|s| s.summary.credits)
            .unwrap_or(0)
    }

    pub fn has_credits(&self, amount: u64) -> bool {
        self.is_active() && self.credits() >= amount
    }

    pub fn is_premium(&self) -> bool {
        self.state
            .read()
            .as_ref()
            .map(|s| s.profile.is_premium)
            .unwrap_or(false)
    }

    /// Spends through the ledger and refreshes the cache.
    ///
    /// Returns `false` without touching the ledger when signed out or when
    /// the cached balance is already too low.
    pub fn spend(&self, amount: u64, description: &str) -> bool {
        let Some(user_id) = self.user_id() else {
            return false;
        };
        if amount == 0 || !self.has_credits(amount) {
            return false;
        }
        let Ok(amount) = i64::try_from(amount) else {
            return false;
        };

        let spent = match self.ledger.consume(&user_id, amount, description) {
            Ok(_) => true,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "session spend rejected");
                false
            }
        };
        if let Err(e) = self.refresh() {
            warn!(user_id = %user_id, error = %e, "session refresh after spend failed");
        }
        spent
    }

    /// The credit guard for paid features.
    pub fn access(&self) -> Access {
        if !self.is_active() {
            Access::SignInRequired
        } else if self.credits() == 0 {
            Access::UnlockRequired
        } else {
            Access::Granted
        }
    }
}
