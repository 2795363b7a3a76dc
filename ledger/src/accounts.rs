//! # Accounts
//!
//! Email/password signup and signin, referral bookkeeping, and the
//! profile edits a builder makes outside the credit flow.
//!
//! Signup is one transaction over five trees. It writes the credential
//! row, the profile, and the referral code index. It also writes the
//! signup bonus with its log entry and, when a valid code was given, the
//! referral edge together with the referrer's reward and its log entry.
//! A referral is never counted without the credit it earned.

use chrono::Utc;
use grantees_catalog::{BuilderProfile, OnboardingError};
use serde::{Deserialize, Serialize};
use sled::transaction::{abort, ConflictableTransactionResult};
use sled::Transactional;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{hash_password, verify_password, AuthError, TokenIssuer};
use crate::config::{
    DEFAULT_SIGNUP_BONUS, MIN_PASSWORD_LENGTH, REFERRAL_CODE_LENGTH, REFERRAL_REWARD,
};
use crate::credits::{CreditTransaction, Ledger, LedgerError, Profile, TransactionType};
use crate::storage::db::{aborting, decode, encode, flatten_tx_error, log_key, referral_key};
use crate::storage::{DbError, Referral, UserRecord};

/// Attempts at drawing an unused referral code before giving up.
const REFERRAL_CODE_ATTEMPTS: usize = 8;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Password must be at least {min} characters")]
    WeakPassword { min: usize },

    #[error("An account with this email already exists")]
    EmailTaken,

    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("profile not found for user {0}")]
    ProfileNotFound(String),

    /// Every generated referral code was already taken.
    #[error("could not allocate a referral code")]
    ReferralCodeExhausted,

    #[error(transparent)]
    Onboarding(#[from] OnboardingError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("storage error: {0}")]
    Storage(#[from] DbError),
}

/// Internal abort reason for the signup transaction.
#[derive(Debug)]
enum SignupAbort {
    EmailTaken,
    CodeTaken,
    /// The referrer's balance cannot absorb the reward.
    RewardOverflow,
    Storage(DbError),
}

/// Log entries written with a new account. Ids, sequence numbers, and
/// timestamps are fixed before the transaction, so a retried closure
/// writes the same rows.
struct SignupCredits {
    bonus: Option<(u64, CreditTransaction)>,
    referral: Option<(u64, CreditTransaction)>,
}

impl From<DbError> for SignupAbort {
    fn from(err: DbError) -> Self {
        SignupAbort::Storage(err)
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Credit amounts granted around signup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPolicy {
    /// Credits a new account starts with.
    pub signup_bonus: u64,
    /// Credits the referrer earns per signup.
    pub referral_reward: u64,
}

impl Default for AccountPolicy {
    fn default() -> Self {
        Self {
            signup_bonus: DEFAULT_SIGNUP_BONUS,
            referral_reward: REFERRAL_REWARD,
        }
    }
}

/// A new account with its first access token.
#[derive(Debug, Clone, Serialize)]
pub struct SignUp {
    pub user_id: String,
    pub access_token: String,
    pub profile: Profile,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignIn {
    pub user_id: String,
    pub access_token: String,
}

/// Editable profile fields. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub wallet_address: Option<String>,
}

// ---------------------------------------------------------------------------
// AccountService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AccountService {
    ledger: Ledger,
    tokens: TokenIssuer,
    policy: AccountPolicy,
}

impl AccountService {
    pub fn new(ledger: Ledger, tokens: TokenIssuer, policy: AccountPolicy) -> Self {
        Self {
            ledger,
            tokens,
            policy,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    /// Creates an account and returns its first access token.
    ///
    /// An unknown `referral_code` is ignored rather than rejected. The
    /// signup bonus and the referrer's reward commit with the account or
    /// not at all.
    pub fn sign_up(
        &self,
        email: &str,
        password: &str,
        referral_code: Option<&str>,
    ) -> Result<SignUp, AccountError> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AccountError::WeakPassword {
                min: MIN_PASSWORD_LENGTH,
            });
        }

        let db = self.ledger.db();
        let referrer = match referral_code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => {
                let found = db.user_for_referral_code(&code.to_ascii_uppercase())?;
                if found.is_none() {
                    warn!(code, "ignoring unknown referral code");
                }
                found
            }
            None => None,
        };

        let user = UserRecord {
            id: Uuid::new_v4().to_string(),
            email: email.clone(),
            password_hash: hash_password(password)?,
            created_at: Utc::now(),
        };
        let credits = self.signup_credits(&user, referrer.as_deref())?;

        let mut profile = None;
        for _ in 0..REFERRAL_CODE_ATTEMPTS {
            let mut candidate = Profile::new(&user.id, &email, generate_referral_code());
            candidate.referred_by = referrer.clone();
            candidate.credits_balance = self.policy.signup_bonus;

            match self.insert_account(&user, &candidate, referrer.as_deref(), &credits) {
                Ok(()) => {
                    profile = Some(candidate);
                    break;
                }
                Err(SignupAbort::CodeTaken) => continue,
                Err(SignupAbort::EmailTaken) => return Err(AccountError::EmailTaken),
                Err(SignupAbort::RewardOverflow) => {
                    return Err(AccountError::Ledger(LedgerError::BalanceOverflow))
                }
                Err(SignupAbort::Storage(e)) => return Err(e.into()),
            }
        }
        let profile = profile.ok_or(AccountError::ReferralCodeExhausted)?;
        info!(
            user_id = %user.id,
            referred = referrer.is_some(),
            bonus = self.policy.signup_bonus,
            "account created"
        );
        if let (Some(referrer_id), Some(_)) = (&referrer, &credits.referral) {
            info!(
                referrer_id = %referrer_id,
                credits = self.policy.referral_reward,
                "referral reward credited"
            );
        }

        let access_token = self.tokens.issue(&user.id, &email)?;
        Ok(SignUp {
            user_id: user.id,
            access_token,
            profile,
        })
    }

    fn signup_credits(
        &self,
        user: &UserRecord,
        referrer: Option<&str>,
    ) -> Result<SignupCredits, AccountError> {
        let db = self.ledger.db();
        let entry = |user_id: &str,
                     kind: TransactionType,
                     credits: u64,
                     description: String|
         -> Result<(u64, CreditTransaction), AccountError> {
            let credits = i64::try_from(credits).map_err(|_| LedgerError::BalanceOverflow)?;
            let tx = CreditTransaction {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                kind,
                credits,
                tx_hash: None,
                description: Some(description),
                created_at: user.created_at,
            };
            Ok((db.generate_id()?, tx))
        };

        let bonus = match self.policy.signup_bonus {
            0 => None,
            n => Some(entry(&user.id, TransactionType::Bonus, n, "Welcome bonus".into())?),
        };
        let referral = match (referrer, self.policy.referral_reward) {
            (Some(referrer_id), n) if n > 0 => Some(entry(
                referrer_id,
                TransactionType::Referral,
                n,
                format!("Referral: {} joined", user.email),
            )?),
            _ => None,
        };
        Ok(SignupCredits { bonus, referral })
    }

    fn insert_account(
        &self,
        user: &UserRecord,
        profile: &Profile,
        referrer: Option<&str>,
        credits: &SignupCredits,
    ) -> Result<(), SignupAbort> {
        let db = self.ledger.db();
        (
            db.users(),
            db.profiles(),
            db.referral_codes(),
            db.referrals(),
            db.credit_log(),
        )
            .transaction(|(users, profiles, codes, referrals, log)| -> ConflictableTransactionResult<(), SignupAbort> {
                if users.get(user.email.as_bytes())?.is_some() {
                    return abort(SignupAbort::EmailTaken);
                }
                if codes.get(profile.referral_code.as_bytes())?.is_some() {
                    return abort(SignupAbort::CodeTaken);
                }

                users.insert(user.email.as_bytes(), aborting(encode(user))?)?;
                profiles.insert(user.id.as_bytes(), aborting(encode(profile))?)?;
                codes.insert(profile.referral_code.as_bytes(), user.id.as_bytes())?;

                if let Some((seq, tx)) = &credits.bonus {
                    log.insert(log_key(&user.id, *seq), aborting(encode(tx))?)?;
                }

                // A code whose owner has no profile records no referral.
                let Some(referrer_id) = referrer else {
                    return Ok(());
                };
                let Some(bytes) = profiles.get(referrer_id.as_bytes())? else {
                    return Ok(());
                };

                let edge = Referral {
                    referrer_id: referrer_id.to_string(),
                    referred_id: user.id.clone(),
                    created_at: user.created_at,
                };
                referrals.insert(
                    referral_key(referrer_id, &user.id),
                    aborting(encode(&edge))?,
                )?;

                if let Some((seq, tx)) = &credits.referral {
                    let mut referrer_profile: Profile = aborting(decode(&bytes))?;
                    let Some(balance) = referrer_profile
                        .credits_balance
                        .checked_add(tx.credits.unsigned_abs())
                    else {
                        return abort(SignupAbort::RewardOverflow);
                    };
                    referrer_profile.credits_balance = balance;
                    referrer_profile.updated_at = tx.created_at;
                    profiles.insert(referrer_id.as_bytes(), aborting(encode(&referrer_profile))?)?;
                    log.insert(log_key(referrer_id, *seq), aborting(encode(tx))?)?;
                }
                Ok(())
            })
            .map_err(flatten_tx_error)
    }

    /// Checks credentials and returns a fresh access token.
    pub fn sign_in(&self, email: &str, password: &str) -> Result<SignIn, AccountError> {
        let email = normalize_email(email).map_err(|_| AccountError::InvalidCredentials)?;
        let user = self
            .ledger
            .db()
            .get_user(&email)?
            .ok_or(AccountError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash)? {
            warn!(user_id = %user.id, "sign-in rejected: wrong password");
            return Err(AccountError::InvalidCredentials);
        }

        let access_token = self.tokens.issue(&user.id, &user.email)?;
        Ok(SignIn {
            user_id: user.id,
            access_token,
        })
    }

    // -- Profile edits ------------------------------------------------------

    pub fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<Profile, AccountError> {
        let display_name = update.display_name.as_deref().map(str::trim);
        let wallet = update.wallet_address.as_deref().map(str::trim);

        self.edit(user_id, |p| {
            if let Some(name) = display_name {
                p.display_name = (!name.is_empty()).then(|| name.to_string());
            }
            if let Some(addr) = wallet {
                p.wallet_address = (!addr.is_empty()).then(|| addr.to_string());
            }
        })
    }

    /// Stores a completed onboarding profile.
    pub fn set_builder_profile(
        &self,
        user_id: &str,
        builder: &BuilderProfile,
    ) -> Result<Profile, AccountError> {
        builder.validate()?;
        let profile = self.edit(user_id, |p| {
            if p.display_name.is_none() {
                p.display_name = Some(builder.display_name.clone());
            }
            p.builder = Some(builder.clone());
        })?;
        info!(user_id, "onboarding complete");
        Ok(profile)
    }

    /// Sets or clears premium status.
    ///
    /// Unlocking stamps `premium_unlocked_at` the first time and records
    /// the stake transaction; revoking clears both.
    pub fn update_premium(
        &self,
        user_id: &str,
        is_premium: bool,
        stake_tx_hash: Option<&str>,
    ) -> Result<Profile, AccountError> {
        let now = Utc::now();
        let profile = self.edit(user_id, |p| {
            if is_premium {
                if !p.is_premium {
                    p.premium_unlocked_at = Some(now);
                }
                p.is_premium = true;
                if let Some(hash) = stake_tx_hash {
                    p.stake_tx_hash = Some(hash.to_string());
                }
            } else {
                p.is_premium = false;
                p.premium_unlocked_at = None;
                p.stake_tx_hash = None;
            }
        })?;
        info!(user_id, is_premium, "premium status updated");
        Ok(profile)
    }

    fn edit<F: Fn(&mut Profile)>(&self, user_id: &str, f: F) -> Result<Profile, AccountError> {
        self.ledger
            .db()
            .update_profile(user_id, f)?
            .ok_or_else(|| AccountError::ProfileNotFound(user_id.to_string()))
    }
}

/// Trims and lowercases an email; rejects anything without a local part
/// and a domain.
pub fn normalize_email(email: &str) -> Result<String, AccountError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(AccountError::InvalidEmail),
    }
}

/// Random uppercase hex code, e.g. `"3FA9C01B"`.
fn generate_referral_code() -> String {
    let bytes: [u8; REFERRAL_CODE_LENGTH / 2] = rand::random();
    hex::encode_upper(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::GranteesDb;

    const SECRET: &str = "test-secret-that-is-at-least-32-characters-long";

    fn service(policy: AccountPolicy) -> AccountService {
        let ledger = Ledger::new(GranteesDb::open_temporary().unwrap());
        AccountService::new(ledger, TokenIssuer::new(SECRET).unwrap(), policy)
    }

    #[test]
    fn email_normalisation() {
        assert_eq!(normalize_email("  Ada@Example.COM ").unwrap(), "ada@example.com");
        assert!(matches!(normalize_email("nope"), Err(AccountError::InvalidEmail)));
        assert!(matches!(normalize_email("@example.com"), Err(AccountError::InvalidEmail)));
    }

    #[test]
    fn referral_codes_are_eight_hex_chars() {
        let code = generate_referral_code();
        assert_eq!(code.len(), REFERRAL_CODE_LENGTH);
        assert!(code.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn signup_then_signin() {
        let svc = service(AccountPolicy::default());
        let up = svc.sign_up("Ada@Example.com", "hunter22", None).unwrap();
        assert_eq!(up.profile.email, "ada@example.com");
        assert_eq!(up.profile.credits_balance, 0);

        let claims = svc.tokens().verify(&up.access_token).unwrap();
        assert_eq!(claims.sub, up.user_id);

        let inn = svc.sign_in("ada@example.com", "hunter22").unwrap();
        assert_eq!(inn.user_id, up.user_id);
        assert!(matches!(
            svc.sign_in("ada@example.com", "wrong-pass"),
            Err(AccountError::InvalidCredentials)
        ));
        assert!(matches!(
            svc.sign_in("nobody@example.com", "hunter22"),
            Err(AccountError::InvalidCredentials)
        ));
    }

    #[test]
    fn short_password_rejected() {
        let svc = service(AccountPolicy::default());
        assert!(matches!(
            svc.sign_up("ada@example.com", "12345", None),
            Err(AccountError::WeakPassword { min: 6 })
        ));
    }

    #[test]
    fn duplicate_email_rejected() {
        let svc = service(AccountPolicy::default());
        svc.sign_up("ada@example.com", "hunter22", None).unwrap();
        assert!(matches!(
            svc.sign_up(" ADA@example.com", "hunter22", None),
            Err(AccountError::EmailTaken)
        ));
        assert_eq!(svc.ledger().db().user_count(), 1);
    }

    #[test]
    fn referral_edge_and_reward_commit_together() {
        let svc = service(AccountPolicy::default());
        let referrer = svc.sign_up("ref@example.com", "hunter22", None).unwrap();
        let code = referrer.profile.referral_code.to_ascii_lowercase();

        let referred = svc
            .sign_up("new@example.com", "hunter22", Some(&code))
            .unwrap();
        assert_eq!(referred.profile.referred_by.as_deref(), Some(referrer.user_id.as_str()));

        let ledger = svc.ledger();
        assert_eq!(ledger.db().referral_count(&referrer.user_id), 1);
        assert_eq!(ledger.balance(&referrer.user_id).unwrap(), REFERRAL_REWARD);
        let log = ledger.transactions(&referrer.user_id).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].kind, TransactionType::Referral);
        assert!(ledger.audit(&referrer.user_id).unwrap().is_consistent());
    }

    #[test]
    fn failed_reward_rolls_back_the_whole_signup() {
        let svc = service(AccountPolicy::default());
        let referrer = svc.sign_up("ref@example.com", "hunter22", None).unwrap();
        svc.ledger()
            .db()
            .update_profile(&referrer.user_id, |p| p.credits_balance = u64::MAX)
            .unwrap();

        assert!(matches!(
            svc.sign_up("new@example.com", "hunter22", Some(&referrer.profile.referral_code)),
            Err(AccountError::Ledger(LedgerError::BalanceOverflow))
        ));
        let db = svc.ledger().db();
        assert_eq!(db.user_count(), 1);
        assert_eq!(db.profile_count(), 1);
        assert_eq!(db.referral_count(&referrer.user_id), 0);
        assert!(db.get_user("new@example.com").unwrap().is_none());
    }

    #[test]
    fn signup_bonus_lands_with_its_log_entry() {
        let svc = service(AccountPolicy {
            signup_bonus: 25,
            referral_reward: REFERRAL_REWARD,
        });
        let up = svc.sign_up("ada@example.com", "hunter22", None).unwrap();
        assert_eq!(up.profile.credits_balance, 25);

        let log = svc.ledger().transactions(&up.user_id).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].kind, TransactionType::Bonus);
        assert_eq!(log[0].credits, 25);
        assert!(svc.ledger().audit(&up.user_id).unwrap().is_consistent());
    }

    #[test]
    fn premium_toggle() {
        let svc = service(AccountPolicy::default());
        let up = svc.sign_up("ada@example.com", "hunter22", None).unwrap();

        let p = svc.update_premium(&up.user_id, true, Some("0xstake")).unwrap();
        assert!(p.is_premium);
        assert!(p.premium_unlocked_at.is_some());
        assert_eq!(p.stake_tx_hash.as_deref(), Some("0xstake"));

        let p = svc.update_premium(&up.user_id, false, None).unwrap();
        assert!(!p.is_premium);
        assert!(p.premium_unlocked_at.is_none());
        assert!(p.stake_tx_hash.is_none());
    }

    #[test]
    fn profile_update_trims_and_clears() {
        let svc = service(AccountPolicy::default());
        let up = svc.sign_up("ada@example.com", "hunter22", None).unwrap();

        let p = svc
            .update_profile(
                &up.user_id,
                &ProfileUpdate {
                    display_name: Some("  Ada  ".into()),
                    wallet_address: Some("0xAbC".into()),
                },
            )
            .unwrap();
        assert_eq!(p.display_name.as_deref(), Some("Ada"));
        assert_eq!(p.wallet_address.as_deref(), Some("0xAbC"));

        let p = svc
            .update_profile(
                &up.user_id,
                &ProfileUpdate {
                    display_name: None,
                    wallet_address: Some(String::new()),
                },
            )
            .unwrap();
        assert_eq!(p.display_name.as_deref(), Some("Ada"));
        assert!(p.wallet_address.is_none());
    }

    #[test]
    fn edits_on_missing_profile() {
        let svc = service(AccountPolicy::default());
        assert!(matches!(
            svc.update_premium("ghost", true, None),
            Err(AccountError::ProfileNotFound(_))
        ));
    }
}
