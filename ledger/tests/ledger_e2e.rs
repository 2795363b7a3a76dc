//! End-to-end tests for the credit ledger.
//!
//! Accounts are created through the real signup path, so every balance in
//! these tests has a matching log entry and audits clean. Each test owns a
//! temporary database; nothing is shared between tests.

use std::sync::Arc;
use std::thread;

use grantees_ledger::auth::TokenIssuer;
use grantees_ledger::credits::CreditSummary;
use grantees_ledger::{
    AccountPolicy, AccountService, CreditPackage, GranteesDb, Ledger, LedgerError,
    TransactionType,
};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const SECRET: &str = "integration-secret-at-least-32-characters!!";

fn service(policy: AccountPolicy) -> AccountService {
    let db = GranteesDb::open_temporary().expect("temp db");
    AccountService::new(
        Ledger::new(db),
        TokenIssuer::new(SECRET).expect("issuer"),
        policy,
    )
}

/// Creates an account whose balance comes from a signup bonus.
fn user_with_balance(balance: u64) -> (AccountService, String) {
    let svc = service(AccountPolicy {
        signup_bonus: balance,
        referral_reward: 10,
    });
    let up = svc
        .sign_up("builder@example.com", "hunter22", None)
        .expect("signup");
    (svc, up.user_id)
}

/// A well-formed EVM transaction hash.
fn tx(n: u64) -> String {
    format!("0x{n:064x}")
}

// ---------------------------------------------------------------------------
// Consume
// ---------------------------------------------------------------------------

#[test]
fn consume_debits_and_logs() {
    let (svc, user) = user_with_balance(5);
    let ledger = svc.ledger();

    let receipt = ledger.consume(&user, 3, "AI action").unwrap();
    assert_eq!(receipt.new_balance, 2);
    assert_eq!(receipt.transaction.kind, TransactionType::Spend);
    assert_eq!(receipt.transaction.credits, -3);
    assert_eq!(receipt.transaction.description.as_deref(), Some("AI action"));

    assert_eq!(ledger.balance(&user).unwrap(), 2);
    let recent = ledger.recent(&user).unwrap();
    assert_eq!(recent[0].id, receipt.transaction.id);
    assert!(ledger.audit(&user).unwrap().is_consistent());
}

#[test]
fn insufficient_credits_changes_nothing() {
    let (svc, user) = user_with_balance(2);
    let ledger = svc.ledger();
    let before = ledger.transactions(&user).unwrap().len();

    match ledger.consume(&user, 3, "AI action") {
        Err(LedgerError::InsufficientCredits { required, available }) => {
            assert_eq!(required, 3);
            assert_eq!(available, 2);
        }
        other => panic!("expected InsufficientCredits, got {other:?}"),
    }

    assert_eq!(ledger.balance(&user).unwrap(), 2);
    assert_eq!(ledger.transactions(&user).unwrap().len(), before);
}

#[test]
fn concurrent_spends_never_overdraw() {
    let (svc, user) = user_with_balance(10);
    let ledger = Arc::new(svc.ledger().clone());

    let handles: Vec<_> = (0..25)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            let user = user.clone();
            thread::spawn(move || ledger.consume(&user, 1, "AI action").is_ok())
        })
        .collect();

    let successes = handles
        .into_iter()
        .map(|h| h.join().expect("thread panicked"))
        .filter(|ok| *ok)
        .count();

    assert_eq!(successes, 10);
    assert_eq!(ledger.balance(&user).unwrap(), 0);
    let spends = ledger
        .transactions(&user)
        .unwrap()
        .into_iter()
        .filter(|t| t.kind == TransactionType::Spend)
        .count();
    assert_eq!(spends, 10);
    assert!(ledger.audit(&user).unwrap().is_consistent());
}

// ---------------------------------------------------------------------------
// Purchase
// ---------------------------------------------------------------------------

#[test]
fn purchase_pro_from_zero() {
    let (svc, user) = user_with_balance(0);
    let ledger = svc.ledger();

    let receipt = ledger
        .purchase(&user, "0xWallet", CreditPackage::Pro, &tx(0xaaa))
        .unwrap();
    assert_eq!(receipt.new_balance, 500);
    assert_eq!(receipt.transaction.kind, TransactionType::Purchase);
    assert_eq!(receipt.transaction.credits, 500);
    assert_eq!(receipt.transaction.tx_hash, Some(tx(0xaaa)));
    assert_eq!(
        receipt.transaction.description.as_deref(),
        Some("Purchased pro package (500 credits)")
    );

    let profile = ledger.profile(&user).unwrap();
    assert_eq!(profile.wallet_address.as_deref(), Some("0xWallet"));
    assert_eq!(ledger.db().payment_owner(&tx(0xaaa)).unwrap(), Some(user.clone()));
}

#[test]
fn unknown_package_is_rejected_before_the_ledger() {
    assert!(matches!(
        "platinum".parse::<CreditPackage>(),
        Err(LedgerError::UnknownPackage(p)) if p == "platinum"
    ));
}

#[test]
fn replayed_hash_is_rejected_but_fresh_hash_credits_again() {
    let (svc, user) = user_with_balance(0);
    let ledger = svc.ledger();

    ledger
        .purchase(&user, "0xw", CreditPackage::Starter, &tx(1))
        .unwrap();
    assert!(matches!(
        ledger.purchase(&user, "0xw", CreditPackage::Starter, &tx(1)),
        Err(LedgerError::DuplicatePayment(h)) if h == tx(1)
    ));
    assert_eq!(ledger.balance(&user).unwrap(), 100);

    // Same package, new payment: credited again.
    let receipt = ledger
        .purchase(&user, "0xw", CreditPackage::Starter, &tx(2))
        .unwrap();
    assert_eq!(receipt.new_balance, 200);
}

#[test]
fn one_payment_in_several_casings_credits_once() {
    let (svc, user) = user_with_balance(0);
    let ledger = svc.ledger();
    let hash = "0xAbCdEf0123456789abcdef0123456789ABCDEF0123456789abcdef0123456789";

    let mut credited = 0;
    for casing in [hash.to_string(), hash.to_ascii_lowercase(), hash.to_ascii_uppercase()] {
        match ledger.purchase(&user, "0xw", CreditPackage::Starter, &casing) {
            Ok(_) => credited += 1,
            Err(LedgerError::DuplicatePayment(h)) => assert_eq!(h, hash.to_ascii_lowercase()),
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(credited, 1);
    assert_eq!(ledger.balance(&user).unwrap(), 100);
    assert!(ledger.audit(&user).unwrap().is_consistent());
}

#[test]
fn purchase_for_missing_profile() {
    let (svc, _) = user_with_balance(0);
    assert!(matches!(
        svc.ledger()
            .purchase("ghost", "0xw", CreditPackage::Starter, &tx(1)),
        Err(LedgerError::ProfileNotFound(_))
    ));
    // The failed purchase did not claim the hash.
    assert!(svc.ledger().db().payment_owner(&tx(1)).unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Referrals & summary
// ---------------------------------------------------------------------------

#[test]
fn referral_rewards_referrer() {
    let svc = service(AccountPolicy::default());
    let referrer = svc.sign_up("ref@example.com", "hunter22", None).unwrap();
    let code = referrer.profile.referral_code.clone();

    let invited = svc
        .sign_up("new@example.com", "hunter22", Some(&code.to_lowercase()))
        .unwrap();
    assert_eq!(
        invited.profile.referred_by.as_deref(),
        Some(referrer.user_id.as_str())
    );

    let ledger = svc.ledger();
    assert_eq!(ledger.balance(&referrer.user_id).unwrap(), 10);
    let log = ledger.transactions(&referrer.user_id).unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].kind, TransactionType::Referral);

    let summary = CreditSummary::load(ledger, &referrer.user_id).unwrap();
    assert_eq!(summary.referral_count, 1);
    assert_eq!(summary.credits, 10);
    // round(0.3 * 10 + 10 * 1 + 2 * 1) = 15
    assert_eq!(summary.credit_score, 15);
}

#[test]
fn unknown_referral_code_is_ignored() {
    let svc = service(AccountPolicy::default());
    let up = svc
        .sign_up("new@example.com", "hunter22", Some("NOPE0000"))
        .unwrap();
    assert!(up.profile.referred_by.is_none());
    assert_eq!(svc.ledger().balance(&up.user_id).unwrap(), 0);
}

#[test]
fn signup_bonus_is_logged() {
    let (svc, user) = user_with_balance(25);
    let log = svc.ledger().transactions(&user).unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].kind, TransactionType::Bonus);
    assert_eq!(log[0].credits, 25);
}

#[test]
fn ledger_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let user = {
        let db = GranteesDb::open(dir.path()).unwrap();
        let svc = AccountService::new(
            Ledger::new(db.clone()),
            TokenIssuer::new(SECRET).unwrap(),
            AccountPolicy {
                signup_bonus: 7,
                referral_reward: 10,
            },
        );
        let up = svc.sign_up("persist@example.com", "hunter22", None).unwrap();
        svc.ledger().consume(&up.user_id, 2, "AI action").unwrap();
        db.flush().unwrap();
        up.user_id
    };

    let ledger = Ledger::new(GranteesDb::open(dir.path()).unwrap());
    assert_eq!(ledger.balance(&user).unwrap(), 5);
    assert_eq!(ledger.transactions(&user).unwrap().len(), 2);
}
