//! Tests for the outbound HTTP integrations against a mock server: the EVM
//! JSON-RPC payment verifier and the Resend mailer.

use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use grantees_ledger::email::{welcome_email, EmailError, Mailer, ResendMailer};
use grantees_ledger::payments::{EvmRpcVerifier, PaymentClaim, PaymentError, PaymentVerifier};
use grantees_ledger::auth::TokenIssuer;
use grantees_ledger::{
    AccountPolicy, AccountService, CreditPackage, GranteesDb, Ledger, LedgerError,
};

// ---------------------------------------------------------------------------
// EVM RPC
// ---------------------------------------------------------------------------

const TREASURY: &str = "0x00000000000000000000000000000000000000Aa";
const WALLET: &str = "0x1111111111111111111111111111111111111111";
const TX: &str = "0x000000000000000000000000000000000000000000000000000000000000feed";

/// 0.5 AVAX, the starter price.
const HALF_AVAX: &str = "0x6f05b59d3b20000";

fn rpc_ok(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": result}))
}

async fn mount_rpc(server: &MockServer, tx: Value, receipt: Value) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_getTransactionByHash"})))
        .respond_with(rpc_ok(tx))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_getTransactionReceipt"})))
        .respond_with(rpc_ok(receipt))
        .mount(server)
        .await;
}

fn claim(package: CreditPackage) -> PaymentClaim {
    PaymentClaim {
        tx_hash: TX.into(),
        wallet_address: WALLET.into(),
        package,
    }
}

fn transfer(from: &str, to: &str, value: &str) -> Value {
    json!({"hash": TX, "from": from, "to": to, "value": value})
}

#[tokio::test]
async fn valid_payment_is_accepted() {
    let server = MockServer::start().await;
    // Treasury casing differs from the node's lowercase answer.
    mount_rpc(
        &server,
        transfer(WALLET, &TREASURY.to_lowercase(), HALF_AVAX),
        json!({"status": "0x1"}),
    )
    .await;

    let verifier = EvmRpcVerifier::new(server.uri(), TREASURY).unwrap();
    verifier.verify(&claim(CreditPackage::Starter)).await.unwrap();
}

#[tokio::test]
async fn underpayment_is_rejected() {
    let server = MockServer::start().await;
    mount_rpc(&server, transfer(WALLET, TREASURY, HALF_AVAX), json!({"status": "0x1"})).await;

    let verifier = EvmRpcVerifier::new(server.uri(), TREASURY).unwrap();
    let err = verifier.verify(&claim(CreditPackage::Pro)).await.unwrap_err();
    assert_eq!(
        err,
        PaymentError::Underpaid {
            expected: 2_000_000_000_000_000_000,
            paid: 500_000_000_000_000_000,
        }
    );
}

#[tokio::test]
async fn reverted_transaction_is_rejected() {
    let server = MockServer::start().await;
    mount_rpc(&server, transfer(WALLET, TREASURY, HALF_AVAX), json!({"status": "0x0"})).await;

    let verifier = EvmRpcVerifier::new(server.uri(), TREASURY).unwrap();
    assert_eq!(
        verifier.verify(&claim(CreditPackage::Starter)).await,
        Err(PaymentError::Failed(TX.into()))
    );
}

#[tokio::test]
async fn wrong_sender_and_recipient() {
    let server = MockServer::start().await;
    mount_rpc(
        &server,
        transfer("0x2222222222222222222222222222222222222222", TREASURY, HALF_AVAX),
        json!({"status": "0x1"}),
    )
    .await;
    let verifier = EvmRpcVerifier::new(server.uri(), TREASURY).unwrap();
    assert!(matches!(
        verifier.verify(&claim(CreditPackage::Starter)).await,
        Err(PaymentError::WrongSender { .. })
    ));

    let server = MockServer::start().await;
    mount_rpc(
        &server,
        transfer(WALLET, "0x3333333333333333333333333333333333333333", HALF_AVAX),
        json!({"status": "0x1"}),
    )
    .await;
    let verifier = EvmRpcVerifier::new(server.uri(), TREASURY).unwrap();
    assert!(matches!(
        verifier.verify(&claim(CreditPackage::Starter)).await,
        Err(PaymentError::WrongRecipient { .. })
    ));
}

#[tokio::test]
async fn unknown_transaction_is_not_found() {
    let server = MockServer::start().await;
    mount_rpc(&server, Value::Null, Value::Null).await;

    let verifier = EvmRpcVerifier::new(server.uri(), TREASURY).unwrap();
    assert_eq!(
        verifier.verify(&claim(CreditPackage::Starter)).await,
        Err(PaymentError::NotFound(TX.into()))
    );
}

#[tokio::test]
async fn empty_hash_is_refused_without_calling_the_node() {
    let server = MockServer::start().await;
    let verifier = EvmRpcVerifier::new(server.uri(), TREASURY).unwrap();
    let mut c = claim(CreditPackage::Starter);
    c.tx_hash = "  ".into();
    assert_eq!(verifier.verify(&c).await, Err(PaymentError::MissingTxHash));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn node_is_queried_with_the_canonical_hash() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_getTransactionByHash", "params": [TX]})))
        .respond_with(rpc_ok(transfer(WALLET, TREASURY, HALF_AVAX)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_getTransactionReceipt", "params": [TX]})))
        .respond_with(rpc_ok(json!({"status": "0x1"})))
        .mount(&server)
        .await;

    let verifier = EvmRpcVerifier::new(server.uri(), TREASURY).unwrap();
    let mut c = claim(CreditPackage::Starter);
    c.tx_hash = TX.to_ascii_uppercase().replacen("0X", "0x", 1);
    assert_eq!(verifier.verify(&c).await, Ok(()));
}

#[tokio::test]
async fn malformed_and_demo_hashes_never_reach_the_node() {
    let server = MockServer::start().await;
    let verifier = EvmRpcVerifier::new(server.uri(), TREASURY).unwrap();

    for hash in ["0xfeed", "demo_abc123", "feed"] {
        let mut c = claim(CreditPackage::Starter);
        c.tx_hash = hash.into();
        assert!(matches!(
            verifier.verify(&c).await,
            Err(PaymentError::MalformedTxHash(_))
        ));
    }
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn verified_payment_is_credited_once_whatever_the_casing() {
    let server = MockServer::start().await;
    mount_rpc(&server, transfer(WALLET, TREASURY, HALF_AVAX), json!({"status": "0x1"})).await;
    let verifier = EvmRpcVerifier::new(server.uri(), TREASURY).unwrap();

    let accounts = AccountService::new(
        Ledger::new(GranteesDb::open_temporary().unwrap()),
        TokenIssuer::new("provider-test-secret-at-least-32-characters").unwrap(),
        AccountPolicy::default(),
    );
    let user = accounts
        .sign_up("payer@example.com", "hunter22", None)
        .unwrap()
        .user_id;
    let ledger = accounts.ledger();

    let mixed: String = TX
        .chars()
        .enumerate()
        .map(|(i, c)| if i % 2 == 0 { c.to_ascii_uppercase() } else { c })
        .collect::<String>()
        .replacen("0X", "0x", 1);
    let upper = TX.to_ascii_uppercase().replacen("0X", "0x", 1);

    let mut credited = 0;
    for hash in [TX.to_string(), upper, mixed] {
        let c = PaymentClaim::new(&hash, WALLET, CreditPackage::Starter).unwrap();
        verifier.verify(&c).await.unwrap();
        match ledger.purchase(&user, WALLET, c.package, &c.tx_hash) {
            Ok(_) => credited += 1,
            Err(LedgerError::DuplicatePayment(h)) => assert_eq!(h, TX),
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(credited, 1);
    assert_eq!(ledger.balance(&user).unwrap(), 100);
}

#[tokio::test]
async fn rpc_error_body_surfaces() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32000, "message": "header not found"}
        })))
        .mount(&server)
        .await;

    let verifier = EvmRpcVerifier::new(server.uri(), TREASURY).unwrap();
    match verifier.verify(&claim(CreditPackage::Starter)).await {
        Err(PaymentError::Rpc(msg)) => assert!(msg.contains("header not found")),
        other => panic!("expected RPC error, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Resend
// ---------------------------------------------------------------------------

#[tokio::test]
async fn welcome_email_is_posted_with_bearer_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(header("authorization", "Bearer re_test"))
        .and(body_partial_json(json!({
            "to": ["ada@example.com"],
            "subject": "Welcome to Grantees! 🎉"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "email_123"})))
        .expect(1)
        .mount(&server)
        .await;

    let mailer = ResendMailer::with_base(server.uri(), "re_test").unwrap();
    let data = mailer
        .send(&welcome_email("ada@example.com").unwrap())
        .await
        .unwrap();
    assert_eq!(data["id"], "email_123");
}

#[tokio::test]
async fn provider_error_message_is_passed_through() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({"message": "Invalid `to` field"})),
        )
        .mount(&server)
        .await;

    let mailer = ResendMailer::with_base(server.uri(), "re_test").unwrap();
    let err = mailer
        .send(&welcome_email("ada@example.com").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err, EmailError::Rejected("Invalid `to` field".into()));
}

#[tokio::test]
async fn provider_error_without_message_uses_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mailer = ResendMailer::with_base(server.uri(), "re_test").unwrap();
    let err = mailer
        .send(&welcome_email("ada@example.com").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err, EmailError::Rejected("Failed to send email".into()));
}
