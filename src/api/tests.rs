use super::*;
use crate::chain::MockChainClient;
use crate::config::Settings;
use crate::wallet::signer_from_private_key;

use axum::body::{to_bytes, Body};
use axum::http::Request as HttpRequest;
use ethers::signers::Signer;
use ethers::types::{H256, U256};
use ethers::utils::keccak256;
use serde_json::{json, Value};
use tower::ServiceExt;

const TEST_KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
const TO: &str = "0xfb6916095ca1df60bb79ce92ce3ea74c37c5d359";

fn settings() -> Settings {
    let mut settings = Settings::from_toml_str(
        r#"
        [server]
        host = "127.0.0.1"
        port = 0

        [chain]
        name = "testnet"
        rpc_urls = ["http://127.0.0.1:8545"]
        "#,
    )
    .unwrap();
    settings.transactions.retry_delay_ms = 0;
    settings
}

fn app(client: MockChainClient) -> Router {
    let settings = settings();
    router(AppState::new(Arc::new(client), &settings), &settings.server)
}

/// Node with 1 gwei gas price, 21000 gas transfers and the given balance
fn node(balance: U256) -> MockChainClient {
    let mut client = MockChainClient::new();
    client
        .expect_gas_price()
        .returning(|| Ok(U256::from(1_000_000_000u64)));
    client
        .expect_estimate_gas()
        .returning(|_| Ok(U256::from(21_000)));
    client.expect_balance().returning(move |_| Ok(balance));
    client.expect_chain_id().returning(|| Ok(11155111));
    client.expect_transaction_count().returning(|_, _| Ok(0));
    client
}

fn sender_address() -> String {
    format!("{:?}", signer_from_private_key(TEST_KEY).unwrap().address())
}

async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = HttpRequest::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn health_reports_version() {
    let (status, body) = send(app(MockChainClient::new()), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn ready_reflects_node_reachability() {
    let mut client = MockChainClient::new();
    client.expect_chain_id().returning(|| Ok(11155111));
    client.expect_block_number().returning(|| Ok(42));
    let (status, body) = send(app(client), "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["network"], "sepolia");
    assert_eq!(body["blockNumber"], 42);

    let mut client = MockChainClient::new();
    client
        .expect_chain_id()
        .returning(|| Err(GatewayError::ChainConnection("refused".into())));
    client.expect_block_number().returning(|| Ok(42));
    let (status, body) = send(app(client), "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["ready"], false);
}

#[tokio::test]
async fn balance_lookup_wraps_data_in_envelope() {
    let (status, body) = send(
        app(node(U256::exp10(18))),
        "GET",
        "/api/wallet/balance/0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["balance"], "1");
    assert_eq!(body["data"]["balanceWei"], "1000000000000000000");
}

#[tokio::test]
async fn balance_requires_an_address() {
    let (status, body) = send(app(MockChainClient::new()), "GET", "/api/wallet/balance", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Wallet address is required");
}

#[tokio::test]
async fn balance_rejects_malformed_address() {
    let (status, body) = send(
        app(MockChainClient::new()),
        "GET",
        "/api/wallet/balance/0x1234",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("0x1234"));
}

#[tokio::test]
async fn node_failures_are_server_errors() {
    let mut client = MockChainClient::new();
    client
        .expect_balance()
        .returning(|_| Err(GatewayError::ChainConnection("connection refused".into())));

    let (status, body) = send(
        app(client),
        "GET",
        "/api/wallet/balance/0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn estimate_gas_requires_all_fields() {
    let (status, body) = send(
        app(MockChainClient::new()),
        "POST",
        "/api/wallet/estimate-gas",
        Some(json!({ "from": sender_address(), "to": TO })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn estimate_gas_returns_breakdown() {
    let (status, body) = send(
        app(node(U256::exp10(18))),
        "POST",
        "/api/wallet/estimate-gas",
        Some(json!({ "from": sender_address(), "to": TO, "value": "0.5" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["gasPrice"], "1 gwei");
    assert_eq!(body["data"]["gasLimit"], 21_000);
    assert_eq!(body["data"]["gasCostEth"], "0.000021");
    assert_eq!(body["data"]["canSend"], true);
}

#[tokio::test]
async fn estimate_gas_rejects_bad_amount() {
    let (status, _) = send(
        app(MockChainClient::new()),
        "POST",
        "/api/wallet/estimate-gas",
        Some(json!({ "from": sender_address(), "to": TO, "value": "-2" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let request = HttpRequest::builder()
        .method("POST")
        .uri("/api/wallet/estimate-gas")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app(MockChainClient::new()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn verify_accepts_owner_signature() {
    let wallet = signer_from_private_key(TEST_KEY).unwrap();
    let signature = wallet.sign_message("sign in").await.unwrap();

    let (status, body) = send(
        app(MockChainClient::new()),
        "POST",
        "/api/wallet/verify",
        Some(json!({
            "address": sender_address(),
            "message": "sign in",
            "signature": format!("0x{}", signature),
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["verified"], true);
}

#[tokio::test]
async fn verify_rejects_foreign_signature() {
    let wallet = signer_from_private_key(TEST_KEY).unwrap();
    let signature = wallet.sign_message("sign in").await.unwrap();

    let (status, body) = send(
        app(MockChainClient::new()),
        "POST",
        "/api/wallet/verify",
        Some(json!({
            "address": "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "message": "sign in",
            "signature": signature.to_string(),
        })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn verify_requires_all_fields() {
    let (status, _) = send(
        app(MockChainClient::new()),
        "POST",
        "/api/wallet/verify",
        Some(json!({ "address": sender_address() })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn transfer_validates_every_field() {
    let (status, body) = send(
        app(MockChainClient::new()),
        "POST",
        "/api/transactions/transfer",
        Some(json!({ "from": sender_address(), "value": 1 })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let paths: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["path"].as_str().unwrap())
        .collect();
    assert_eq!(paths, vec!["to", "value", "privateKey"]);
}

#[tokio::test]
async fn transfer_rejects_key_for_another_sender() {
    let (status, body) = send(
        app(MockChainClient::new()),
        "POST",
        "/api/transactions/transfer",
        Some(json!({
            "from": "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "to": TO,
            "value": "0.1",
            "privateKey": TEST_KEY,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn transfer_with_insufficient_balance_returns_estimate() {
    let (status, body) = send(
        app(node(U256::from(1_000u64))),
        "POST",
        "/api/transactions/transfer",
        Some(json!({
            "from": sender_address(),
            "to": TO,
            "value": "0.1",
            "privateKey": TEST_KEY,
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Insufficient balance for this transaction");
    assert_eq!(body["errors"]["gasEstimate"]["canSend"], false);
}

#[tokio::test]
async fn transfer_submits_signed_transaction() {
    let mut client = node(U256::exp10(19));
    client
        .expect_send_raw_transaction()
        .times(1)
        .returning(|raw| Ok(H256::from(keccak256(&raw))));

    let (status, body) = send(
        app(client),
        "POST",
        "/api/transactions/transfer",
        Some(json!({
            "from": sender_address(),
            "to": TO,
            "value": "0.1",
            "privateKey": TEST_KEY,
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Transfer submitted");
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["nonce"], 0);
    assert!(body["data"]["transactionHash"].is_string());
    assert_eq!(body["data"]["gasEstimate"]["canSend"], true);
}

#[tokio::test]
async fn prepare_signs_when_key_given() {
    let (status, body) = send(
        app(node(U256::exp10(19))),
        "POST",
        "/api/transactions/prepare",
        Some(json!({
            "from": sender_address(),
            "to": TO,
            "value": "0.1",
            "privateKey": TEST_KEY,
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["readableData"]["networkType"], "sepolia");
    assert!(body["data"]["transactionData"]["signedTx"]["rawTransaction"].is_string());
}

#[tokio::test]
async fn prepare_without_key_is_unsigned() {
    let (status, body) = send(
        app(node(U256::exp10(19))),
        "POST",
        "/api/transactions/prepare",
        Some(json!({ "from": sender_address(), "to": TO, "value": "0.1" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Transaction data created");
    assert!(body["data"]["transactionData"].get("signedTx").is_none());
}

#[tokio::test]
async fn send_signed_accepts_object_form() {
    // Prepare a signed payload first, then submit it
    let (_, prepared) = send(
        app(node(U256::exp10(19))),
        "POST",
        "/api/transactions/prepare",
        Some(json!({
            "from": sender_address(),
            "to": TO,
            "value": "0.1",
            "privateKey": TEST_KEY,
        })),
    )
    .await;
    let signed_tx = prepared["data"]["transactionData"]["signedTx"].clone();

    let mut client = MockChainClient::new();
    client
        .expect_send_raw_transaction()
        .returning(|raw| Ok(H256::from(keccak256(&raw))));

    let (status, body) = send(
        app(client),
        "POST",
        "/api/transactions/send-signed",
        Some(json!({ "signedTransaction": signed_tx })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["from"], sender_address());
    assert_eq!(body["data"]["transactionHash"], signed_tx["transactionHash"]);
}

#[tokio::test]
async fn send_signed_requires_payload() {
    let (status, body) = send(
        app(MockChainClient::new()),
        "POST",
        "/api/transactions/send-signed",
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"][0]["path"], "signedTransaction");
}

#[tokio::test]
async fn unknown_transaction_is_not_found() {
    let mut client = MockChainClient::new();
    client.expect_transaction_receipt().returning(|_| Ok(None));
    client.expect_transaction().returning(|_| Ok(None));

    let uri = format!("/api/transactions/{:?}", H256::repeat_byte(5));
    let (status, body) = send(app(client), "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn unknown_route_uses_error_envelope() {
    let (status, body) = send(app(MockChainClient::new()), "GET", "/api/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Route not found");
}

#[tokio::test]
async fn responses_carry_security_headers() {
    let request = HttpRequest::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app(MockChainClient::new()).oneshot(request).await.unwrap();
    assert_eq!(
        response.headers()[header::X_CONTENT_TYPE_OPTIONS],
        "nosniff"
    );
    assert_eq!(response.headers()[header::X_FRAME_OPTIONS], "DENY");
}

#[tokio::test]
async fn wrong_method_uses_error_envelope() {
    let (status, body) = send(
        app(MockChainClient::new()),
        "GET",
        "/api/transactions/prepare",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Method not allowed");

    let request = HttpRequest::builder()
        .method("DELETE")
        .uri("/api/wallet/verify")
        .body(Body::empty())
        .unwrap();
    let response = app(MockChainClient::new()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()[header::ALLOW], "POST");
}

#[tokio::test]
async fn oversized_body_is_payload_too_large() {
    let padding = "a".repeat(settings().server.body_limit_bytes + 1);
    let (status, body) = send(
        app(MockChainClient::new()),
        "POST",
        "/api/transactions/transfer",
        Some(json!({ "from": sender_address(), "padding": padding })),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["success"], false);
}
