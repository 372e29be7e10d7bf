use axum::{
    body::{self, Body},
    http::{header, Request, StatusCode},
};
use serde_json::{json, Value};
use tower::util::ServiceExt;
use zkpl_backend::{app_router, AppState, LedgerStore};
use zkpl_common::hex32;
use zkpl_ledger::{DigestBindingVerifier, InMemoryCustody, ShieldedLedger};
use zkpl_test_fixtures as fixtures;

const BODY_LIMIT: usize = usize::MAX;

fn test_app() -> axum::Router {
    let custody = InMemoryCustody::new("USDC").with_account("alice", 10_000);
    let mut ledger = ShieldedLedger::new(Box::new(custody));
    ledger.install_verifier(
        Box::new(DigestBindingVerifier),
        fixtures::test_verification_key(),
    );
    app_router(AppState::new(ledger, LedgerStore::in_memory()))
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), BODY_LIMIT)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn ciphertext_json(commitment: [u8; 32]) -> Value {
    let ct = fixtures::k1_ciphertext(commitment);
    json!({
        "commitment": hex32(&ct.commitment),
        "key_type": 0,
        "ephemeral_pubkey": format!("0x{}", hex::encode(&ct.ephemeral_pubkey)),
        "nonce": format!("0x{}", hex::encode(ct.nonce)),
        "ciphertext": format!("0x{}", hex::encode(&ct.ciphertext)),
    })
}

fn deposit_json(commitment: [u8; 32], amount: u64) -> Value {
    json!({
        "commitment": hex32(&commitment),
        "ciphertext": ciphertext_json(commitment),
        "amount": amount,
        "depositor": "alice",
    })
}

#[tokio::test]
async fn root_endpoint_reports_empty_tree() {
    let app = test_app();
    let response = app.oneshot(get("/ledger/root")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["next_leaf_index"], 0);
    assert!(body["root"].as_str().unwrap().starts_with("0x"));
}

#[tokio::test]
async fn deposit_then_query_balance_and_root() {
    let app = test_app();
    let commitment = fixtures::commitment(1);

    let response = app
        .clone()
        .oneshot(post("/ledger/deposit", deposit_json(commitment, 400)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["leaf_index"], 0);

    let response = app.clone().oneshot(get("/ledger/balance")).await.unwrap();
    let body = json_body(response).await;
    assert_eq!(body["total_deposited"], 400);
    assert_eq!(body["pool_balance"], 400);

    let response = app.oneshot(get("/ledger/root")).await.unwrap();
    let body = json_body(response).await;
    assert_eq!(body["next_leaf_index"], 1);
}

#[tokio::test]
async fn deposit_rejects_underfunded_depositor() {
    let app = test_app();
    let commitment = fixtures::commitment(1);
    let response = app
        .oneshot(post("/ledger/deposit", deposit_json(commitment, 100_000)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body = json_body(response).await;
    assert_eq!(body["error_code"], "ASSET_TRANSFER_FAILED");
}

#[tokio::test]
async fn transfer_spends_and_replay_conflicts() {
    let app = test_app();
    let commitment = fixtures::commitment(1);
    app.clone()
        .oneshot(post("/ledger/deposit", deposit_json(commitment, 1_000)))
        .await
        .unwrap();

    let response = app.clone().oneshot(get("/ledger/root")).await.unwrap();
    let root_hex = json_body(response).await["root"].as_str().unwrap().to_string();
    let root = zkpl_common::parse_hex32(&root_hex).unwrap();

    let bundle = fixtures::transfer_bundle(
        root,
        vec![fixtures::nullifier(1)],
        vec![fixtures::commitment(2)],
    );
    let transfer = json!({
        "encrypted_outputs": [ciphertext_json(fixtures::commitment(2))],
        "proof": format!("0x{}", hex::encode(bundle.proof)),
        "public_values": format!("0x{}", hex::encode(&bundle.public_values)),
    });

    let response = app
        .clone()
        .oneshot(post("/ledger/transfer", transfer.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let used = app
        .clone()
        .oneshot(get(&format!(
            "/ledger/nullifier/{}",
            hex32(&fixtures::nullifier(1))
        )))
        .await
        .unwrap();
    assert_eq!(json_body(used).await["used"], true);

    // Same proof again: the nullifier is already consumed.
    let response = app.oneshot(post("/ledger/transfer", transfer)).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = json_body(response).await;
    assert_eq!(body["error_code"], "NULLIFIER_ALREADY_USED");
}

#[tokio::test]
async fn withdraw_releases_custody() {
    let app = test_app();
    let commitment = fixtures::commitment(1);
    app.clone()
        .oneshot(post("/ledger/deposit", deposit_json(commitment, 1_000)))
        .await
        .unwrap();

    let response = app.clone().oneshot(get("/ledger/root")).await.unwrap();
    let root_hex = json_body(response).await["root"].as_str().unwrap().to_string();
    let root = zkpl_common::parse_hex32(&root_hex).unwrap();

    let bundle = fixtures::transfer_bundle(root, vec![fixtures::nullifier(1)], vec![]);
    let response = app
        .clone()
        .oneshot(post(
            "/ledger/withdraw",
            json!({
                "recipient": "bob",
                "amount": 300,
                "proof": format!("0x{}", hex::encode(bundle.proof)),
                "public_values": format!("0x{}", hex::encode(&bundle.public_values)),
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/ledger/balance")).await.unwrap();
    let body = json_body(response).await;
    assert_eq!(body["total_deposited"], 700);
    assert_eq!(body["pool_balance"], 700);
}

#[tokio::test]
async fn metadata_endpoint_round_trips_and_404s() {
    let app = test_app();
    let commitment = fixtures::commitment(1);

    let missing = app
        .clone()
        .oneshot(get(&format!("/ledger/metadata/{}", hex32(&commitment))))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let mut deposit = deposit_json(commitment, 100);
    deposit["metadata"] = json!("0xdeadbeef");
    app.clone()
        .oneshot(post("/ledger/deposit", deposit))
        .await
        .unwrap();

    let response = app
        .oneshot(get(&format!("/ledger/metadata/{}", hex32(&commitment))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["metadata"], "0xdeadbeef");
}

#[tokio::test]
async fn ciphertext_endpoint_serves_published_outputs() {
    let app = test_app();
    let commitment = fixtures::commitment(1);

    let missing = app
        .clone()
        .oneshot(get(&format!("/ledger/ciphertext/{}", hex32(&commitment))))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    app.clone()
        .oneshot(post("/ledger/deposit", deposit_json(commitment, 100)))
        .await
        .unwrap();

    let response = app
        .oneshot(get(&format!("/ledger/ciphertext/{}", hex32(&commitment))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["commitment"], hex32(&commitment));
    assert_eq!(body["key_type"], 0);
    let expected = fixtures::k1_ciphertext(commitment);
    assert_eq!(
        body["ephemeral_pubkey"],
        format!("0x{}", hex::encode(&expected.ephemeral_pubkey))
    );
    assert_eq!(
        body["ciphertext"],
        format!("0x{}", hex::encode(&expected.ciphertext))
    );
}

#[tokio::test]
async fn malformed_hex_is_a_bad_request() {
    let app = test_app();
    let response = app
        .oneshot(get("/ledger/nullifier/not-hex"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error_code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn unknown_key_type_is_rejected() {
    let app = test_app();
    let commitment = fixtures::commitment(1);
    let mut deposit = deposit_json(commitment, 100);
    deposit["ciphertext"]["key_type"] = json!(9);
    let response = app.oneshot(post("/ledger/deposit", deposit)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error_code"], "UNSUPPORTED_KEY_TYPE");
}
