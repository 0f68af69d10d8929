//! Credit balance, checkout and spend integration tests.

mod common;

use axum::http::StatusCode;
use common::TestHarness;
use ledger_store::Store;
use serde_json::json;

// ============================================================================
// Catalog & Balance
// ============================================================================

#[tokio::test]
async fn packages_are_public() {
    let harness = TestHarness::new();

    let response = harness.server.get("/v1/credits/packages").await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let pack = &body["packages"][0];
    assert_eq!(pack["id"], "pack-10");
    assert_eq!(pack["credits"], 10);
    assert_eq!(pack["priceInCents"], 500);
}

#[tokio::test]
async fn balance_without_account_reads_zero() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get("/v1/credits/balance")
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["companyId"], "C1");
    assert_eq!(body["balance"], 0);
    assert!(harness
        .store
        .get_account(&harness.company_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn balance_without_auth_fails() {
    let harness = TestHarness::new();

    let response = harness.server.get("/v1/credits/balance").await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn balance_with_forged_token_fails() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get("/v1/credits/balance")
        .add_header("authorization", "Bearer not-a-jwt")
        .await;

    response.assert_status_unauthorized();
}

// ============================================================================
// Transactions
// ============================================================================

#[tokio::test]
async fn transactions_are_newest_first_and_paged() {
    let harness = TestHarness::new();
    harness.fund(10).await;
    for i in 0..3 {
        harness
            .store
            .debit(&harness.company_id, 1, &format!("lead-{i}"))
            .await
            .unwrap();
    }

    let response = harness
        .server
        .get("/v1/credits/transactions?limit=2")
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let transactions = body["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 2);
    assert_eq!(transactions[0]["reference"], "lead-2");
    assert_eq!(transactions[0]["kind"], "spend");
    assert_eq!(transactions[0]["amount"], -1);
    assert_eq!(body["hasMore"], true);

    let response = harness
        .server
        .get("/v1/credits/transactions?limit=2&offset=2")
        .add_header("authorization", harness.user_auth_header())
        .await;
    let body: serde_json::Value = response.json();
    let transactions = body["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 2);
    assert_eq!(transactions[1]["kind"], "purchase");
    assert_eq!(body["hasMore"], false);
}

#[tokio::test]
async fn transactions_are_scoped_to_the_caller() {
    let harness = TestHarness::new();
    harness.fund(10).await;

    let response = harness
        .server
        .get("/v1/credits/transactions")
        .add_header("authorization", TestHarness::auth_header_for("C2", &[]))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert!(body["transactions"].as_array().unwrap().is_empty());
}

// ============================================================================
// Checkout
// ============================================================================

#[tokio::test]
async fn checkout_opens_session_without_touching_ledger() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/credits/checkout")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({"packageId": "pack-10"}))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["sessionId"], "cs_test_1");
    assert_eq!(body["packageId"], "pack-10");
    assert_eq!(body["credits"], 10);

    let requests = harness.payments.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].company_id.as_str(), "C1");
    assert_eq!(requests[0].metadata.credits_amount, 10);
    assert!(requests[0]
        .success_url
        .starts_with("http://localhost:3000/credits/success"));

    assert_eq!(harness.balance().await, 0);
}

#[tokio::test]
async fn checkout_unknown_package_is_not_found() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/credits/checkout")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({"packageId": "pack-999"}))
        .await;

    response.assert_status_not_found();
    assert!(harness.payments.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn checkout_for_another_company_is_unauthorized() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/credits/checkout")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({"packageId": "pack-10", "companyId": "C2"}))
        .await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn checkout_provider_failure_is_bad_gateway() {
    let harness = TestHarness::with_failing_payments();

    let response = harness
        .server
        .post("/v1/credits/checkout")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({"packageId": "pack-10"}))
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "upstream_unavailable");
}

// ============================================================================
// Access check & spend
// ============================================================================

#[tokio::test]
async fn access_check_over_balance_is_denied() {
    let harness = TestHarness::new();
    harness.fund(10).await;

    let response = harness
        .server
        .post("/v1/credits/access-check")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({"cost": 15}))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body, json!({"allowed": false, "balance": 10}));

    let response = harness
        .server
        .post("/v1/credits/spend")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({"cost": 15, "reference": "lead-1"}))
        .await;

    response.assert_status(StatusCode::PAYMENT_REQUIRED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["details"]["balance"], 10);
    assert_eq!(body["error"]["details"]["required"], 15);
    assert_eq!(harness.balance().await, 10);
}

#[tokio::test]
async fn spend_to_zero() {
    let harness = TestHarness::new();
    harness.fund(10).await;

    let response = harness
        .server
        .post("/v1/credits/spend")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({"cost": 10, "reference": "lead-1"}))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["balance"], 0);

    let account = harness
        .store
        .get_account(&harness.company_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.spent_total, 10);

    let history = harness
        .store
        .list_transactions(&harness.company_id, 10, 0)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].reference, "lead-1");
}

#[tokio::test]
async fn zero_cost_is_rejected() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/credits/access-check")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({"cost": 0}))
        .await;

    response.assert_status_bad_request();
}
