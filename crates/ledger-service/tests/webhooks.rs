//! Stripe webhook ingestion integration tests.

mod common;

use common::{checkout_completed, purchase_metadata, signature_for, TestHarness};
use ledger_core::TransactionKind;
use ledger_store::Store;
use serde_json::json;

async fn deliver(harness: &TestHarness, body: &str) -> axum_test::TestResponse {
    harness
        .server
        .post("/webhooks/stripe")
        .add_header("stripe-signature", signature_for(body))
        .text(body.to_string())
        .await
}

async fn purchases(harness: &TestHarness) -> usize {
    harness
        .store
        .list_transactions(&harness.company_id, 100, 0)
        .await
        .unwrap()
        .iter()
        .filter(|tx| tx.kind == TransactionKind::Purchase)
        .count()
}

#[tokio::test]
async fn redelivered_event_credits_once() {
    let harness = TestHarness::new();
    let body = checkout_completed("evt-1", &purchase_metadata());

    let response = deliver(&harness, &body).await;
    response.assert_status_ok();
    let ack: serde_json::Value = response.json();
    assert_eq!(ack["received"], true);
    assert_eq!(harness.balance().await, 10);
    assert_eq!(purchases(&harness).await, 1);

    deliver(&harness, &body).await.assert_status_ok();
    assert_eq!(harness.balance().await, 10);
    assert_eq!(purchases(&harness).await, 1);
}

#[tokio::test]
async fn bad_signature_has_no_side_effects() {
    let harness = TestHarness::new();
    let body = checkout_completed("evt-1", &purchase_metadata());

    let response = harness
        .server
        .post("/webhooks/stripe")
        .add_header("stripe-signature", "t=1,v1=deadbeef")
        .text(body.clone())
        .await;
    response.assert_status_bad_request();

    let response = harness
        .server
        .post("/webhooks/stripe")
        .text(body)
        .await;
    response.assert_status_bad_request();

    assert_eq!(harness.balance().await, 0);
    assert!(!harness.store.has_processed_event("evt-1").await.unwrap());
    assert!(harness
        .store
        .list_webhook_failures(10)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn malformed_metadata_is_recorded_and_acknowledged() {
    let harness = TestHarness::new();
    let body = checkout_completed("evt-2", &json!({"type": "credit_purchase"}));

    deliver(&harness, &body).await.assert_status_ok();

    let failures = harness.store.list_webhook_failures(10).await.unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].event_id, "evt-2");
    assert_eq!(failures[0].event_type, "checkout.session.completed");
    assert!(failures[0].reason.starts_with("invalid payload"));
    assert_eq!(harness.balance().await, 0);
    assert!(!harness.store.has_processed_event("evt-2").await.unwrap());
}

#[tokio::test]
async fn metadata_credit_amount_is_ignored() {
    let harness = TestHarness::new();
    let metadata = json!({
        "companyId": "C1",
        "packageId": "pack-10",
        "creditsAmount": "1000000",
        "type": "credit_purchase",
    });

    deliver(&harness, &checkout_completed("evt-3", &metadata))
        .await
        .assert_status_ok();

    assert_eq!(harness.balance().await, 10);
}

#[tokio::test]
async fn unparseable_envelope_is_rejected() {
    let harness = TestHarness::new();

    let response = deliver(&harness, "not json").await;
    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "invalid_payload");
}

#[tokio::test]
async fn async_payment_success_credits_after_unpaid_completion() {
    let harness = TestHarness::new();

    let unpaid = json!({
        "id": "evt-10",
        "type": "checkout.session.completed",
        "data": {"object": {
            "id": "cs_delayed",
            "payment_status": "unpaid",
            "metadata": purchase_metadata(),
        }}
    })
    .to_string();
    deliver(&harness, &unpaid).await.assert_status_ok();
    assert_eq!(harness.balance().await, 0);

    let settled = json!({
        "id": "evt-11",
        "type": "checkout.session.async_payment_succeeded",
        "data": {"object": {
            "id": "cs_delayed",
            "payment_status": "paid",
            "metadata": purchase_metadata(),
        }}
    })
    .to_string();
    deliver(&harness, &settled).await.assert_status_ok();
    assert_eq!(harness.balance().await, 10);

    let history = harness
        .store
        .list_transactions(&harness.company_id, 10, 0)
        .await
        .unwrap();
    assert_eq!(history[0].reference, "evt-11");
}

#[tokio::test]
async fn frozen_account_failure_is_recorded_and_acknowledged() {
    let harness = TestHarness::new();
    harness.fund(5).await;
    harness
        .store
        .adjust(
            &harness.company_id,
            -10,
            "chargeback",
            ledger_store::AdjustmentMode::Corrective,
        )
        .await
        .unwrap();

    deliver(&harness, &checkout_completed("evt-4", &purchase_metadata()))
        .await
        .assert_status_ok();

    let failures = harness.store.list_webhook_failures(10).await.unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].event_id, "evt-4");
    assert!(!harness.store.has_processed_event("evt-4").await.unwrap());
}
