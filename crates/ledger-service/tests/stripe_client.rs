//! Stripe client tests against a mock HTTP server.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_string_contains, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ledger_core::{CompanyId, CreditPurchaseMetadata, PackageCatalog};
use ledger_service::payments::{CheckoutRequest, PaymentError, PaymentProvider};
use ledger_service::StripeClient;

fn request() -> CheckoutRequest {
    let package = PackageCatalog::default()
        .get_str("pack-10")
        .unwrap()
        .clone();
    CheckoutRequest {
        company_id: CompanyId::new("C1").unwrap(),
        metadata: CreditPurchaseMetadata {
            company_id: CompanyId::new("C1").unwrap(),
            package_id: package.id.clone(),
            credits_amount: package.credits,
        },
        package,
        success_url: "http://localhost:3000/credits/success".into(),
        cancel_url: "http://localhost:3000/credits/cancel".into(),
    }
}

fn client(server: &MockServer, timeout: Duration) -> StripeClient {
    StripeClient::new("sk_test_xxx", timeout)
        .unwrap()
        .with_base_url(server.uri())
}

#[tokio::test]
async fn creates_checkout_session() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/checkout/sessions"))
        .and(header_exists("authorization"))
        .and(header_exists("idempotency-key"))
        .and(body_string_contains("mode=payment"))
        .and(body_string_contains("metadata%5BpackageId%5D=pack-10"))
        .and(body_string_contains("client_reference_id=C1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_test_123",
            "object": "checkout.session",
            "url": "https://checkout.stripe.com/c/pay/cs_test_123",
            "payment_status": "unpaid",
            "metadata": {}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = client(&server, Duration::from_secs(5))
        .create_checkout_session(&request())
        .await
        .unwrap();

    assert_eq!(session.session_id, "cs_test_123");
    assert_eq!(
        session.checkout_url,
        "https://checkout.stripe.com/c/pay/cs_test_123"
    );
}

#[tokio::test]
async fn api_error_is_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/checkout/sessions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "type": "invalid_request_error",
                "message": "Invalid API Key provided",
                "code": "api_key_invalid"
            }
        })))
        .mount(&server)
        .await;

    let err = client(&server, Duration::from_secs(5))
        .create_checkout_session(&request())
        .await
        .unwrap_err();

    match err {
        PaymentError::Api {
            error_type, code, ..
        } => {
            assert_eq!(error_type, "invalid_request_error");
            assert_eq!(code.as_deref(), Some("api_key_invalid"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn slow_provider_times_out_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/checkout/sessions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(5))
                .set_body_json(json!({"id": "cs_late", "url": "https://late"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server, Duration::from_millis(200))
        .create_checkout_session(&request())
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::Timeout));
}

#[tokio::test]
async fn missing_url_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/checkout/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "cs_no_url"})))
        .mount(&server)
        .await;

    let err = client(&server, Duration::from_secs(5))
        .create_checkout_session(&request())
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::MissingCheckoutUrl(id) if id == "cs_no_url"));
}
