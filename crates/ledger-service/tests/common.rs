//! Common test utilities for ledger service integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum_test::TestServer;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};

use ledger_core::CompanyId;
use ledger_service::auth::JwtClaims;
use ledger_service::crypto::sign_payload;
use ledger_service::payments::{CheckoutRequest, PaymentError, PaymentProvider, PaymentSession};
use ledger_service::{create_router, AppState, ServiceConfig};
use ledger_store::{MemoryStore, Store};

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const AUDIENCE: &str = "credit-ledger";
pub const ADMIN_KEY: &str = "test-admin-key";
pub const WEBHOOK_SECRET: &str = "whsec_test";

/// Payment provider double that records requests.
#[derive(Default)]
pub struct MockPayments {
    /// Every checkout request received.
    pub requests: Mutex<Vec<CheckoutRequest>>,
    /// Fail every call with a timeout.
    pub fail: bool,
}

#[async_trait]
impl PaymentProvider for MockPayments {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<PaymentSession, PaymentError> {
        if self.fail {
            return Err(PaymentError::Timeout);
        }

        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        let session_id = format!("cs_test_{}", requests.len());

        Ok(PaymentSession {
            checkout_url: format!("https://checkout.test/{session_id}"),
            session_id,
        })
    }
}

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Direct handle on the store behind the server.
    pub store: Arc<MemoryStore>,
    /// The payment provider double.
    pub payments: Arc<MockPayments>,
    /// Company the default test user acts for.
    pub company_id: CompanyId,
}

impl TestHarness {
    /// Create a new test harness with an empty in-memory store.
    pub fn new() -> Self {
        Self::with_payments(MockPayments::default())
    }

    /// Create a harness whose payment provider always fails.
    pub fn with_failing_payments() -> Self {
        Self::with_payments(MockPayments {
            fail: true,
            ..MockPayments::default()
        })
    }

    fn with_payments(payments: MockPayments) -> Self {
        let store = Arc::new(MemoryStore::new());
        let payments = Arc::new(payments);

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            auth_jwt_secret: Some(JWT_SECRET.into()),
            auth_audience: AUDIENCE.into(),
            admin_api_key: Some(ADMIN_KEY.into()),
            stripe_webhook_secret: Some(WEBHOOK_SECRET.into()),
            frontend_url: "http://localhost:3000".into(),
            cors_origins: vec!["*".into()],
            ..ServiceConfig::default()
        };

        let state = AppState::new(store.clone(), config).with_payment_provider(payments.clone());
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            store,
            payments,
            company_id: CompanyId::new("C1").unwrap(),
        }
    }

    /// Bearer header for a regular user of `C1`.
    pub fn user_auth_header(&self) -> String {
        Self::auth_header_for(self.company_id.as_str(), &[])
    }

    /// Bearer header for an operator of `C1`.
    pub fn operator_auth_header(&self) -> String {
        Self::auth_header_for(self.company_id.as_str(), &["operator"])
    }

    /// Bearer header for a user of another company.
    pub fn auth_header_for(company_id: &str, roles: &[&str]) -> String {
        let claims = JwtClaims {
            sub: format!("user-of-{company_id}"),
            company_id: company_id.to_string(),
            roles: roles.iter().map(ToString::to_string).collect(),
            aud: Some(AUDIENCE.into()),
            exp: chrono::Utc::now().timestamp() + 3600,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
        )
        .expect("Failed to sign token");
        format!("Bearer {token}")
    }

    /// Credit `C1` through the store directly.
    pub async fn fund(&self, credits: i64) {
        self.store
            .credit(&self.company_id, credits, "cs_seed", "evt-seed")
            .await
            .expect("Failed to seed balance");
    }

    /// Current balance of `C1`.
    pub async fn balance(&self) -> i64 {
        self.store.get_balance(&self.company_id).await.unwrap()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Metadata the checkout flow attaches to a `pack-10` purchase by `C1`.
pub fn purchase_metadata() -> Value {
    json!({
        "companyId": "C1",
        "packageId": "pack-10",
        "creditsAmount": "10",
        "type": "credit_purchase",
    })
}

/// A paid `checkout.session.completed` envelope.
pub fn checkout_completed(event_id: &str, metadata: &Value) -> String {
    json!({
        "id": event_id,
        "type": "checkout.session.completed",
        "data": {"object": {
            "id": format!("cs_{event_id}"),
            "object": "checkout.session",
            "payment_status": "paid",
            "amount_total": 500,
            "client_reference_id": "C1",
            "metadata": metadata,
        }}
    })
    .to_string()
}

/// Signature header for `body` signed now with the test secret.
pub fn signature_for(body: &str) -> String {
    sign_payload(WEBHOOK_SECRET, chrono::Utc::now().timestamp(), body)
}
