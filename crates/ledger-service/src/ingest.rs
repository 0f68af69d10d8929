//! Payment webhook ingestion.
//!
//! Authenticated completion notifications credit the ledger exactly once per
//! event id. Once a notification is authenticated and its envelope parsed it
//! is always acknowledged; anything that prevents crediting from then on is
//! recorded as a [`WebhookFailure`] for manual reconciliation.

use serde_json::Value;

use ledger_core::{CompanyId, CreditPurchaseMetadata, WebhookFailure};
use ledger_store::StoreError;

use crate::crypto::verify_signature_header;
use crate::error::ApiError;
use crate::payments::types::{CheckoutSession, WebhookEvent};
use crate::state::AppState;

/// Event sent when a hosted checkout finishes.
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// Event sent when a delayed payment method settles.
pub const ASYNC_PAYMENT_SUCCEEDED: &str = "checkout.session.async_payment_succeeded";

/// What happened to an acknowledged notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The ledger was credited.
    Credited {
        /// Credited company.
        company_id: CompanyId,
        /// Credits applied.
        credits: i64,
        /// Balance after the credit.
        balance: i64,
    },
    /// The event id had already been applied.
    AlreadyProcessed,
    /// Not a credit-bearing event.
    Ignored,
    /// Recorded as a webhook failure.
    Failed {
        /// Why crediting did not happen.
        reason: String,
    },
}

/// Check the signature header against the configured webhook secret.
///
/// # Errors
///
/// Returns `ApiError::BadRequest` when no secret is configured, the header is
/// missing, or verification fails.
pub fn authenticate(state: &AppState, body: &str, signature: Option<&str>) -> Result<(), ApiError> {
    let secret = state.config.stripe_webhook_secret.as_deref().ok_or_else(|| {
        tracing::warn!("Rejecting webhook: webhook secret not configured");
        ApiError::BadRequest("Webhook signature cannot be verified".into())
    })?;

    let signature =
        signature.ok_or_else(|| ApiError::BadRequest("Missing Stripe signature".into()))?;

    verify_signature_header(
        secret,
        body,
        signature,
        chrono::Utc::now().timestamp(),
        state.config.stripe_webhook_tolerance_seconds,
    )
    .map_err(|e| {
        tracing::warn!(error = %e, "Invalid Stripe webhook signature");
        ApiError::BadRequest("Invalid webhook signature".into())
    })
}

/// Authenticate, parse and apply a payment notification.
///
/// # Errors
///
/// - `ApiError::BadRequest` if authentication fails and
///   `ApiError::InvalidPayload` if the envelope is not valid JSON. Nothing is
///   written in either case.
/// - `ApiError::Internal` if the store cannot be read or a failure record
///   cannot be written, so the sender redelivers.
pub async fn process_webhook(
    state: &AppState,
    signature: Option<&str>,
    body: &str,
) -> Result<IngestOutcome, ApiError> {
    authenticate(state, body, signature)?;

    let event: WebhookEvent = serde_json::from_str(body)
        .map_err(|e| ApiError::InvalidPayload(format!("invalid webhook envelope: {e}")))?;

    tracing::info!(
        event_type = %event.event_type,
        event_id = %event.id,
        "Received Stripe webhook"
    );

    match event.event_type.as_str() {
        CHECKOUT_COMPLETED | ASYNC_PAYMENT_SUCCEEDED => apply_checkout(state, &event).await,
        _ => {
            tracing::debug!(event_type = %event.event_type, "Unhandled Stripe event");
            Ok(IngestOutcome::Ignored)
        }
    }
}

async fn apply_checkout(state: &AppState, event: &WebhookEvent) -> Result<IngestOutcome, ApiError> {
    let raw_metadata = event
        .data
        .object
        .get("metadata")
        .cloned()
        .unwrap_or(Value::Null);

    let session: CheckoutSession = match serde_json::from_value(event.data.object.clone()) {
        Ok(session) => session,
        Err(e) => {
            let err = ApiError::InvalidPayload(format!("invalid checkout session: {e}"));
            return record_failure(state, event, &err, raw_metadata).await;
        }
    };

    // An unpaid completion writes no marker so the async success can credit later.
    if event.event_type == CHECKOUT_COMPLETED && session.payment_status.as_deref() != Some("paid")
    {
        tracing::info!(
            event_id = %event.id,
            session_id = %session.id,
            payment_status = ?session.payment_status,
            "Checkout completed without payment - awaiting async confirmation"
        );
        return Ok(IngestOutcome::Ignored);
    }

    if state.store.has_processed_event(&event.id).await? {
        tracing::info!(event_id = %event.id, "Webhook already processed");
        return Ok(IngestOutcome::AlreadyProcessed);
    }

    let metadata = match CreditPurchaseMetadata::from_json(&session.metadata) {
        Ok(metadata) => metadata,
        Err(reason) => {
            let err = ApiError::InvalidPayload(reason);
            return record_failure(state, event, &err, raw_metadata).await;
        }
    };

    let package = match state.config.packages.require(metadata.package_id.as_str()) {
        Ok(package) => package,
        Err(e) => {
            let err = ApiError::InvalidPayload(e.to_string());
            return record_failure(state, event, &err, raw_metadata).await;
        }
    };

    if metadata.credits_amount != package.credits {
        tracing::warn!(
            event_id = %event.id,
            package_id = %package.id,
            metadata_credits = metadata.credits_amount,
            catalog_credits = package.credits,
            "Metadata credit amount disagrees with catalog - using catalog"
        );
    }

    if let Some(amount_total) = session.amount_total {
        if amount_total != package.price_in_cents {
            tracing::warn!(
                event_id = %event.id,
                package_id = %package.id,
                amount_total = amount_total,
                price_in_cents = package.price_in_cents,
                "Completed amount differs from package price"
            );
        }
    }

    if let Some(reference) = session.client_reference_id.as_deref() {
        if reference != metadata.company_id.as_str() {
            tracing::warn!(
                event_id = %event.id,
                client_reference_id = %reference,
                company_id = %metadata.company_id,
                "Client reference disagrees with metadata company"
            );
        }
    }

    let credits = package.credits;
    match state
        .store
        .credit(&metadata.company_id, credits, &event.id, &event.id)
        .await
    {
        Ok(balance) => {
            tracing::info!(
                event_id = %event.id,
                session_id = %session.id,
                company_id = %metadata.company_id,
                credits = credits,
                balance = balance,
                "Credits purchased"
            );
            Ok(IngestOutcome::Credited {
                company_id: metadata.company_id,
                credits,
                balance,
            })
        }
        Err(StoreError::DuplicateEvent { event_id }) => {
            tracing::info!(event_id = %event_id, "Concurrent delivery already applied");
            Ok(IngestOutcome::AlreadyProcessed)
        }
        Err(e) => record_failure(state, event, &ApiError::from(e), raw_metadata).await,
    }
}

async fn record_failure(
    state: &AppState,
    event: &WebhookEvent,
    err: &ApiError,
    metadata: Value,
) -> Result<IngestOutcome, ApiError> {
    let reason = err.to_string();
    tracing::error!(
        event_id = %event.id,
        event_type = %event.event_type,
        reason = %reason,
        "Webhook could not be applied - recorded for reconciliation"
    );

    let failure = WebhookFailure::new(&event.id, &event.event_type, &reason, metadata);
    state.store.record_webhook_failure(&failure).await?;

    Ok(IngestOutcome::Failed { reason })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ledger_store::{MemoryStore, Store};
    use serde_json::json;

    use super::*;
    use crate::config::ServiceConfig;
    use crate::crypto::sign_payload;

    const SECRET: &str = "whsec_test";

    fn state() -> (AppState, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let config = ServiceConfig {
            stripe_webhook_secret: Some(SECRET.into()),
            ..ServiceConfig::default()
        };
        (AppState::new(store.clone(), config), store)
    }

    fn completed(event_id: &str, metadata: &Value) -> String {
        json!({
            "id": event_id,
            "type": CHECKOUT_COMPLETED,
            "data": {"object": {
                "id": "cs_test_1",
                "payment_status": "paid",
                "amount_total": 500,
                "client_reference_id": "C1",
                "metadata": metadata,
            }}
        })
        .to_string()
    }

    fn purchase_metadata() -> Value {
        json!({
            "companyId": "C1",
            "packageId": "pack-10",
            "creditsAmount": "10",
            "type": "credit_purchase",
        })
    }

    fn signed(body: &str) -> String {
        sign_payload(SECRET, chrono::Utc::now().timestamp(), body)
    }

    #[tokio::test]
    async fn paid_checkout_credits_once() {
        let (state, store) = state();
        let body = completed("evt-1", &purchase_metadata());
        let company = CompanyId::new("C1").unwrap();

        let first = process_webhook(&state, Some(&signed(&body)), &body)
            .await
            .unwrap();
        assert!(matches!(
            first,
            IngestOutcome::Credited {
                credits: 10,
                balance: 10,
                ..
            }
        ));

        let second = process_webhook(&state, Some(&signed(&body)), &body)
            .await
            .unwrap();
        assert_eq!(second, IngestOutcome::AlreadyProcessed);
        assert_eq!(store.get_balance(&company).await.unwrap(), 10);

        let txs = store.list_transactions(&company, 10, 0).await.unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].reference, "evt-1");
    }

    #[tokio::test]
    async fn unsigned_webhook_has_no_side_effects() {
        let (state, store) = state();
        let body = completed("evt-1", &purchase_metadata());

        let result = process_webhook(&state, None, &body).await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));

        let forged = sign_payload("whsec_other", chrono::Utc::now().timestamp(), &body);
        let result = process_webhook(&state, Some(&forged), &body).await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));

        assert!(!store.has_processed_event("evt-1").await.unwrap());
        assert!(store.list_webhook_failures(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_secret_rejects_everything() {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(store, ServiceConfig::default());
        let body = completed("evt-1", &purchase_metadata());

        let result = process_webhook(&state, Some(&signed(&body)), &body).await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn unpaid_completion_writes_no_marker() {
        let (state, store) = state();
        let body = json!({
            "id": "evt-2",
            "type": CHECKOUT_COMPLETED,
            "data": {"object": {
                "id": "cs_test_2",
                "payment_status": "unpaid",
                "metadata": purchase_metadata(),
            }}
        })
        .to_string();

        let outcome = process_webhook(&state, Some(&signed(&body)), &body)
            .await
            .unwrap();
        assert_eq!(outcome, IngestOutcome::Ignored);
        assert!(!store.has_processed_event("evt-2").await.unwrap());
    }

    #[tokio::test]
    async fn unknown_package_is_recorded_as_failure() {
        let (state, store) = state();
        let metadata = json!({
            "companyId": "C1",
            "packageId": "pack-999",
            "type": "credit_purchase",
        });
        let body = completed("evt-3", &metadata);

        let outcome = process_webhook(&state, Some(&signed(&body)), &body)
            .await
            .unwrap();
        assert!(matches!(outcome, IngestOutcome::Failed { .. }));

        let failures = store.list_webhook_failures(10).await.unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].event_id, "evt-3");
        assert_eq!(failures[0].metadata, metadata);
        assert!(failures[0].reason.starts_with("invalid payload"));
    }

    #[tokio::test]
    async fn other_event_types_are_ignored() {
        let (state, _store) = state();
        let body = json!({
            "id": "evt-4",
            "type": "invoice.paid",
            "data": {"object": {}}
        })
        .to_string();

        let outcome = process_webhook(&state, Some(&signed(&body)), &body)
            .await
            .unwrap();
        assert_eq!(outcome, IngestOutcome::Ignored);
    }
}
