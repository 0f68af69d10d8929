//! Stripe Checkout client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::types::{CheckoutSession, StripeErrorResponse};
use super::{CheckoutRequest, PaymentError, PaymentProvider, PaymentSession};

/// Stripe API client.
#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl StripeClient {
    /// Stripe API base URL.
    const BASE_URL: &'static str = "https://api.stripe.com/v1";

    /// Create a new Stripe client.
    ///
    /// `timeout` bounds every request; an elapsed timeout is reported as
    /// `PaymentError::Timeout`.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Configuration` if the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, PaymentError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PaymentError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: Self::BASE_URL.to_string(),
        })
    }

    /// Point the client at a different API root (e.g. a local mock).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Form parameters for a one-off Checkout session.
    fn checkout_params(request: &CheckoutRequest) -> Vec<(String, String)> {
        let package = &request.package;
        let mut params = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
            (
                "client_reference_id".to_string(),
                request.company_id.to_string(),
            ),
            (
                "line_items[0][price_data][currency]".to_string(),
                "usd".to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                package.name.clone(),
            ),
            (
                "line_items[0][price_data][product_data][description]".to_string(),
                format!("{} credits", package.credits),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                package.price_in_cents.to_string(),
            ),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
        ];

        let mut metadata: Vec<_> = request.metadata.to_map().into_iter().collect();
        metadata.sort();
        params.extend(
            metadata
                .into_iter()
                .map(|(key, value)| (format!("metadata[{key}]"), value)),
        );

        params
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, PaymentError> {
        let status = response.status();

        if status.is_success() {
            return response.json().await.map_err(map_transport_error);
        }

        // Try to parse error response
        let error_body: Result<StripeErrorResponse, _> = response.json().await;

        match error_body {
            Ok(stripe_error) => Err(PaymentError::Api {
                error_type: stripe_error.error.error_type,
                message: stripe_error.error.message,
                code: stripe_error.error.code,
            }),
            Err(_) => Err(PaymentError::Api {
                error_type: "unknown".to_string(),
                message: format!("HTTP {status}"),
                code: None,
            }),
        }
    }
}

fn map_transport_error(err: reqwest::Error) -> PaymentError {
    if err.is_timeout() {
        PaymentError::Timeout
    } else {
        PaymentError::Http(err)
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<PaymentSession, PaymentError> {
        let params = Self::checkout_params(request);

        tracing::debug!(
            company_id = %request.company_id,
            package_id = %request.package.id,
            amount_cents = request.package.price_in_cents,
            "Creating Stripe checkout session"
        );

        let response = self
            .client
            .post(format!("{}/checkout/sessions", self.base_url))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .header("Idempotency-Key", uuid::Uuid::new_v4().to_string())
            .form(&params)
            .send()
            .await
            .map_err(map_transport_error)?;

        let session: CheckoutSession = Self::handle_response(response).await?;
        let checkout_url = session
            .url
            .ok_or_else(|| PaymentError::MissingCheckoutUrl(session.id.clone()))?;

        Ok(PaymentSession {
            session_id: session.id,
            checkout_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::{CompanyId, CreditPurchaseMetadata, PackageCatalog, PackageId};

    fn request() -> CheckoutRequest {
        let package = PackageCatalog::default().get_str("pack-10").unwrap().clone();
        CheckoutRequest {
            company_id: CompanyId::new("C1").unwrap(),
            metadata: CreditPurchaseMetadata {
                company_id: CompanyId::new("C1").unwrap(),
                package_id: PackageId::new("pack-10").unwrap(),
                credits_amount: package.credits,
            },
            package,
            success_url: "http://localhost:3000/credits/success".into(),
            cancel_url: "http://localhost:3000/credits/cancel".into(),
        }
    }

    #[test]
    fn checkout_params_embed_metadata_and_price() {
        let params = StripeClient::checkout_params(&request());
        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("mode"), Some("payment"));
        assert_eq!(get("client_reference_id"), Some("C1"));
        assert_eq!(get("line_items[0][price_data][unit_amount]"), Some("500"));
        assert_eq!(get("metadata[companyId]"), Some("C1"));
        assert_eq!(get("metadata[packageId]"), Some("pack-10"));
        assert_eq!(get("metadata[creditsAmount]"), Some("10"));
        assert_eq!(get("metadata[type]"), Some("credit_purchase"));
    }

    #[test]
    fn base_url_override_trims_trailing_slash() {
        let client = StripeClient::new("sk_test_xxx", Duration::from_secs(5))
            .unwrap()
            .with_base_url("http://127.0.0.1:9999/");
        assert_eq!(client.base_url, "http://127.0.0.1:9999");
    }
}
