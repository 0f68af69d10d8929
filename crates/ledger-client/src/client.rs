//! Ledger HTTP client implementation.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};

use crate::error::ClientError;
use crate::types::{
    AccessCheckRequest, AccessDecision, AdjustRequest, AdminBalanceResponse, ApiErrorResponse,
    BalanceResponse, CheckoutRequest, CreditPackage, Entitlements, FeatureAccess,
    PackagesResponse, PurchaseSession, SpendRequest, SpendResponse, TransactionPage,
};

/// Credit ledger API client.
///
/// Caller-facing methods authenticate with the bearer token the client was
/// built with; administrative methods require [`ClientOptions::admin_key`].
#[derive(Debug, Clone)]
pub struct LedgerClient {
    client: Client,
    base_url: String,
    bearer_token: String,
    admin_key: Option<String>,
}

impl LedgerClient {
    /// Create a new ledger client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the ledger service (e.g., `"http://ledger:8080"`)
    /// * `bearer_token` - JWT identifying the caller and its company
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Configuration` if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        bearer_token: impl Into<String>,
    ) -> Result<Self, ClientError> {
        Self::with_options(base_url, bearer_token, ClientOptions::default())
    }

    /// Create a new ledger client with custom options.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Configuration` if the HTTP client cannot be built.
    pub fn with_options(
        base_url: impl Into<String>,
        bearer_token: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()
            .map_err(|e| ClientError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bearer_token: bearer_token.into(),
            admin_key: options.admin_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("authorization", format!("Bearer {}", self.bearer_token))
    }

    fn admin(&self, request: RequestBuilder) -> Result<RequestBuilder, ClientError> {
        let key = self
            .admin_key
            .as_ref()
            .ok_or_else(|| ClientError::Configuration("admin key not set".into()))?;
        Ok(request.header("x-admin-key", key))
    }

    // =========================================================================
    // Credits
    // =========================================================================

    /// List the credit packages on sale.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn packages(&self) -> Result<Vec<CreditPackage>, ClientError> {
        let response = self
            .client
            .get(self.url("/v1/credits/packages"))
            .send()
            .await?;

        let body: PackagesResponse = Self::handle_response(response).await?;
        Ok(body.packages)
    }

    /// Get the caller's balance and lifetime totals.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn balance(&self) -> Result<BalanceResponse, ClientError> {
        let response = self
            .authed(self.client.get(self.url("/v1/credits/balance")))
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Fetch one page of transaction history, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn transactions(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<TransactionPage, ClientError> {
        let response = self
            .authed(self.client.get(self.url("/v1/credits/transactions")))
            .query(&[("limit", limit), ("offset", offset)])
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Open a payment session for a credit package.
    ///
    /// # Errors
    ///
    /// - `ClientError::NotFound` for an unknown package.
    /// - `ClientError::UpstreamUnavailable` if the payment provider failed.
    pub async fn checkout(&self, package_id: &str) -> Result<PurchaseSession, ClientError> {
        let response = self
            .authed(self.client.post(self.url("/v1/credits/checkout")))
            .json(&CheckoutRequest { package_id })
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Read-only check whether the caller can afford `cost`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn can_access_lead(&self, cost: i64) -> Result<AccessDecision, ClientError> {
        let response = self
            .authed(self.client.post(self.url("/v1/credits/access-check")))
            .json(&AccessCheckRequest { cost })
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Consume `cost` credits for the action identified by `reference`.
    ///
    /// Returns the new balance.
    ///
    /// # Errors
    ///
    /// - `ClientError::InsufficientCredits` if the balance does not cover it.
    /// - `ClientError::ConsistencyViolation` if the account is frozen.
    pub async fn spend(&self, cost: i64, reference: &str) -> Result<i64, ClientError> {
        let response = self
            .authed(self.client.post(self.url("/v1/credits/spend")))
            .json(&SpendRequest { cost, reference })
            .send()
            .await?;

        let body: SpendResponse = Self::handle_response(response).await?;
        tracing::debug!(cost = cost, reference = %reference, balance = body.balance, "Credits spent");
        Ok(body.balance)
    }

    // =========================================================================
    // Features
    // =========================================================================

    /// Every feature enabled for the caller.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn features(&self) -> Result<Entitlements, ClientError> {
        let response = self
            .authed(self.client.get(self.url("/v1/features")))
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Whether the caller may use `feature`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn has_feature_access(&self, feature: &str) -> Result<bool, ClientError> {
        let response = self
            .authed(self.client.get(self.url(&format!("/v1/features/{feature}"))))
            .send()
            .await?;

        let body: FeatureAccess = Self::handle_response(response).await?;
        Ok(body.allowed)
    }

    // =========================================================================
    // Admin
    // =========================================================================

    /// Apply a signed administrative adjustment.
    ///
    /// # Errors
    ///
    /// - `ClientError::Configuration` if no admin key was configured.
    /// - `ClientError::InsufficientCredits` for a standard decrease below zero.
    pub async fn adjust(&self, request: &AdjustRequest) -> Result<AdminBalanceResponse, ClientError> {
        let response = self
            .admin(self.client.post(self.url("/v1/admin/credits/adjust")))?
            .json(request)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Clear the reconciliation flag of a repaired account.
    ///
    /// # Errors
    ///
    /// - `ClientError::Configuration` if no admin key was configured.
    /// - `ClientError::ConsistencyViolation` if the account is still broken.
    pub async fn reconcile(&self, company_id: &str) -> Result<BalanceResponse, ClientError> {
        let path = format!("/v1/admin/companies/{company_id}/reconcile");
        let response = self
            .admin(self.client.post(self.url(&path)))?
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        // Try to parse error response
        let error_body: Result<ApiErrorResponse, _> = response.json().await;

        let Ok(api_error) = error_body else {
            return Err(ClientError::Api {
                code: "unknown".to_string(),
                message: format!("HTTP {status}"),
                status: status.as_u16(),
            });
        };

        let detail = |key: &str| {
            api_error
                .error
                .details
                .as_ref()
                .and_then(|d| d.get(key))
        };

        // Map specific error codes to typed errors
        let err = match api_error.error.code.as_str() {
            "unauthorized" => ClientError::Unauthorized,
            "insufficient_credits" => ClientError::InsufficientCredits {
                balance: detail("balance")
                    .and_then(serde_json::Value::as_i64)
                    .unwrap_or(0),
                required: detail("required")
                    .and_then(serde_json::Value::as_i64)
                    .unwrap_or(0),
            },
            "consistency_violation" => ClientError::ConsistencyViolation {
                company_id: detail("companyId")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            },
            "upstream_unavailable" => ClientError::UpstreamUnavailable,
            "not_found" => ClientError::NotFound(api_error.error.message.clone()),
            code => ClientError::Api {
                code: code.to_string(),
                message: api_error.error.message.clone(),
                status: status.as_u16(),
            },
        };

        Err(err)
    }
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 30).
    pub timeout_seconds: u64,
    /// Admin API key for administrative endpoints.
    pub admin_key: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            admin_key: None,
        }
    }
}

impl ClientOptions {
    /// Create options carrying an admin key.
    #[must_use]
    pub fn with_admin_key(key: impl Into<String>) -> Self {
        Self {
            admin_key: Some(key.into()),
            ..Self::default()
        }
    }
}
