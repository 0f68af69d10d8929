//! Payment provider integration.
//!
//! Checkout talks to the provider through the [`PaymentProvider`] trait so the
//! HTTP layer never depends on a concrete vendor. [`StripeClient`] is the
//! production implementation; tests substitute their own.

pub mod stripe;
pub mod types;

pub use stripe::StripeClient;

use async_trait::async_trait;

use ledger_core::{CompanyId, CreditPackage, CreditPurchaseMetadata};

/// Error type for payment provider operations.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider did not answer within the configured timeout.
    #[error("payment provider timed out")]
    Timeout,

    /// The provider returned an error.
    #[error("payment provider error: {error_type} - {message}")]
    Api {
        /// Error type.
        error_type: String,
        /// Error message.
        message: String,
        /// Error code.
        code: Option<String>,
    },

    /// The provider answered without a redirect URL.
    #[error("payment session {0} has no checkout URL")]
    MissingCheckoutUrl(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// What checkout asks the provider to open.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    /// Purchasing company; also sent as the client reference.
    pub company_id: CompanyId,
    /// The catalog entry being bought.
    pub package: CreditPackage,
    /// Metadata echoed back in the completion notification.
    pub metadata: CreditPurchaseMetadata,
    /// Redirect after successful payment.
    pub success_url: String,
    /// Redirect after cancellation.
    pub cancel_url: String,
}

/// Handle to an opened payment session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSession {
    /// Provider session id.
    pub session_id: String,
    /// Where to send the buyer.
    pub checkout_url: String,
}

/// An external payment provider able to open hosted checkout sessions.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Open a one-off payment session for a credit package.
    ///
    /// Implementations must not retry; a failure or timeout is reported to the
    /// caller as-is.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError` if the provider rejects the request, fails, or
    /// times out.
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<PaymentSession, PaymentError>;
}
