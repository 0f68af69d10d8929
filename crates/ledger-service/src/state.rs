//! Application state.

use std::sync::Arc;
use std::time::Duration;

use ledger_store::Store;

use crate::config::ServiceConfig;
use crate::payments::{PaymentProvider, StripeClient};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The ledger store.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Payment provider used by checkout (optional).
    pub payments: Option<Arc<dyn PaymentProvider>>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// A Stripe client is built when `stripe_api_key` is configured.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Self {
        let timeout = Duration::from_secs(config.payment_timeout_seconds);
        let payments = config.stripe_api_key.as_ref().and_then(|key| {
            match StripeClient::new(key, timeout) {
                Ok(client) => {
                    tracing::info!("Stripe integration enabled");
                    Some(Arc::new(client) as Arc<dyn PaymentProvider>)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create Stripe client");
                    None
                }
            }
        });

        if payments.is_none() {
            tracing::warn!("Stripe not configured - checkout will not be available");
        }

        if config.stripe_webhook_secret.is_none() {
            tracing::warn!("Stripe webhook secret not configured - all webhooks will be rejected");
        }

        Self {
            store,
            config,
            payments,
        }
    }

    /// Replace the payment provider.
    #[must_use]
    pub fn with_payment_provider(mut self, provider: Arc<dyn PaymentProvider>) -> Self {
        self.payments = Some(provider);
        self
    }
}
