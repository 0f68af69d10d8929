//! Checkout initiation.
//!
//! Opens a hosted payment session for a catalog package. Nothing is written
//! to the ledger here; credits only arrive through the payment webhook.

use serde::Serialize;

use ledger_core::{CompanyId, CreditPurchaseMetadata, PackageId};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::payments::CheckoutRequest;
use crate::state::AppState;

/// Handle returned to the buyer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseSession {
    /// Provider session id.
    pub session_id: String,
    /// Where to redirect the buyer.
    pub checkout_url: String,
    /// Package being bought.
    pub package_id: PackageId,
    /// Credits the package grants once paid.
    pub credits: i64,
}

/// Open a payment session for `package_id` on behalf of the caller's company.
///
/// `claimed_company` is the company the request addressed, if any; it must
/// match the caller's identity.
///
/// # Errors
///
/// - `ApiError::Unauthorized` if `claimed_company` differs from the caller's.
/// - `ApiError::NotFound` if the package is not in the catalog.
/// - `ApiError::UpstreamUnavailable` if no provider is configured or the
///   provider fails or times out. The call is not retried.
pub async fn start_purchase(
    state: &AppState,
    caller: &AuthUser,
    claimed_company: Option<&str>,
    package_id: &str,
) -> Result<PurchaseSession, ApiError> {
    caller.ensure_company(claimed_company)?;
    let company_id: &CompanyId = &caller.company_id;

    let package = state
        .config
        .packages
        .require(package_id)?
        .clone();

    let provider = state
        .payments
        .as_ref()
        .ok_or_else(|| ApiError::UpstreamUnavailable("payment provider not configured".into()))?;

    let frontend = state.config.frontend_url.trim_end_matches('/');
    let request = CheckoutRequest {
        company_id: company_id.clone(),
        metadata: CreditPurchaseMetadata {
            company_id: company_id.clone(),
            package_id: package.id.clone(),
            credits_amount: package.credits,
        },
        success_url: format!("{frontend}/credits/success?session_id={{CHECKOUT_SESSION_ID}}"),
        cancel_url: format!("{frontend}/credits/cancel"),
        package,
    };

    tracing::info!(
        company_id = %company_id,
        package_id = %request.package.id,
        credits = request.package.credits,
        amount_cents = request.package.price_in_cents,
        "Initiating credit purchase"
    );

    let session = provider.create_checkout_session(&request).await?;

    tracing::info!(
        company_id = %company_id,
        session_id = %session.session_id,
        "Checkout session created"
    );

    Ok(PurchaseSession {
        session_id: session.session_id,
        checkout_url: session.checkout_url,
        package_id: request.package.id,
        credits: request.package.credits,
    })
}
