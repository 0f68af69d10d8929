//! Credit-gated actions.
//!
//! Checking and consuming are separate steps: [`can_access_lead`] only reads
//! the balance, and [`spend`] debits once the gated action actually proceeds.
//! A failing [`spend`] is authoritative even after a positive check.

use serde::Serialize;

use ledger_core::require_positive;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Result of a read-only access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    /// Whether the balance covers the cost right now.
    pub allowed: bool,
    /// Balance the decision was made against.
    pub balance: i64,
}

/// Whether the caller's company can currently afford `cost`.
///
/// A company without an account reads as balance 0; no account is created.
///
/// # Errors
///
/// - `ApiError::BadRequest` if `cost <= 0`.
/// - `ApiError::Internal` if the store cannot be read.
pub async fn can_access_lead(
    state: &AppState,
    caller: &AuthUser,
    cost: i64,
) -> Result<AccessDecision, ApiError> {
    require_positive(cost)?;

    let balance = state.store.get_balance(&caller.company_id).await?;
    let allowed = balance >= cost;

    tracing::debug!(
        company_id = %caller.company_id,
        cost = cost,
        balance = balance,
        allowed = allowed,
        "Lead access check"
    );

    Ok(AccessDecision { allowed, balance })
}

/// Consume `cost` credits for the action identified by `reference`.
///
/// Returns the new balance.
///
/// # Errors
///
/// - `ApiError::BadRequest` if `cost <= 0` or `reference` is blank.
/// - `ApiError::InsufficientCredits` if the balance does not cover `cost`.
/// - `ApiError::ConsistencyViolation` if the account awaits reconciliation.
pub async fn spend(
    state: &AppState,
    caller: &AuthUser,
    cost: i64,
    reference: &str,
) -> Result<i64, ApiError> {
    require_positive(cost)?;

    let reference = reference.trim();
    if reference.is_empty() {
        return Err(ApiError::BadRequest("reference is required".into()));
    }

    let balance = state
        .store
        .debit(&caller.company_id, cost, reference)
        .await?;

    tracing::info!(
        company_id = %caller.company_id,
        subject = %caller.subject,
        cost = cost,
        reference = %reference,
        balance = balance,
        "Credits spent"
    );

    Ok(balance)
}
