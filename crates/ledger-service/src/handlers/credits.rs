//! Credit balance, purchase and spend handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use ledger_core::{CompanyCreditAccount, CompanyId, CreditPackage, CreditTransaction};

use crate::auth::AuthUser;
use crate::authorizer::{self, AccessDecision};
use crate::checkout::{self, PurchaseSession};
use crate::error::ApiError;
use crate::state::AppState;

/// Default page size for history listings.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Largest page size a caller may request.
pub const MAX_PAGE_SIZE: usize = 100;

/// Catalog response.
#[derive(Debug, Serialize)]
pub struct PackagesResponse {
    /// Packages on sale.
    pub packages: Vec<CreditPackage>,
}

/// List the credit packages on sale.
pub async fn list_packages(State(state): State<Arc<AppState>>) -> Json<PackagesResponse> {
    Json(PackagesResponse {
        packages: state.config.packages.packages().to_vec(),
    })
}

/// Account balance and lifetime totals.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    /// Company the account belongs to.
    pub company_id: CompanyId,
    /// Spendable credits.
    pub balance: i64,
    /// Lifetime credits added.
    pub purchased_total: i64,
    /// Lifetime credits consumed.
    pub spent_total: i64,
    /// Whether automated mutations are blocked pending reconciliation.
    pub needs_reconciliation: bool,
}

impl BalanceResponse {
    /// Zero balance for a company that has no account yet.
    #[must_use]
    pub fn empty(company_id: CompanyId) -> Self {
        Self {
            company_id,
            balance: 0,
            purchased_total: 0,
            spent_total: 0,
            needs_reconciliation: false,
        }
    }
}

impl From<CompanyCreditAccount> for BalanceResponse {
    fn from(account: CompanyCreditAccount) -> Self {
        Self {
            company_id: account.company_id,
            balance: account.balance,
            purchased_total: account.purchased_total,
            spent_total: account.spent_total,
            needs_reconciliation: account.needs_reconciliation,
        }
    }
}

/// Get the caller's balance. A company without an account reads as zero.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<BalanceResponse>, ApiError> {
    let response = state
        .store
        .get_account(&auth.company_id)
        .await?
        .map_or_else(
            || BalanceResponse::empty(auth.company_id.clone()),
            BalanceResponse::from,
        );

    Ok(Json(response))
}

/// Transaction list query parameters.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    /// Maximum number of items to return (default: 50, max: 100).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    DEFAULT_PAGE_SIZE
}

/// Transaction response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    /// Transaction ID.
    pub id: String,
    /// Transaction kind.
    pub kind: String,
    /// Signed amount (positive = credit, negative = debit).
    pub amount: i64,
    /// Balance after this transaction.
    pub balance_after: i64,
    /// External reference.
    pub reference: String,
    /// Description.
    pub description: String,
    /// Timestamp.
    pub created_at: String,
}

impl From<&CreditTransaction> for TransactionResponse {
    fn from(tx: &CreditTransaction) -> Self {
        Self {
            id: tx.id.to_string(),
            kind: tx.kind.as_str().to_string(),
            amount: tx.amount,
            balance_after: tx.balance_after,
            reference: tx.reference.clone(),
            description: tx.description.clone(),
            created_at: tx.created_at.to_rfc3339(),
        }
    }
}

/// List transactions response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTransactionsResponse {
    /// Transactions (newest first).
    pub transactions: Vec<TransactionResponse>,
    /// Whether there are more transactions.
    pub has_more: bool,
}

/// List the caller's transaction history.
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<ListTransactionsResponse>, ApiError> {
    // Fetch one more than requested to determine has_more
    let limit = query.limit.clamp(1, MAX_PAGE_SIZE);
    let transactions = state
        .store
        .list_transactions(&auth.company_id, limit + 1, query.offset)
        .await?;

    let has_more = transactions.len() > limit;
    let transactions: Vec<_> = transactions
        .iter()
        .take(limit)
        .map(TransactionResponse::from)
        .collect();

    Ok(Json(ListTransactionsResponse {
        transactions,
        has_more,
    }))
}

/// Checkout request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutBody {
    /// Package to buy.
    pub package_id: String,
    /// Company the caller believes it is buying for. Must match the token.
    #[serde(default)]
    pub company_id: Option<String>,
}

/// Open a payment session for a credit package.
pub async fn checkout(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<CheckoutBody>,
) -> Result<Json<PurchaseSession>, ApiError> {
    let session = checkout::start_purchase(
        &state,
        &auth,
        body.company_id.as_deref(),
        &body.package_id,
    )
    .await?;

    Ok(Json(session))
}

/// Access-check request.
#[derive(Debug, Deserialize)]
pub struct AccessCheckBody {
    /// Credits the gated action would consume.
    pub cost: i64,
}

/// Read-only check whether the caller can afford an action.
pub async fn access_check(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<AccessCheckBody>,
) -> Result<Json<AccessDecision>, ApiError> {
    Ok(Json(
        authorizer::can_access_lead(&state, &auth, body.cost).await?,
    ))
}

/// Spend request.
#[derive(Debug, Deserialize)]
pub struct SpendBody {
    /// Credits to consume.
    pub cost: i64,
    /// Id of the action consuming the credits.
    pub reference: String,
}

/// Spend response.
#[derive(Debug, Serialize)]
pub struct SpendResponse {
    /// Balance after the debit.
    pub balance: i64,
}

/// Consume credits for an action that is proceeding.
pub async fn spend(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<SpendBody>,
) -> Result<Json<SpendResponse>, ApiError> {
    let balance = authorizer::spend(&state, &auth, body.cost, &body.reference).await?;
    Ok(Json(SpendResponse { balance }))
}
