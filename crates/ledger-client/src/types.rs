//! Request and response types for the ledger client.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

pub use ledger_core::{CreditPackage, TransactionKind};

/// Credit package catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct PackagesResponse {
    /// Packages on sale.
    pub packages: Vec<CreditPackage>,
}

/// Balance and lifetime totals of the caller's company.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    /// Company the account belongs to.
    pub company_id: String,
    /// Spendable credits.
    pub balance: i64,
    /// Lifetime credits added.
    pub purchased_total: i64,
    /// Lifetime credits consumed.
    pub spent_total: i64,
    /// Whether the account is frozen pending reconciliation.
    pub needs_reconciliation: bool,
}

/// A ledger entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Transaction ID.
    pub id: String,
    /// Transaction kind.
    pub kind: TransactionKind,
    /// Signed amount.
    pub amount: i64,
    /// Balance after this transaction.
    pub balance_after: i64,
    /// External reference.
    pub reference: String,
    /// Description.
    pub description: String,
    /// RFC 3339 timestamp.
    pub created_at: String,
}

/// One page of transaction history.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPage {
    /// Transactions (newest first).
    pub transactions: Vec<Transaction>,
    /// Whether more transactions exist past this page.
    pub has_more: bool,
}

/// Checkout request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CheckoutRequest<'a> {
    pub package_id: &'a str,
}

/// Opened payment session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseSession {
    /// Provider session id.
    pub session_id: String,
    /// Where to redirect the buyer.
    pub checkout_url: String,
    /// Package being bought.
    pub package_id: String,
    /// Credits granted once paid.
    pub credits: i64,
}

/// Access-check request.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct AccessCheckRequest {
    pub cost: i64,
}

/// Result of a read-only access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct AccessDecision {
    /// Whether the balance covers the cost.
    pub allowed: bool,
    /// Balance at the time of the check.
    pub balance: i64,
}

/// Spend request.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct SpendRequest<'a> {
    pub cost: i64,
    pub reference: &'a str,
}

/// Balance after a spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SpendResponse {
    /// New balance.
    pub balance: i64,
}

/// How a feature set was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitlementSource {
    /// Operator capability.
    Operator,
    /// Subscription plan.
    Plan,
    /// Free-tier defaults.
    FreeTier,
}

/// Every feature enabled for the caller.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entitlements {
    /// Resolution source.
    pub source: EntitlementSource,
    /// Plan in effect, if any.
    #[serde(default)]
    pub plan_id: Option<String>,
    /// Enabled feature names.
    pub features: BTreeSet<String>,
}

/// Single feature decision.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeatureAccess {
    /// Normalised feature name.
    pub feature: String,
    /// Whether the caller may use it.
    pub allowed: bool,
}

/// Administrative adjustment request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustRequest {
    /// Company to adjust.
    pub company_id: String,
    /// Signed change in credits.
    pub delta: i64,
    /// Audit reason.
    pub reason: String,
    /// Apply a decrease even if the account ends up frozen.
    pub corrective: bool,
}

/// Balance after an administrative mutation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminBalanceResponse {
    /// Affected company.
    pub company_id: String,
    /// New balance.
    pub balance: i64,
}

/// API error response.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

/// API error body.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}
