//! Storage layer for the credit ledger.
//!
//! The [`Store`] trait is the Ledger Store: the only component allowed to mutate
//! company credit accounts and their transaction history. Two backends are
//! provided:
//!
//! - [`MemoryStore`]: all tables behind a single async mutex. Used for local
//!   development and tests.
//! - [`PgStore`]: PostgreSQL via `sqlx`, with embedded migrations.
//!
//! # Atomicity
//!
//! Every mutating operation touches exactly one account row and appends exactly
//! one transaction row; `credit` additionally writes the processed-event
//! marker. These writes are applied together or not at all. Debits are a single
//! conditional update ("subtract only if the result stays non-negative"), so
//! concurrent debits can never drive a balance below zero.
//!
//! # Example
//!
//! ```no_run
//! use ledger_core::CompanyId;
//! use ledger_store::{MemoryStore, Store};
//!
//! # async fn demo() -> ledger_store::Result<()> {
//! let store = MemoryStore::new();
//! let company = CompanyId::new("C1").unwrap();
//!
//! store.credit(&company, 10, "evt-1", "evt-1").await?;
//! let balance = store.debit(&company, 4, "lead-42").await?;
//! assert_eq!(balance, 6);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;
pub mod postgres;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use ledger_core::{
    CompanyCreditAccount, CompanyId, CreditTransaction, PlanId, WebhookFailure,
};

/// How an administrative adjustment treats a decrease below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdjustmentMode {
    /// Refuse decreases that would make the balance negative.
    #[default]
    Standard,
    /// The decrease already happened in the real world; apply it anyway and
    /// flag the account for reconciliation if an invariant breaks.
    Corrective,
}

/// The storage trait defining all ledger operations.
///
/// Implementations must make each mutating call atomic with respect to every
/// other call on the same company.
#[async_trait]
pub trait Store: Send + Sync {
    // =========================================================================
    // Account Operations
    // =========================================================================

    /// Get the account of a company, if one exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_account(&self, company_id: &CompanyId) -> Result<Option<CompanyCreditAccount>>;

    /// Current balance. A missing account reads as zero and is not created.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_balance(&self, company_id: &CompanyId) -> Result<i64> {
        Ok(self
            .get_account(company_id)
            .await?
            .map_or(0, |account| account.balance))
    }

    /// Administrative wipe: remove the account and all of its transactions.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the company has no account.
    async fn wipe_company(&self, company_id: &CompanyId) -> Result<()>;

    /// Clear `needs_reconciliation` after an operator repaired the account.
    ///
    /// Returns the reconciled account.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the company has no account.
    /// - `StoreError::ConsistencyViolation` if an invariant is still broken.
    async fn reconcile(&self, company_id: &CompanyId) -> Result<CompanyCreditAccount>;

    // =========================================================================
    // Ledger Mutations
    // =========================================================================

    /// Credit a confirmed purchase and record the idempotency marker in the
    /// same atomic unit.
    ///
    /// Returns the new balance.
    ///
    /// # Errors
    ///
    /// - `StoreError::InvalidAmount` if `amount <= 0`.
    /// - `StoreError::DuplicateEvent` if `idempotency_key` was already applied.
    /// - `StoreError::ConsistencyViolation` if the account is frozen.
    async fn credit(
        &self,
        company_id: &CompanyId,
        amount: i64,
        reference: &str,
        idempotency_key: &str,
    ) -> Result<i64>;

    /// Consume credits. Creates a zero-balance account on first use.
    ///
    /// Returns the new balance.
    ///
    /// # Errors
    ///
    /// - `StoreError::InvalidAmount` if `amount <= 0`.
    /// - `StoreError::InsufficientCredits` if the balance is below `amount`;
    ///   nothing is written in that case.
    /// - `StoreError::ConsistencyViolation` if the account is frozen.
    async fn debit(&self, company_id: &CompanyId, amount: i64, reference: &str) -> Result<i64>;

    /// Administrative adjustment by a signed `delta`.
    ///
    /// Returns the new balance.
    ///
    /// # Errors
    ///
    /// - `StoreError::InvalidAmount` if `delta == 0`.
    /// - `StoreError::InsufficientCredits` if a standard decrease would make
    ///   the balance negative.
    async fn adjust(
        &self,
        company_id: &CompanyId,
        delta: i64,
        reason: &str,
        mode: AdjustmentMode,
    ) -> Result<i64>;

    /// Return credits for a spend whose downstream action was reversed.
    ///
    /// Returns the new balance.
    ///
    /// # Errors
    ///
    /// - `StoreError::InvalidAmount` if `amount <= 0` or exceeds the lifetime
    ///   spent total.
    /// - `StoreError::NotFound` if the company has no account.
    /// - `StoreError::ConsistencyViolation` if the account is frozen.
    async fn refund(&self, company_id: &CompanyId, amount: i64, reference: &str) -> Result<i64>;

    // =========================================================================
    // Transaction History
    // =========================================================================

    /// List transactions for a company, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_transactions(
        &self,
        company_id: &CompanyId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>>;

    // =========================================================================
    // Webhook Bookkeeping
    // =========================================================================

    /// Whether a payment event has already been applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn has_processed_event(&self, event_id: &str) -> Result<bool>;

    /// Persist a notification that could not be applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn record_webhook_failure(&self, failure: &WebhookFailure) -> Result<()>;

    /// Most recent webhook failures, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_webhook_failures(&self, limit: usize) -> Result<Vec<WebhookFailure>>;

    // =========================================================================
    // Plan References
    // =========================================================================

    /// The plan a company is subscribed to, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_company_plan(&self, company_id: &CompanyId) -> Result<Option<PlanId>>;

    /// Set or clear a company's plan reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn set_company_plan(&self, company_id: &CompanyId, plan_id: Option<&PlanId>)
        -> Result<()>;
}

/// Reject non-positive amounts.
pub(crate) fn require_positive(amount: i64) -> Result<()> {
    ledger_core::require_positive(amount)
        .map(|_| ())
        .map_err(|e| StoreError::InvalidAmount(e.to_string()))
}

/// Apply a signed administrative delta to `account`.
///
/// A positive delta adds to `purchased_total`, a negative one to
/// `spent_total`. Overflowing any column is refused, as is a standard-mode
/// decrease below zero; a refusal leaves `account` untouched. An applied
/// delta that breaks an invariant flags the account for reconciliation.
pub(crate) fn apply_adjustment(
    account: &mut CompanyCreditAccount,
    delta: i64,
    mode: AdjustmentMode,
) -> Result<()> {
    let overflow =
        || StoreError::InvalidAmount(format!("adjustment of {delta} overflows the account totals"));

    let balance = account.balance.checked_add(delta).ok_or_else(overflow)?;
    let (purchased_total, spent_total) = if delta > 0 {
        let purchased = account.purchased_total.checked_add(delta).ok_or_else(overflow)?;
        (purchased, account.spent_total)
    } else {
        let decrease = delta.checked_neg().ok_or_else(overflow)?;
        if balance < 0 && mode == AdjustmentMode::Standard {
            return Err(StoreError::InsufficientCredits {
                balance: account.balance,
                required: decrease,
            });
        }
        let spent = account.spent_total.checked_add(decrease).ok_or_else(overflow)?;
        (account.purchased_total, spent)
    };

    account.balance = balance;
    account.purchased_total = purchased_total;
    account.spent_total = spent_total;
    if account.check_invariants().is_err() {
        account.needs_reconciliation = true;
    }
    account.updated_at = chrono::Utc::now();
    Ok(())
}

/// Refuse automated mutation of an account that is flagged or whose
/// invariants no longer hold.
///
/// A newly detected break sets `needs_reconciliation` on `account`; the caller
/// is responsible for persisting the flag before returning the error.
pub(crate) fn guard_automated_mutation(account: &mut CompanyCreditAccount) -> Result<()> {
    let reason = match account.check_invariants() {
        Err(reason) => reason,
        Ok(()) if account.needs_reconciliation => {
            "account is awaiting reconciliation".to_string()
        }
        Ok(()) => return Ok(()),
    };

    if !account.needs_reconciliation {
        account.needs_reconciliation = true;
        account.updated_at = chrono::Utc::now();
        tracing::error!(
            company_id = %account.company_id,
            balance = account.balance,
            purchased_total = account.purchased_total,
            spent_total = account.spent_total,
            reason = %reason,
            "Account invariant broken, freezing automated mutation"
        );
    }

    Err(StoreError::ConsistencyViolation {
        company_id: account.company_id.to_string(),
        reason,
    })
}
