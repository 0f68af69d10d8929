//! Company credit account types.
//!
//! This module defines the per-company balance record the ledger maintains.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CompanyId;

/// The credit account of a single company.
///
/// There is exactly one account per company; `company_id` is its primary key.
/// Accounts are created lazily with a zero balance on the first purchase or
/// debit attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyCreditAccount {
    /// The owning company.
    pub company_id: CompanyId,

    /// Current spendable balance in credits.
    pub balance: i64,

    /// Lifetime credits added (purchases and positive adjustments).
    pub purchased_total: i64,

    /// Lifetime credits consumed (spends and negative adjustments, net of refunds).
    pub spent_total: i64,

    /// Set when an invariant was found broken. Automated mutations are refused
    /// until an operator reconciles the account.
    pub needs_reconciliation: bool,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl CompanyCreditAccount {
    /// Create a new account with zero balance.
    #[must_use]
    pub fn new(company_id: CompanyId) -> Self {
        let now = Utc::now();
        Self {
            company_id,
            balance: 0,
            purchased_total: 0,
            spent_total: 0,
            needs_reconciliation: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the account has sufficient credits for a deduction.
    #[must_use]
    pub fn has_sufficient_credits(&self, amount: i64) -> bool {
        self.balance >= amount
    }

    /// Verify `balance == purchased_total - spent_total` and `balance >= 0`.
    ///
    /// # Errors
    ///
    /// Returns a description of the first broken invariant.
    pub fn check_invariants(&self) -> Result<(), String> {
        let Some(expected) = self.purchased_total.checked_sub(self.spent_total) else {
            return Err(format!(
                "purchased_total {} - spent_total {} overflows",
                self.purchased_total, self.spent_total
            ));
        };
        if self.balance != expected {
            return Err(format!(
                "balance {} does not match purchased_total - spent_total = {}",
                self.balance, expected
            ));
        }
        if self.balance < 0 {
            return Err(format!("balance {} is negative", self.balance));
        }
        Ok(())
    }
}
