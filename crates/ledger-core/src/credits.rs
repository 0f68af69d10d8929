//! Credit transaction types.
//!
//! Every change to an account's balance appends exactly one transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CompanyId, TransactionId};

/// A credit transaction representing a balance change.
///
/// Transactions are append-only and use ULIDs for time-ordered IDs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditTransaction {
    /// Unique transaction ID (ULID for time-ordering).
    pub id: TransactionId,

    /// The company whose balance was affected.
    pub company_id: CompanyId,

    /// Type of transaction.
    pub kind: TransactionKind,

    /// Signed amount in credits. Positive = credit, Negative = debit.
    pub amount: i64,

    /// Balance after this transaction.
    pub balance_after: i64,

    /// External reference: payment event id, consuming action id, or
    /// adjustment reason.
    pub reference: String,

    /// Human-readable description.
    pub description: String,

    /// When the transaction was created.
    pub created_at: DateTime<Utc>,
}

impl CreditTransaction {
    fn new(
        company_id: CompanyId,
        kind: TransactionKind,
        amount: i64,
        balance_after: i64,
        reference: String,
        description: String,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            company_id,
            kind,
            amount,
            balance_after,
            reference,
            description,
            created_at: Utc::now(),
        }
    }

    /// Create a purchase transaction for credits bought through a payment event.
    #[must_use]
    pub fn purchase(
        company_id: CompanyId,
        amount: i64,
        balance_after: i64,
        reference: String,
    ) -> Self {
        let description = format!("Purchased {amount} credits");
        Self::new(
            company_id,
            TransactionKind::Purchase,
            amount.abs(),
            balance_after,
            reference,
            description,
        )
    }

    /// Create a spend transaction (deduction).
    #[must_use]
    pub fn spend(
        company_id: CompanyId,
        amount: i64,
        balance_after: i64,
        reference: String,
    ) -> Self {
        let description = format!("Spent {} credits", amount.abs());
        Self::new(
            company_id,
            TransactionKind::Spend,
            -amount.abs(), // Always negative for spends
            balance_after,
            reference,
            description,
        )
    }

    /// Create an administrative adjustment. `delta` keeps its sign.
    #[must_use]
    pub fn admin_adjustment(
        company_id: CompanyId,
        delta: i64,
        balance_after: i64,
        reason: String,
    ) -> Self {
        let description = format!("Administrative adjustment of {delta} credits: {reason}");
        Self::new(
            company_id,
            TransactionKind::AdminAdjustment,
            delta,
            balance_after,
            reason,
            description,
        )
    }

    /// Create a refund transaction returning credits for a reversed spend.
    #[must_use]
    pub fn refund(
        company_id: CompanyId,
        amount: i64,
        balance_after: i64,
        reference: String,
    ) -> Self {
        let description = format!("Refunded {} credits", amount.abs());
        Self::new(
            company_id,
            TransactionKind::Refund,
            amount.abs(),
            balance_after,
            reference,
            description,
        )
    }
}

/// Type of credit transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Credits bought through a confirmed payment.
    Purchase,

    /// Credits consumed by a gated action.
    Spend,

    /// Operator correction, positive or negative.
    AdminAdjustment,

    /// Credits returned for a reversed spend.
    Refund,
}

impl TransactionKind {
    /// Stable storage name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::Spend => "spend",
            Self::AdminAdjustment => "admin_adjustment",
            Self::Refund => "refund",
        }
    }

    /// Parse the storage name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "purchase" => Some(Self::Purchase),
            "spend" => Some(Self::Spend),
            "admin_adjustment" => Some(Self::AdminAdjustment),
            "refund" => Some(Self::Refund),
            _ => None,
        }
    }
}
