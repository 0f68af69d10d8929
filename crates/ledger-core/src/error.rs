//! Error types for the ledger domain.

use crate::ids::IdError;

/// Result type for ledger domain operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur in ledger domain operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Unknown credit package.
    #[error("package not found: {0}")]
    PackageNotFound(String),

    /// Invalid amount (zero, negative, or otherwise out of range).
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Invalid feature name.
    #[error("invalid feature name: {0:?}")]
    InvalidFeature(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Require a strictly positive credit amount.
///
/// # Errors
///
/// Returns `LedgerError::InvalidAmount` for zero or negative amounts.
pub fn require_positive(amount: i64) -> Result<i64> {
    if amount > 0 {
        Ok(amount)
    } else {
        Err(LedgerError::InvalidAmount(format!(
            "amount must be positive, got {amount}"
        )))
    }
}
