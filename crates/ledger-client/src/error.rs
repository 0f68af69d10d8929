//! Client error types.

/// Errors that can occur when using the ledger client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error response.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
        /// HTTP status code.
        status: u16,
    },

    /// Missing or rejected credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Insufficient credits.
    #[error("insufficient credits: balance={balance}, required={required}")]
    InsufficientCredits {
        /// Current balance.
        balance: i64,
        /// Required amount.
        required: i64,
    },

    /// The account is frozen pending manual reconciliation.
    #[error("account {company_id} requires reconciliation")]
    ConsistencyViolation {
        /// Affected company.
        company_id: String,
    },

    /// The payment provider failed or timed out.
    #[error("payment provider unavailable")]
    UpstreamUnavailable,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}
