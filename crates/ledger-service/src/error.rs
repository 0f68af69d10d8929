//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use ledger_core::LedgerError;
use ledger_store::StoreError;

use crate::payments::PaymentError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials, or an identity that
    /// does not match the addressed company.
    #[error("unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Authenticated payload whose content could not be interpreted.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Insufficient credits.
    #[error("insufficient credits: balance={balance}, required={required}")]
    InsufficientCredits {
        /// Current balance.
        balance: i64,
        /// Required amount.
        required: i64,
    },

    /// Duplicate event (idempotency).
    #[error("duplicate event: {0}")]
    DuplicateEvent(String),

    /// The account is frozen pending manual reconciliation.
    #[error("consistency violation for company {company_id}: {reason}")]
    ConsistencyViolation {
        /// Affected company.
        company_id: String,
        /// Broken invariant.
        reason: String,
    },

    /// Payment provider failed or timed out.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::InvalidPayload(msg) => (
                StatusCode::BAD_REQUEST,
                "invalid_payload",
                msg.clone(),
                None,
            ),
            Self::InsufficientCredits { balance, required } => (
                StatusCode::PAYMENT_REQUIRED,
                "insufficient_credits",
                self.to_string(),
                Some(serde_json::json!({
                    "balance": balance,
                    "required": required
                })),
            ),
            Self::DuplicateEvent(id) => (
                StatusCode::CONFLICT,
                "duplicate_event",
                format!("Event {id} already processed"),
                None,
            ),
            Self::ConsistencyViolation { company_id, reason } => {
                tracing::error!(
                    company_id = %company_id,
                    reason = %reason,
                    "Request refused on account awaiting reconciliation"
                );
                (
                    StatusCode::CONFLICT,
                    "consistency_violation",
                    format!("Account {company_id} requires manual reconciliation"),
                    Some(serde_json::json!({ "companyId": company_id })),
                )
            }
            Self::UpstreamUnavailable(msg) => {
                tracing::warn!(error = %msg, "Payment provider unavailable");
                (
                    StatusCode::BAD_GATEWAY,
                    "upstream_unavailable",
                    "The payment provider is unavailable".to_string(),
                    None,
                )
            }
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound("account not found".into()),
            StoreError::InsufficientCredits { balance, required } => {
                Self::InsufficientCredits { balance, required }
            }
            StoreError::DuplicateEvent { event_id } => Self::DuplicateEvent(event_id),
            StoreError::InvalidAmount(msg) => Self::BadRequest(msg),
            StoreError::ConsistencyViolation { company_id, reason } => {
                Self::ConsistencyViolation { company_id, reason }
            }
            StoreError::Database(msg) | StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        let message = err.to_string();
        match err {
            LedgerError::PackageNotFound(_) => Self::NotFound(message),
            LedgerError::InvalidAmount(_)
            | LedgerError::InvalidFeature(_)
            | LedgerError::InvalidId(_) => Self::BadRequest(message),
            LedgerError::Configuration(_) => Self::Internal(message),
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        Self::UpstreamUnavailable(err.to_string())
    }
}
