//! Payment webhook bookkeeping types.
//!
//! The metadata envelope is attached to a payment session by checkout and read
//! back from the completion notification. The processed-event marker is the
//! idempotency guard for crediting; failure records capture notifications that
//! could not be applied so an operator can follow up by hand.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CompanyId, PackageId};

/// Metadata `type` value marking a credit purchase session.
pub const CREDIT_PURCHASE_TYPE: &str = "credit_purchase";

/// Metadata keys written on the payment session.
pub mod metadata_keys {
    /// Purchasing company.
    pub const COMPANY_ID: &str = "companyId";
    /// Purchased package.
    pub const PACKAGE_ID: &str = "packageId";
    /// Informational credit quantity; never trusted on the way back.
    pub const CREDITS_AMOUNT: &str = "creditsAmount";
    /// Session purpose.
    pub const TYPE: &str = "type";
}

/// The metadata envelope embedded in a credit purchase payment session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditPurchaseMetadata {
    /// Purchasing company.
    pub company_id: CompanyId,
    /// Purchased package.
    pub package_id: PackageId,
    /// Credits at the time the session was opened (informational only).
    pub credits_amount: i64,
}

impl CreditPurchaseMetadata {
    /// Flatten into the string map payment providers accept as metadata.
    #[must_use]
    pub fn to_map(&self) -> HashMap<String, String> {
        HashMap::from([
            (
                metadata_keys::COMPANY_ID.to_string(),
                self.company_id.to_string(),
            ),
            (
                metadata_keys::PACKAGE_ID.to_string(),
                self.package_id.to_string(),
            ),
            (
                metadata_keys::CREDITS_AMOUNT.to_string(),
                self.credits_amount.to_string(),
            ),
            (
                metadata_keys::TYPE.to_string(),
                CREDIT_PURCHASE_TYPE.to_string(),
            ),
        ])
    }

    /// Parse the envelope back out of a notification's metadata object.
    ///
    /// `creditsAmount` is optional and parsed leniently since the trusted amount
    /// always comes from the catalog.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the metadata is not a credit
    /// purchase envelope or its identifiers are missing or malformed.
    pub fn from_json(metadata: &serde_json::Value) -> Result<Self, String> {
        let field = |key: &str| metadata.get(key).and_then(serde_json::Value::as_str);

        match field(metadata_keys::TYPE) {
            Some(CREDIT_PURCHASE_TYPE) => {}
            Some(other) => return Err(format!("unexpected metadata type {other:?}")),
            None => return Err("metadata type missing".into()),
        }

        let company_id = field(metadata_keys::COMPANY_ID)
            .ok_or("metadata companyId missing")?
            .parse::<CompanyId>()
            .map_err(|e| format!("invalid companyId: {e}"))?;

        let package_id = field(metadata_keys::PACKAGE_ID)
            .ok_or("metadata packageId missing")?
            .parse::<PackageId>()
            .map_err(|e| format!("invalid packageId: {e}"))?;

        let credits_amount = metadata
            .get(metadata_keys::CREDITS_AMOUNT)
            .and_then(|v| {
                v.as_i64()
                    .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
            })
            .unwrap_or(0);

        Ok(Self {
            company_id,
            package_id,
            credits_amount,
        })
    }
}

/// Marker proving a payment event has been applied to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedWebhookEvent {
    /// Provider event id (unique).
    pub event_id: String,
    /// Company that was credited.
    pub company_id: CompanyId,
    /// Credits applied.
    pub credits: i64,
    /// When the event was applied.
    pub processed_at: DateTime<Utc>,
}

impl ProcessedWebhookEvent {
    /// Create a marker stamped now.
    #[must_use]
    pub fn new(event_id: impl Into<String>, company_id: CompanyId, credits: i64) -> Self {
        Self {
            event_id: event_id.into(),
            company_id,
            credits,
            processed_at: Utc::now(),
        }
    }
}

/// An authenticated notification that could not be applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookFailure {
    /// Provider event id.
    pub event_id: String,
    /// Provider event type.
    pub event_type: String,
    /// Why the event was not applied.
    pub reason: String,
    /// The metadata as received.
    pub metadata: serde_json::Value,
    /// When the failure was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl WebhookFailure {
    /// Create a failure record stamped now.
    #[must_use]
    pub fn new(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        reason: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            reason: reason.into(),
            metadata,
            recorded_at: Utc::now(),
        }
    }
}
