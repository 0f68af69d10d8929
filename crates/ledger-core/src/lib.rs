//! Core types for the credit ledger and entitlement service.
//!
//! This crate provides the foundational types used throughout the ledger:
//!
//! - **Identifiers**: `CompanyId`, `PackageId`, `PlanId`, `TransactionId`
//! - **Accounts**: `CompanyCreditAccount`
//! - **Credits**: `CreditTransaction`, `TransactionKind`
//! - **Catalog**: `CreditPackage`, `PackageCatalog`
//! - **Plans**: `SubscriptionPlan`, `PlanCatalog`, `Feature`
//! - **Webhooks**: `CreditPurchaseMetadata`, `ProcessedWebhookEvent`, `WebhookFailure`
//!
//! # Credit Unit
//!
//! A credit is an integral, indivisible unit stored as `i64`. Prices are kept
//! separately in cents and never converted into credits arithmetically; the
//! package catalog is the only mapping between money and credits.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod catalog;
pub mod credits;
pub mod error;
pub mod ids;
pub mod plans;
pub mod webhook;

pub use account::CompanyCreditAccount;
pub use catalog::{CreditPackage, PackageCatalog};
pub use credits::{CreditTransaction, TransactionKind};
pub use error::{require_positive, LedgerError, Result};
pub use ids::{CompanyId, IdError, PackageId, PlanId, TransactionId};
pub use plans::{features, Feature, PlanCatalog, SubscriptionPlan};
pub use webhook::{
    metadata_keys, CreditPurchaseMetadata, ProcessedWebhookEvent, WebhookFailure,
    CREDIT_PURCHASE_TYPE,
};
