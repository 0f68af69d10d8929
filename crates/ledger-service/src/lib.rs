//! Credit ledger HTTP API service.
//!
//! This crate provides the HTTP API in front of the ledger store:
//!
//! - Credit balance, history, checkout and spend
//! - Feature entitlement checks
//! - Stripe payment webhooks
//! - Administrative adjustments and reconciliation
//!
//! # Authentication
//!
//! The service supports two authentication methods:
//!
//! 1. **HS256 JWT bearer tokens** - For callers acting for a company. The
//!    company always comes from the token.
//! 2. **Admin API key** - `X-Admin-Key` for administrative routes.
//!
//! Webhooks are authenticated by their signature header instead.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers are async for Axum even when trivial

pub mod auth;
pub mod authorizer;
pub mod checkout;
pub mod config;
pub mod crypto;
pub mod entitlements;
pub mod error;
pub mod handlers;
pub mod ingest;
pub mod payments;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use payments::{PaymentError, PaymentProvider, StripeClient};
pub use routes::create_router;
pub use state::AppState;
