//! Credit ledger client SDK.
//!
//! This crate provides a client library for applications that gate actions
//! on company credits or feature entitlements.
//!
//! # Example
//!
//! ```no_run
//! use ledger_client::LedgerClient;
//!
//! # async fn example() -> Result<(), ledger_client::ClientError> {
//! let client = LedgerClient::new("http://ledger.billing.svc:8080", "caller-jwt")?;
//!
//! // Check first, consume only once the action proceeds
//! let decision = client.can_access_lead(5).await?;
//! if decision.allowed {
//!     let balance = client.spend(5, "lead-42").await?;
//!     println!("New balance: {balance} credits");
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod types;

pub use client::{ClientOptions, LedgerClient};
pub use error::ClientError;
pub use types::*;
