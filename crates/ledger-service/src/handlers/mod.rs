//! API handlers.

pub mod admin;
pub mod credits;
pub mod features;
pub mod health;
pub mod webhooks;
