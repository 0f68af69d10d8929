//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{admin, credits, features, health, webhooks};
use crate::state::AppState;

// ============================================================================
// Concurrency Limiting Constants
// ============================================================================

/// Maximum concurrent requests for caller-facing API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Maximum concurrent requests for admin endpoints.
const ADMIN_MAX_CONCURRENT_REQUESTS: usize = 10;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
/// - `GET /v1/credits/packages` - Credit package catalog
///
/// ## Credits (JWT auth)
/// - `GET /v1/credits/balance` - Current balance and totals
/// - `GET /v1/credits/transactions` - Transaction history
/// - `POST /v1/credits/checkout` - Open a payment session
/// - `POST /v1/credits/access-check` - Read-only affordability check
/// - `POST /v1/credits/spend` - Consume credits
///
/// ## Features (JWT auth)
/// - `GET /v1/features` - All enabled features
/// - `GET /v1/features/:feature` - Single feature decision
///
/// ## Admin (`X-Admin-Key`)
/// - `POST /v1/admin/credits/adjust` - Signed adjustment
/// - `POST /v1/admin/credits/refund` - Refund a reversed spend
/// - `POST /v1/admin/companies/:id/reconcile` - Clear reconciliation flag
/// - `DELETE /v1/admin/companies/:id` - Wipe a company ledger
/// - `PUT /v1/admin/companies/:id/plan` - Set or clear the plan
/// - `GET /v1/admin/webhooks/failures` - Unapplied notifications
///
/// ## Webhooks (Signature verification)
/// - `POST /webhooks/stripe` - Stripe webhooks
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let admin_routes = Router::new()
        .route("/credits/adjust", post(admin::adjust_credits))
        .route("/credits/refund", post(admin::refund_credits))
        .route(
            "/companies/:id/reconcile",
            post(admin::reconcile_company),
        )
        .route("/companies/:id", delete(admin::wipe_company))
        .route("/companies/:id/plan", put(admin::set_company_plan))
        .route("/webhooks/failures", get(admin::list_webhook_failures))
        .layer(ConcurrencyLimitLayer::new(ADMIN_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        // Credits
        .route("/credits/packages", get(credits::list_packages))
        .route("/credits/balance", get(credits::get_balance))
        .route("/credits/transactions", get(credits::list_transactions))
        .route("/credits/checkout", post(credits::checkout))
        .route("/credits/access-check", post(credits::access_check))
        .route("/credits/spend", post(credits::spend))
        // Features
        .route("/features", get(features::list_features))
        .route("/features/:feature", get(features::get_feature))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS))
        .nest("/admin", admin_routes);

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        // API v1 routes (rate limited)
        .nest("/v1", api_routes)
        // Webhooks (no rate limit - controlled by the payment provider)
        .route("/webhooks/stripe", post(webhooks::stripe_webhook))
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
