//! Feature entitlement handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::auth::AuthUser;
use crate::entitlements::{self, ResolvedEntitlements};
use crate::error::ApiError;
use crate::state::AppState;

/// List every feature enabled for the caller.
pub async fn list_features(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<ResolvedEntitlements>, ApiError> {
    Ok(Json(entitlements::enabled_features(&state, &auth).await?))
}

/// Single feature decision.
#[derive(Debug, Serialize)]
pub struct FeatureAccessResponse {
    /// Normalised feature name.
    pub feature: String,
    /// Whether the caller may use it.
    pub allowed: bool,
}

/// Check a single feature.
pub async fn get_feature(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(feature): Path<String>,
) -> Result<Json<FeatureAccessResponse>, ApiError> {
    let allowed = entitlements::has_feature_access(&state, &auth, &feature).await?;

    Ok(Json(FeatureAccessResponse {
        feature: feature.trim().to_ascii_uppercase(),
        allowed,
    }))
}
