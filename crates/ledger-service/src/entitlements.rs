//! Feature entitlement resolution.
//!
//! Resolution order for a caller:
//! 1. The operator capability enables every feature.
//! 2. Otherwise the company's plan decides.
//! 3. With no plan on record, or a plan missing from the catalog, the
//!    free-tier defaults apply.
//!
//! Credit balances are never consulted.

use std::collections::BTreeSet;

use serde::Serialize;

use ledger_core::{Feature, PlanId, SubscriptionPlan};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Where a resolved feature set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitlementSource {
    /// The caller is an operator.
    Operator,
    /// The company's subscription plan.
    Plan,
    /// Free-tier defaults.
    FreeTier,
}

/// The full set of features enabled for a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedEntitlements {
    /// How the set was resolved.
    pub source: EntitlementSource,
    /// Plan in effect, when `source` is `Plan`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<PlanId>,
    /// Enabled features.
    pub features: BTreeSet<Feature>,
}

enum Resolution<'a> {
    Operator,
    Plan(&'a SubscriptionPlan),
    FreeTier,
}

async fn resolve<'a>(state: &'a AppState, caller: &AuthUser) -> Result<Resolution<'a>, ApiError> {
    if caller.is_operator() {
        return Ok(Resolution::Operator);
    }

    let Some(plan_id) = state.store.get_company_plan(&caller.company_id).await? else {
        return Ok(Resolution::FreeTier);
    };

    match state.config.plans.get(&plan_id) {
        Some(plan) => Ok(Resolution::Plan(plan)),
        None => {
            tracing::warn!(
                company_id = %caller.company_id,
                plan_id = %plan_id,
                "Company references a plan missing from the catalog - using free tier"
            );
            Ok(Resolution::FreeTier)
        }
    }
}

/// Whether the caller may use `feature`.
///
/// # Errors
///
/// - `ApiError::BadRequest` if `feature` is not a valid feature name.
/// - `ApiError::Internal` if the plan reference cannot be read.
pub async fn has_feature_access(
    state: &AppState,
    caller: &AuthUser,
    feature: &str,
) -> Result<bool, ApiError> {
    let feature = Feature::new(feature)?;

    let allowed = match resolve(state, caller).await? {
        Resolution::Operator => true,
        Resolution::Plan(plan) => plan.includes(&feature),
        Resolution::FreeTier => state.config.plans.free_tier_allows(&feature),
    };

    tracing::debug!(
        company_id = %caller.company_id,
        feature = %feature,
        allowed = allowed,
        "Feature access resolved"
    );

    Ok(allowed)
}

/// Every feature enabled for the caller, with its source.
///
/// Operators receive every feature any plan in the catalog knows about.
///
/// # Errors
///
/// Returns `ApiError::Internal` if the plan reference cannot be read.
pub async fn enabled_features(
    state: &AppState,
    caller: &AuthUser,
) -> Result<ResolvedEntitlements, ApiError> {
    let catalog = &state.config.plans;

    let resolved = match resolve(state, caller).await? {
        Resolution::Operator => ResolvedEntitlements {
            source: EntitlementSource::Operator,
            plan_id: None,
            features: catalog
                .plans()
                .iter()
                .flat_map(|plan| plan.features.iter().cloned())
                .chain(catalog.free_tier_features())
                .collect(),
        },
        Resolution::Plan(plan) => ResolvedEntitlements {
            source: EntitlementSource::Plan,
            plan_id: Some(plan.id.clone()),
            features: plan.features.clone(),
        },
        Resolution::FreeTier => ResolvedEntitlements {
            source: EntitlementSource::FreeTier,
            plan_id: None,
            features: catalog.free_tier_features(),
        },
    };

    Ok(resolved)
}
