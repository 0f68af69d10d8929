//! Administrative handlers.
//!
//! Every route here requires [`AdminAuth`]. Adjustments are the only way to
//! change a balance outside the purchase and spend flows, and the only
//! mutation still allowed on an account awaiting reconciliation.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use ledger_core::{CompanyId, PlanId, WebhookFailure};
use ledger_store::AdjustmentMode;

use crate::auth::AdminAuth;
use crate::error::ApiError;
use crate::handlers::credits::{BalanceResponse, PageQuery, MAX_PAGE_SIZE};
use crate::state::AppState;

fn parse_company(raw: &str) -> Result<CompanyId, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("invalid company id: {e}")))
}

/// Balance after an administrative mutation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminBalanceResponse {
    /// Affected company.
    pub company_id: CompanyId,
    /// New balance.
    pub balance: i64,
}

/// Adjustment request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustRequest {
    /// Company to adjust.
    pub company_id: String,
    /// Signed change in credits.
    pub delta: i64,
    /// Audit reason.
    pub reason: String,
    /// Apply a decrease even if it breaks an invariant, flagging the account.
    #[serde(default)]
    pub corrective: bool,
}

/// Apply a signed administrative adjustment.
pub async fn adjust_credits(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Json(body): Json<AdjustRequest>,
) -> Result<Json<AdminBalanceResponse>, ApiError> {
    let company_id = parse_company(&body.company_id)?;
    if body.reason.trim().is_empty() {
        return Err(ApiError::BadRequest("reason is required".into()));
    }

    let mode = if body.corrective {
        AdjustmentMode::Corrective
    } else {
        AdjustmentMode::Standard
    };

    let balance = state
        .store
        .adjust(&company_id, body.delta, &body.reason, mode)
        .await?;

    tracing::info!(
        admin_id = %admin.admin_id,
        company_id = %company_id,
        delta = body.delta,
        corrective = body.corrective,
        reason = %body.reason,
        new_balance = balance,
        "Credits adjusted"
    );

    Ok(Json(AdminBalanceResponse {
        company_id,
        balance,
    }))
}

/// Refund request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    /// Company to refund.
    pub company_id: String,
    /// Credits to return.
    pub amount: i64,
    /// The reversed action.
    pub reference: String,
}

/// Return credits for a reversed spend.
pub async fn refund_credits(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Json(body): Json<RefundRequest>,
) -> Result<Json<AdminBalanceResponse>, ApiError> {
    let company_id = parse_company(&body.company_id)?;

    let balance = state
        .store
        .refund(&company_id, body.amount, &body.reference)
        .await?;

    tracing::info!(
        admin_id = %admin.admin_id,
        company_id = %company_id,
        amount = body.amount,
        reference = %body.reference,
        new_balance = balance,
        "Credits refunded"
    );

    Ok(Json(AdminBalanceResponse {
        company_id,
        balance,
    }))
}

/// Clear the reconciliation flag once the account is consistent again.
pub async fn reconcile_company(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Path(company_id): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let company_id = parse_company(&company_id)?;
    let account = state.store.reconcile(&company_id).await?;

    tracing::info!(
        admin_id = %admin.admin_id,
        company_id = %company_id,
        balance = account.balance,
        "Account reconciled"
    );

    Ok(Json(BalanceResponse::from(account)))
}

/// Remove a company's account and its whole history.
pub async fn wipe_company(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Path(company_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let company_id = parse_company(&company_id)?;
    state.store.wipe_company(&company_id).await?;

    tracing::warn!(
        admin_id = %admin.admin_id,
        company_id = %company_id,
        "Company ledger wiped"
    );

    Ok(StatusCode::NO_CONTENT)
}

/// Plan assignment request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPlanRequest {
    /// New plan, or `null` to fall back to the free tier.
    pub plan_id: Option<String>,
}

/// Plan assignment response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanResponse {
    /// Affected company.
    pub company_id: CompanyId,
    /// Plan now on record.
    pub plan_id: Option<PlanId>,
}

/// Set or clear a company's subscription plan.
pub async fn set_company_plan(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Path(company_id): Path<String>,
    Json(body): Json<SetPlanRequest>,
) -> Result<Json<PlanResponse>, ApiError> {
    let company_id = parse_company(&company_id)?;

    let plan_id = match body.plan_id.as_deref() {
        Some(raw) => {
            let plan_id: PlanId = raw
                .parse()
                .map_err(|e| ApiError::BadRequest(format!("invalid plan id: {e}")))?;
            if state.config.plans.get(&plan_id).is_none() {
                return Err(ApiError::NotFound(format!("plan {plan_id} not found")));
            }
            Some(plan_id)
        }
        None => None,
    };

    state
        .store
        .set_company_plan(&company_id, plan_id.as_ref())
        .await?;

    tracing::info!(
        admin_id = %admin.admin_id,
        company_id = %company_id,
        plan_id = ?plan_id,
        "Company plan updated"
    );

    Ok(Json(PlanResponse {
        company_id,
        plan_id,
    }))
}

/// Webhook failure listing.
#[derive(Debug, Serialize)]
pub struct WebhookFailuresResponse {
    /// Most recent failures first.
    pub failures: Vec<WebhookFailure>,
}

/// List notifications that could not be applied.
pub async fn list_webhook_failures(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
    Query(query): Query<PageQuery>,
) -> Result<Json<WebhookFailuresResponse>, ApiError> {
    let limit = query.limit.clamp(1, MAX_PAGE_SIZE);
    let failures = state.store.list_webhook_failures(limit).await?;
    Ok(Json(WebhookFailuresResponse { failures }))
}
