//! Authentication extractors.
//!
//! This module provides extractors for:
//! - `AuthUser` - Caller identity resolved from an HS256 bearer token
//! - `AdminAuth` - Admin authentication for privileged endpoints
//!
//! The company a request acts on always comes from the token, never from the
//! request body.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use ledger_core::CompanyId;

use crate::crypto::constant_time_eq;
use crate::error::ApiError;
use crate::state::AppState;

/// Role name in the token that grants [`Capability::Operator`].
pub const OPERATOR_ROLE: &str = "operator";

/// Privileges carried by a caller identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    /// Internal operator: every feature is enabled regardless of plan.
    Operator,
}

impl Capability {
    fn from_role(role: &str) -> Option<Self> {
        match role {
            OPERATOR_ROLE => Some(Self::Operator),
            _ => None,
        }
    }
}

/// JWT claims accepted by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID).
    pub sub: String,
    /// Company the user acts for.
    pub company_id: String,
    /// Role names; unknown roles are ignored.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Audience.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    /// Expiration time (Unix seconds).
    pub exp: i64,
}

/// An authenticated caller extracted from a bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The raw subject claim from the JWT.
    pub subject: String,
    /// The company this caller acts for.
    pub company_id: CompanyId,
    /// Capabilities granted by the token's roles.
    pub capabilities: BTreeSet<Capability>,
}

impl AuthUser {
    /// Whether the caller holds `capability`.
    #[must_use]
    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Whether the caller is an operator.
    #[must_use]
    pub fn is_operator(&self) -> bool {
        self.has(Capability::Operator)
    }

    /// Refuse requests that name a company other than the caller's own.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` on mismatch.
    pub fn ensure_company(&self, claimed: Option<&str>) -> Result<(), ApiError> {
        match claimed {
            Some(claimed) if claimed != self.company_id.as_str() => {
                tracing::warn!(
                    subject = %self.subject,
                    company_id = %self.company_id,
                    claimed = %claimed,
                    "Caller addressed a company it does not belong to"
                );
                Err(ApiError::Unauthorized)
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        // Extract the Bearer token
        let token = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;

        let secret = state.config.auth_jwt_secret.as_deref().ok_or_else(|| {
            tracing::warn!("AUTH_JWT_SECRET not configured - rejecting authenticated request");
            ApiError::Unauthorized
        })?;

        let claims = validate_jwt(token, secret, &state.config.auth_audience)?;

        let company_id = claims
            .company_id
            .parse::<CompanyId>()
            .map_err(|_| ApiError::Unauthorized)?;

        let capabilities = claims
            .roles
            .iter()
            .filter_map(|role| Capability::from_role(role))
            .collect();

        Ok(AuthUser {
            subject: claims.sub,
            company_id,
            capabilities,
        })
    }
}

/// Admin authentication via API key.
///
/// Requires the `X-Admin-Key` header to match the configured admin key.
#[derive(Debug, Clone)]
pub struct AdminAuth {
    /// Admin identifier (for audit logging).
    pub admin_id: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let admin_key = parts
            .headers
            .get("x-admin-key")
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let expected_key = state
            .config
            .admin_api_key
            .as_ref()
            .ok_or(ApiError::Unauthorized)?;

        if !constant_time_eq(admin_key, expected_key) {
            return Err(ApiError::Unauthorized);
        }

        let admin_id = parts
            .headers
            .get("x-admin-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("admin")
            .to_string();

        tracing::info!(admin_id = %admin_id, "Admin authenticated");

        Ok(AdminAuth { admin_id })
    }
}

/// Validate an HS256 token and return its claims.
fn validate_jwt(token: &str, secret: &str, audience: &str) -> Result<JwtClaims, ApiError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[audience]);
    validation.set_required_spec_claims(&["exp", "sub"]);

    decode::<JwtClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!(error = %e, "JWT validation failed");
        ApiError::Unauthorized
    })
}
