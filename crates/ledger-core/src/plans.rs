//! Subscription plans and feature entitlements.
//!
//! Feature gating is orthogonal to the credit balance: a plan decides *which*
//! features a company may use, credits decide *how much* it may consume.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::PlanId;

/// Well-known feature names.
pub mod features {
    /// AI-assisted generation.
    pub const AI_GENERATION: &str = "AI_GENERATION";
    /// The floor-plan editor.
    pub const FLOOR_PLAN_EDITOR: &str = "FLOOR_PLAN_EDITOR";
    /// Document and image conversion.
    pub const DOCUMENT_CONVERSION: &str = "DOCUMENT_CONVERSION";
    /// Access to purchasable leads.
    pub const LEAD_ACCESS: &str = "LEAD_ACCESS";
    /// Multiple team seats.
    pub const TEAM_SEATS: &str = "TEAM_SEATS";
    /// Priority support channel.
    pub const PRIORITY_SUPPORT: &str = "PRIORITY_SUPPORT";
}

/// A named product feature, in upper snake case (e.g. `AI_GENERATION`).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Feature(String);

impl Feature {
    /// Parse a feature name. Lowercase input is normalised to upper case.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidFeature` for empty names or names with
    /// characters other than ASCII letters, digits and underscores.
    pub fn new(name: &str) -> Result<Self> {
        let name = name.trim();
        if name.is_empty()
            || name.len() > 64
            || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(LedgerError::InvalidFeature(name.to_string()));
        }
        Ok(Self(name.to_ascii_uppercase()))
    }

    /// The feature name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Feature {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for Feature {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<Feature> for String {
    fn from(feature: Feature) -> Self {
        feature.0
    }
}

impl fmt::Debug for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Feature({})", self.0)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A subscription plan in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPlan {
    /// Plan identifier.
    pub id: PlanId,
    /// Display name.
    pub name: String,
    /// Ordering of plans; higher is more capable.
    pub tier: u8,
    /// Features enabled by this plan.
    pub features: BTreeSet<Feature>,
    /// Monthly price in cents.
    pub price_in_cents: i64,
}

impl SubscriptionPlan {
    /// Whether this plan enables `feature`.
    #[must_use]
    pub fn includes(&self, feature: &Feature) -> bool {
        self.features.contains(feature)
    }
}

/// On-disk shape of the plan catalog.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlanCatalogFile {
    plans: Vec<SubscriptionPlan>,
    #[serde(default)]
    free_tier: BTreeMap<Feature, bool>,
}

/// The plan catalog plus the free-tier defaults used when a company has no
/// plan on record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanCatalog {
    plans: Vec<SubscriptionPlan>,
    free_tier: BTreeMap<Feature, bool>,
}

impl PlanCatalog {
    /// Build a catalog. Plans are kept sorted by tier.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Configuration` on duplicate plan ids.
    pub fn new(
        mut plans: Vec<SubscriptionPlan>,
        free_tier: BTreeMap<Feature, bool>,
    ) -> Result<Self> {
        plans.sort_by_key(|p| p.tier);
        for (index, plan) in plans.iter().enumerate() {
            if plans[..index].iter().any(|p| p.id == plan.id) {
                return Err(LedgerError::Configuration(format!(
                    "duplicate plan id {}",
                    plan.id
                )));
            }
        }
        Ok(Self { plans, free_tier })
    }

    /// Parse `{"plans": [...], "freeTier": {"FEATURE": bool}}`.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Configuration` if the JSON is malformed or invalid.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: PlanCatalogFile = serde_json::from_str(json)
            .map_err(|e| LedgerError::Configuration(format!("invalid plan catalog: {e}")))?;
        Self::new(file.plans, file.free_tier)
    }

    /// Look up a plan.
    #[must_use]
    pub fn get(&self, id: &PlanId) -> Option<&SubscriptionPlan> {
        self.plans.iter().find(|p| &p.id == id)
    }

    /// All plans ordered by tier.
    #[must_use]
    pub fn plans(&self) -> &[SubscriptionPlan] {
        &self.plans
    }

    /// The documented free-tier default for a feature. Features absent from
    /// the map are disabled.
    #[must_use]
    pub fn free_tier_allows(&self, feature: &Feature) -> bool {
        self.free_tier.get(feature).copied().unwrap_or(false)
    }

    /// Features enabled on the free tier.
    #[must_use]
    pub fn free_tier_features(&self) -> BTreeSet<Feature> {
        self.free_tier
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(feature, _)| feature.clone())
            .collect()
    }
}

impl Default for PlanCatalog {
    fn default() -> Self {
        use features::{
            AI_GENERATION, DOCUMENT_CONVERSION, FLOOR_PLAN_EDITOR, LEAD_ACCESS, PRIORITY_SUPPORT,
            TEAM_SEATS,
        };

        // INVARIANT: the literal names below satisfy `Feature`/`PlanId` validation.
        let set = |names: &[&str]| -> BTreeSet<Feature> {
            names
                .iter()
                .map(|n| Feature::new(n).expect("static feature names are valid"))
                .collect()
        };
        let plan = |id: &str, name: &str, tier, names: &[&str], price_in_cents| SubscriptionPlan {
            id: PlanId::new(id).expect("static plan ids are valid"),
            name: name.to_string(),
            tier,
            features: set(names),
            price_in_cents,
        };

        let plans = vec![
            plan("free", "Free", 0, &[FLOOR_PLAN_EDITOR, LEAD_ACCESS], 0),
            plan(
                "starter",
                "Starter",
                1,
                &[FLOOR_PLAN_EDITOR, LEAD_ACCESS, DOCUMENT_CONVERSION],
                2_900,
            ),
            plan(
                "professional",
                "Professional",
                2,
                &[
                    FLOOR_PLAN_EDITOR,
                    LEAD_ACCESS,
                    DOCUMENT_CONVERSION,
                    AI_GENERATION,
                ],
                7_900,
            ),
            plan(
                "enterprise",
                "Enterprise",
                3,
                &[
                    FLOOR_PLAN_EDITOR,
                    LEAD_ACCESS,
                    DOCUMENT_CONVERSION,
                    AI_GENERATION,
                    TEAM_SEATS,
                    PRIORITY_SUPPORT,
                ],
                24_900,
            ),
        ];

        let free_tier = [
            (FLOOR_PLAN_EDITOR, true),
            (LEAD_ACCESS, true),
            (DOCUMENT_CONVERSION, false),
            (AI_GENERATION, false),
            (TEAM_SEATS, false),
            (PRIORITY_SUPPORT, false),
        ]
        .into_iter()
        .map(|(name, enabled)| (Feature::new(name).expect("static feature names are valid"), enabled))
        .collect();

        Self { plans, free_tier }
    }
}
