//! Credit package catalog.
//!
//! The catalog is static configuration. Both checkout (to price the payment
//! line item) and webhook ingestion (to recompute the trusted credit amount)
//! read it; neither ever trusts a credit amount supplied by a client.

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::PackageId;

/// A purchasable bundle of credits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditPackage {
    /// Package identifier.
    pub id: PackageId,
    /// Display name shown on the payment page.
    pub name: String,
    /// Credits granted when the package is paid for.
    pub credits: i64,
    /// Price in cents (USD).
    pub price_in_cents: i64,
}

/// The immutable set of packages on sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageCatalog {
    packages: Vec<CreditPackage>,
}

impl PackageCatalog {
    /// Build a catalog, validating every entry.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Configuration` if the catalog is empty, contains
    /// duplicate ids, or has a package with non-positive credits or price.
    pub fn new(packages: Vec<CreditPackage>) -> Result<Self> {
        if packages.is_empty() {
            return Err(LedgerError::Configuration(
                "credit package catalog is empty".into(),
            ));
        }

        for (index, package) in packages.iter().enumerate() {
            if package.credits <= 0 || package.price_in_cents <= 0 {
                return Err(LedgerError::Configuration(format!(
                    "package {} must have positive credits and price",
                    package.id
                )));
            }
            if packages[..index].iter().any(|p| p.id == package.id) {
                return Err(LedgerError::Configuration(format!(
                    "duplicate package id {}",
                    package.id
                )));
            }
        }

        Ok(Self { packages })
    }

    /// Parse a catalog from a JSON array of packages.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Configuration` if the JSON is malformed or the
    /// catalog fails validation.
    pub fn from_json(json: &str) -> Result<Self> {
        let packages: Vec<CreditPackage> = serde_json::from_str(json)
            .map_err(|e| LedgerError::Configuration(format!("invalid package catalog: {e}")))?;
        Self::new(packages)
    }

    /// Look up a package by id.
    #[must_use]
    pub fn get(&self, id: &PackageId) -> Option<&CreditPackage> {
        self.packages.iter().find(|p| &p.id == id)
    }

    /// Look up a package by its raw id string.
    #[must_use]
    pub fn get_str(&self, id: &str) -> Option<&CreditPackage> {
        self.packages.iter().find(|p| p.id.as_str() == id)
    }

    /// Look up a package that must exist.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::PackageNotFound` for an id not in the catalog.
    pub fn require(&self, id: &str) -> Result<&CreditPackage> {
        self.get_str(id)
            .ok_or_else(|| LedgerError::PackageNotFound(id.to_string()))
    }

    /// All packages, in catalog order.
    #[must_use]
    pub fn packages(&self) -> &[CreditPackage] {
        &self.packages
    }
}

impl Default for PackageCatalog {
    fn default() -> Self {
        // INVARIANT: the literal ids below satisfy `PackageId` validation.
        let package = |id: &str, name: &str, credits, price_in_cents| CreditPackage {
            id: PackageId::new(id).expect("static package ids are valid"),
            name: name.to_string(),
            credits,
            price_in_cents,
        };

        Self {
            packages: vec![
                package("pack-10", "10 credits", 10, 500),
                package("pack-50", "50 credits", 50, 2_000),
                package("pack-100", "100 credits", 100, 3_500),
                package("pack-500", "500 credits", 500, 15_000),
            ],
        }
    }
}
