//! Quality weight calculation
//!
//! Each observation starts at a base weight and gains a fixed increment for
//! every trust signal it carries. Signals contribute independently, so a
//! listing with partial evidence still counts for more than one with none.

use fitcon_common::db::settings::{
    get_setting, WEIGHT_BASE_KEY, WEIGHT_BUSINESS_SELLER_KEY, WEIGHT_DETAILED_DESCRIPTION_KEY,
    WEIGHT_OEM_REFERENCE_KEY, WEIGHT_VERIFIED_SELLER_KEY,
};
use fitcon_common::{Error, Observation, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// Weight policy: base weight plus per-signal increments
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightPolicy {
    pub base: f64,
    pub verified_seller: f64,
    pub business_seller: f64,
    pub oem_reference: f64,
    pub detailed_description: f64,
}

impl Default for WeightPolicy {
    /// Defaults mirror the seeded `settings` rows
    fn default() -> Self {
        Self {
            base: 1.0,
            verified_seller: 1.0,
            business_seller: 0.5,
            oem_reference: 1.0,
            detailed_description: 0.5,
        }
    }
}

impl WeightPolicy {
    /// Load the policy from the settings table
    ///
    /// Missing keys fall back to the defaults. Read-only: never writes.
    pub async fn load(pool: &SqlitePool) -> Result<Self> {
        let defaults = Self::default();
        let policy = Self {
            base: get_setting(pool, WEIGHT_BASE_KEY)
                .await?
                .unwrap_or(defaults.base),
            verified_seller: get_setting(pool, WEIGHT_VERIFIED_SELLER_KEY)
                .await?
                .unwrap_or(defaults.verified_seller),
            business_seller: get_setting(pool, WEIGHT_BUSINESS_SELLER_KEY)
                .await?
                .unwrap_or(defaults.business_seller),
            oem_reference: get_setting(pool, WEIGHT_OEM_REFERENCE_KEY)
                .await?
                .unwrap_or(defaults.oem_reference),
            detailed_description: get_setting(pool, WEIGHT_DETAILED_DESCRIPTION_KEY)
                .await?
                .unwrap_or(defaults.detailed_description),
        };
        policy.validate()?;
        Ok(policy)
    }

    /// All values must be finite and non-negative, otherwise adding a signal
    /// could lower an observation's weight
    pub fn validate(&self) -> Result<()> {
        let values = [
            (WEIGHT_BASE_KEY, self.base),
            (WEIGHT_VERIFIED_SELLER_KEY, self.verified_seller),
            (WEIGHT_BUSINESS_SELLER_KEY, self.business_seller),
            (WEIGHT_OEM_REFERENCE_KEY, self.oem_reference),
            (WEIGHT_DETAILED_DESCRIPTION_KEY, self.detailed_description),
        ];
        for (key, value) in values {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::Config(format!(
                    "Quality weight '{}' must be a non-negative number, got {}",
                    key, value
                )));
            }
        }
        Ok(())
    }

    /// Quality weight of a single observation
    pub fn weight(&self, observation: &Observation) -> f64 {
        let mut weight = self.base;
        if observation.is_verified_seller {
            weight += self.verified_seller;
        }
        if observation.seller_is_business {
            weight += self.business_seller;
        }
        if observation.has_oem_reference {
            weight += self.oem_reference;
        }
        if observation.has_detailed_description {
            weight += self.detailed_description;
        }
        weight
    }

    /// Sum of weights over a group
    pub fn total_weight(&self, observations: &[Observation]) -> f64 {
        observations.iter().map(|o| self.weight(o)).sum()
    }
}
