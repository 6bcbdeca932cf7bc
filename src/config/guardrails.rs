//! Guardrail resolution.
//!
//! Guardrails bound the oracle-driven stages with deterministic limits. The
//! resolver never fails: an absent or malformed blob yields the defaults
//! wholesale, with no partial merge of invalid input. Explicit overrides can
//! be layered onto a base record with [`merge`], which revalidates the result.

use crate::error::{PromoError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

/// Deterministic limits applied on top of oracle output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guardrails {
    /// Minimum stock a product must have to be nominated, when stock is known.
    #[serde(default = "default_min_stock")]
    pub min_stock: u32,
    /// Upper bound on campaigns interpreted for a single week.
    #[serde(default = "default_max_campaigns_per_week")]
    pub max_campaigns_per_week: u32,
    /// Upper bound on products nominated into one campaign.
    #[serde(default = "default_max_products_per_campaign")]
    pub max_products_per_campaign: u32,
    /// Join rate below which the audit should flag the run, 0..=1.
    #[serde(default = "default_join_threshold")]
    pub join_threshold: f64,
    /// Sales lookback window in days.
    #[serde(default = "default_product_lookback_days")]
    pub product_lookback_days: u32,
    /// SKUs that must never be nominated.
    #[serde(default)]
    pub blacklist_skus: BTreeSet<String>,
    /// Days since the last promotion under which a product counts as fatigued.
    #[serde(default = "default_discount_fatigue_days")]
    pub discount_fatigue_days: u32,
}

fn default_min_stock() -> u32 {
    5
}

fn default_max_campaigns_per_week() -> u32 {
    10
}

fn default_max_products_per_campaign() -> u32 {
    20
}

fn default_join_threshold() -> f64 {
    0.7
}

fn default_product_lookback_days() -> u32 {
    30
}

fn default_discount_fatigue_days() -> u32 {
    14
}

impl Default for Guardrails {
    fn default() -> Self {
        Self {
            min_stock: default_min_stock(),
            max_campaigns_per_week: default_max_campaigns_per_week(),
            max_products_per_campaign: default_max_products_per_campaign(),
            join_threshold: default_join_threshold(),
            product_lookback_days: default_product_lookback_days(),
            blacklist_skus: BTreeSet::new(),
            discount_fatigue_days: default_discount_fatigue_days(),
        }
    }
}

impl Guardrails {
    /// Range checks that serde cannot express.
    fn check(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.join_threshold) {
            return Err(PromoError::validation_for_field(
                "join_threshold",
                "must be between 0 and 1",
            ));
        }
        Ok(())
    }
}

/// Resolve an arbitrary configuration blob into a fully-populated record.
///
/// Missing blob, wrong shape, or out-of-range values all fall back to the
/// defaults; guardrail problems must never fail a pipeline run.
pub fn resolve(raw: &serde_json::Value) -> Guardrails {
    if !raw.is_object() {
        return Guardrails::default();
    }
    match serde_json::from_value::<Guardrails>(raw.clone()) {
        Ok(guardrails) if guardrails.check().is_ok() => guardrails,
        Ok(_) | Err(_) => {
            warn!("invalid guardrail configuration, using defaults");
            Guardrails::default()
        }
    }
}

/// Overlay explicit fields onto a base record and revalidate.
///
/// Unlike [`resolve`], an invalid merge result is an error: overrides are
/// operator-supplied and should not be silently discarded.
pub fn merge(base: &Guardrails, overrides: &serde_json::Value) -> Result<Guardrails> {
    let overrides = overrides
        .as_object()
        .ok_or_else(|| PromoError::validation("guardrail overrides must be an object"))?;

    let mut merged = serde_json::to_value(base)
        .map_err(|e| PromoError::validation(format!("failed to encode base guardrails: {e}")))?;
    let Some(target) = merged.as_object_mut() else {
        return Err(PromoError::validation("base guardrails must encode to an object"));
    };
    for (key, value) in overrides {
        target.insert(key.clone(), value.clone());
    }

    let merged: Guardrails = serde_json::from_value(merged)
        .map_err(|e| PromoError::validation(format!("invalid guardrail overrides: {e}")))?;
    merged.check()?;
    Ok(merged)
}
