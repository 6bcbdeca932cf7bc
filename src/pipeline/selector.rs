//! Product selector stage.
//!
//! The oracle proposes campaign-to-product assignments; [`enforce_hard_rules`]
//! disposes. The filter is the authority on stock, blacklist, feed membership,
//! and cross-campaign SKU reuse - the prompt states the same rules, but the
//! oracle's adherence is advisory only. Filtering is a strict narrowing: it
//! never adds, reorders, or rescores, and acceptance order equals proposal
//! order so that first-seen-wins dedup stays reproducible.

use crate::config::Guardrails;
use crate::error::Result;
use crate::feed::FeedProduct;
use crate::oracle::{ChatRequest, ModelTier, OracleSchema, StructuredOracle};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use super::interpreter::CampaignIntent;
use super::prompts;
use super::signals::ProductSignal;

/// One proposed campaign-to-product assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductNomination {
    pub campaign_id: String,
    pub sku: String,
    pub product_name: String,
    pub reason: String,
    pub score: f64,
    #[serde(default)]
    pub risks: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NominationResponse {
    pub(crate) nominations: Vec<ProductNomination>,
}

impl OracleSchema for NominationResponse {
    fn validate(&self) -> std::result::Result<(), String> {
        for nomination in &self.nominations {
            if nomination.sku.is_empty() {
                return Err("nomination with empty sku".to_string());
            }
            if nomination.campaign_id.is_empty() {
                return Err(format!("nomination {}: empty campaignId", nomination.sku));
            }
        }
        Ok(())
    }
}

/// Ask the oracle for nominations, then apply the deterministic filter.
pub async fn select_products(
    oracle: &StructuredOracle,
    campaigns: &[CampaignIntent],
    signals: &[ProductSignal],
    feed_products: Option<&[FeedProduct]>,
    actual_week_skus: &[String],
    guardrails: &Guardrails,
) -> Result<Vec<ProductNomination>> {
    let request = ChatRequest::new(
        prompts::PRODUCT_SELECTOR_SYSTEM,
        prompts::build_product_selector_prompt(
            campaigns,
            signals,
            feed_products,
            actual_week_skus,
            guardrails,
        ),
        ModelTier::Standard,
        0.2,
    );
    let response: NominationResponse = oracle.call(&request).await?;
    let proposed = response.nominations.len();
    let accepted = enforce_hard_rules(response.nominations, feed_products, guardrails);
    info!(
        proposed,
        accepted = accepted.len(),
        "products selected"
    );
    Ok(accepted)
}

/// Drop every nomination that violates a hard rule.
///
/// Rules, in the order they are checked per nomination: blacklist, SKU
/// already accepted earlier in this pass, SKU missing from a configured feed,
/// out of stock, known stock below the minimum.
pub fn enforce_hard_rules(
    nominations: Vec<ProductNomination>,
    feed_products: Option<&[FeedProduct]>,
    guardrails: &Guardrails,
) -> Vec<ProductNomination> {
    let feed_by_sku: Option<HashMap<&str, &FeedProduct>> = feed_products
        .map(|products| products.iter().map(|p| (p.sku.as_str(), p)).collect());
    let mut used_skus: HashSet<String> = HashSet::new();

    nominations
        .into_iter()
        .filter(|nomination| {
            if guardrails.blacklist_skus.contains(&nomination.sku) {
                debug!(sku = %nomination.sku, "dropped: blacklisted");
                return false;
            }
            if used_skus.contains(&nomination.sku) {
                debug!(sku = %nomination.sku, "dropped: already nominated");
                return false;
            }
            if let Some(feed) = &feed_by_sku {
                let Some(product) = feed.get(nomination.sku.as_str()) else {
                    debug!(sku = %nomination.sku, "dropped: not in feed");
                    return false;
                };
                if product.is_out_of_stock() {
                    debug!(sku = %nomination.sku, "dropped: out of stock");
                    return false;
                }
                if let Some(stock) = product.stock {
                    if stock < guardrails.min_stock {
                        debug!(sku = %nomination.sku, stock, "dropped: below minimum stock");
                        return false;
                    }
                }
            }
            used_skus.insert(nomination.sku.clone());
            true
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nomination(campaign_id: &str, sku: &str) -> ProductNomination {
        ProductNomination {
            campaign_id: campaign_id.to_string(),
            sku: sku.to_string(),
            product_name: format!("Product {sku}"),
            reason: "strong signals".to_string(),
            score: 80.0,
            risks: Vec::new(),
        }
    }

    fn feed_product(sku: &str, availability: &str, stock: Option<u32>) -> FeedProduct {
        FeedProduct {
            sku: sku.to_string(),
            name: format!("Product {sku}"),
            category: "General".to_string(),
            brand: "Brand".to_string(),
            price: 10.0,
            availability: availability.to_string(),
            url: String::new(),
            stock,
        }
    }

    #[test]
    fn duplicate_skus_keep_first_seen_only() {
        let filtered = enforce_hard_rules(
            vec![
                nomination("c1", "A"),
                nomination("c2", "A"),
                nomination("c2", "B"),
            ],
            None,
            &Guardrails::default(),
        );
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered[0].campaign_id, "c1");
        assert_eq!(filtered[0].sku, "A");
        assert_eq!(filtered[1].sku, "B");

        let unique: HashSet<_> = filtered.iter().map(|n| n.sku.clone()).collect();
        assert_eq!(unique.len(), filtered.len());
    }

    #[test]
    fn blacklisted_skus_are_dropped() {
        let guardrails: Guardrails =
            serde_json::from_value(json!({ "blacklist_skus": ["A"] })).unwrap();
        let filtered = enforce_hard_rules(
            vec![nomination("c1", "A"), nomination("c1", "B")],
            None,
            &guardrails,
        );
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].sku, "B");
    }

    #[test]
    fn feed_membership_is_required_when_feed_exists() {
        let feed = vec![feed_product("A", "in_stock", None)];
        let filtered = enforce_hard_rules(
            vec![nomination("c1", "A"), nomination("c1", "GHOST")],
            Some(&feed),
            &Guardrails::default(),
        );
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].sku, "A");
    }

    #[test]
    fn out_of_stock_and_low_stock_are_dropped() {
        let feed = vec![
            feed_product("A", "out_of_stock", Some(50)),
            feed_product("B", "in_stock", Some(2)),
            feed_product("C", "in_stock", Some(5)),
            feed_product("D", "in_stock", None),
        ];
        let filtered = enforce_hard_rules(
            vec![
                nomination("c1", "A"),
                nomination("c1", "B"),
                nomination("c1", "C"),
                nomination("c1", "D"),
            ],
            Some(&feed),
            &Guardrails::default(),
        );
        // C meets min_stock exactly; D has unknown stock, which is allowed.
        let skus: Vec<_> = filtered.iter().map(|n| n.sku.as_str()).collect();
        assert_eq!(skus, vec!["C", "D"]);
    }

    #[test]
    fn no_feed_means_no_feed_constraints() {
        let filtered = enforce_hard_rules(
            vec![nomination("c1", "ANYTHING")],
            None,
            &Guardrails::default(),
        );
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn proposal_order_is_preserved() {
        let filtered = enforce_hard_rules(
            vec![
                nomination("c2", "B"),
                nomination("c1", "A"),
                nomination("c3", "C"),
            ],
            None,
            &Guardrails::default(),
        );
        let skus: Vec<_> = filtered.iter().map(|n| n.sku.as_str()).collect();
        assert_eq!(skus, vec!["B", "A", "C"]);
    }
}
