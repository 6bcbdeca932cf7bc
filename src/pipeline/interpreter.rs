//! Campaign interpreter stage.
//!
//! Turns raw MASTER rows into structured campaign intents for the target
//! week. Week relevance, status filtering, and the UNKNOWN convention are
//! prompt policy enforced by the output schema; returning zero campaigns is a
//! legitimate outcome that short-circuits the run.

use crate::error::Result;
use crate::oracle::{ChatRequest, ModelTier, OracleSchema, StructuredOracle};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use super::prompts;

/// One campaign to fill for the target week. Immutable once interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignIntent {
    pub id: String,
    pub theme: String,
    pub discount_type: String,
    #[serde(default)]
    pub constraints: Vec<String>,
    /// 1-10, 10 highest.
    pub priority: u8,
    #[serde(default)]
    pub target_category: Option<String>,
    #[serde(default)]
    pub target_brand: Option<String>,
    pub max_products: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CampaignResponse {
    pub(crate) campaigns: Vec<CampaignIntent>,
}

impl OracleSchema for CampaignResponse {
    fn validate(&self) -> std::result::Result<(), String> {
        for campaign in &self.campaigns {
            if campaign.id.is_empty() {
                return Err("campaign with empty id".to_string());
            }
            if !(1..=10).contains(&campaign.priority) {
                return Err(format!(
                    "campaign {}: priority {} outside 1-10",
                    campaign.id, campaign.priority
                ));
            }
            if campaign.max_products < 1 {
                return Err(format!("campaign {}: maxProducts must be >= 1", campaign.id));
            }
        }
        Ok(())
    }
}

/// Interpret the MASTER rows into campaign intents for `week_start`.
pub async fn interpret_campaigns(
    oracle: &StructuredOracle,
    week_start: &str,
    master_rows: &[HashMap<String, String>],
    actual_week_rows: &[HashMap<String, String>],
    max_campaigns: u32,
) -> Result<Vec<CampaignIntent>> {
    let request = ChatRequest::new(
        prompts::CAMPAIGN_INTERPRETER_SYSTEM,
        prompts::build_campaign_interpreter_prompt(
            week_start,
            master_rows,
            actual_week_rows,
            max_campaigns,
        ),
        ModelTier::Standard,
        0.1,
    );
    let response: CampaignResponse = oracle.call(&request).await?;
    info!(count = response.campaigns.len(), "campaigns interpreted");
    Ok(response.campaigns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedOracle;
    use serde_json::json;
    use std::sync::Arc;

    fn campaign_json(id: &str, priority: u8) -> serde_json::Value {
        json!({
            "id": id,
            "theme": "Spring push",
            "discountType": "percentage",
            "constraints": [],
            "priority": priority,
            "targetCategory": null,
            "targetBrand": null,
            "maxProducts": 5
        })
    }

    #[tokio::test]
    async fn parses_and_returns_campaigns() {
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.push_json(&json!({ "campaigns": [campaign_json("c1", 8)] }));

        let structured = StructuredOracle::new(oracle);
        let campaigns = interpret_campaigns(&structured, "2024-01-01", &[], &[], 10)
            .await
            .unwrap();
        assert_eq!(campaigns.len(), 1);
        assert_eq!(campaigns[0].id, "c1");
        assert_eq!(campaigns[0].discount_type, "percentage");
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_range_priority_is_a_schema_violation() {
        let oracle = Arc::new(ScriptedOracle::new());
        // Same invalid reply three times: the violation must exhaust retries.
        for _ in 0..3 {
            oracle.push_json(&json!({ "campaigns": [campaign_json("c1", 11)] }));
        }

        let structured = StructuredOracle::new(oracle);
        let err = interpret_campaigns(&structured, "2024-01-01", &[], &[], 10)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("priority"));
    }

    #[tokio::test]
    async fn zero_campaigns_is_a_valid_outcome() {
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.push_json(&json!({ "campaigns": [] }));

        let structured = StructuredOracle::new(oracle);
        let campaigns = interpret_campaigns(&structured, "2024-01-01", &[], &[], 10)
            .await
            .unwrap();
        assert!(campaigns.is_empty());
    }
}
