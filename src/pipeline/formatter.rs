//! Nomination formatter stage.
//!
//! Produces the final sheet rows. The status column is force-set to the
//! pending-approval sentinel after the oracle call - approval state is a hard
//! rule, never the oracle's to decide.

use crate::error::Result;
use crate::oracle::{ChatRequest, ModelTier, OracleSchema, StructuredOracle};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::auditor::RiskFinding;
use super::interpreter::CampaignIntent;
use super::prompts;
use super::selector::ProductNomination;

/// Status written on every freshly generated row.
pub const PENDING_APPROVAL_STATUS: &str = "PENDING APPROVAL";

/// One row of the NEXT-WEEK tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NominationRow {
    pub week: String,
    pub theme: String,
    pub discount_type: String,
    pub sku: String,
    pub product_name: String,
    pub reason: String,
    pub action: String,
    pub status: String,
    pub notes: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RowsResponse {
    pub(crate) rows: Vec<NominationRow>,
}

impl OracleSchema for RowsResponse {
    fn validate(&self) -> std::result::Result<(), String> {
        for row in &self.rows {
            if row.sku.is_empty() {
                return Err("row with empty sku".to_string());
            }
        }
        Ok(())
    }
}

/// Format the filtered nominations into final sheet rows.
pub async fn format_nominations(
    oracle: &StructuredOracle,
    week_start: &str,
    nominations: &[ProductNomination],
    campaigns: &[CampaignIntent],
    risks: &[RiskFinding],
) -> Result<Vec<NominationRow>> {
    let request = ChatRequest::new(
        prompts::NOMINATION_FORMATTER_SYSTEM,
        prompts::build_nomination_formatter_prompt(week_start, nominations, campaigns, risks),
        ModelTier::Mini,
        0.1,
    );
    let response: RowsResponse = oracle.call(&request).await?;
    let rows = response
        .rows
        .into_iter()
        .map(|row| NominationRow {
            status: PENDING_APPROVAL_STATUS.to_string(),
            ..row
        })
        .collect::<Vec<_>>();
    info!(rows = rows.len(), "nominations formatted");
    Ok(rows)
}
