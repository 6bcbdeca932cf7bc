//! Risk auditor stage.
//!
//! Reviews the filtered nominations against reference data and produces
//! itemized findings plus an overall verdict. The oracle reports the verdict,
//! but the severity floor is re-derived here: any HIGH finding means the run
//! is at least WARNING, whatever the oracle said.

use crate::error::Result;
use crate::feed::FeedProduct;
use crate::oracle::{ChatRequest, ModelTier, OracleSchema, StructuredOracle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{info, warn};

use super::prompts;
use super::selector::ProductNomination;
use super::OverallStatus;

/// Fixed enumeration of auditable risk kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskKind {
    UnknownStock,
    UnknownMargin,
    Duplicate,
    LowJoinRate,
    DiscountFatigue,
    Blacklisted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    High,
    Medium,
    Low,
}

/// One finding, anchored to a concrete SKU and campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskFinding {
    pub sku: String,
    pub campaign_id: String,
    #[serde(rename = "type")]
    pub kind: RiskKind,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AuditSummary {
    #[allow(dead_code)]
    pub(crate) total_risks: u32,
    #[allow(dead_code)]
    pub(crate) high_count: u32,
    #[allow(dead_code)]
    pub(crate) medium_count: u32,
    #[allow(dead_code)]
    pub(crate) low_count: u32,
    pub(crate) overall_status: OverallStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuditResponse {
    pub(crate) risks: Vec<RiskFinding>,
    pub(crate) summary: AuditSummary,
}

impl OracleSchema for AuditResponse {
    fn validate(&self) -> std::result::Result<(), String> {
        for finding in &self.risks {
            if finding.sku.is_empty() || finding.campaign_id.is_empty() {
                return Err("finding without a SKU+campaign anchor".to_string());
            }
        }
        Ok(())
    }
}

/// Findings plus the (floor-enforced) overall verdict.
#[derive(Debug, Clone)]
pub struct AuditOutcome {
    pub risks: Vec<RiskFinding>,
    pub overall_status: OverallStatus,
}

/// Audit the filtered nominations.
pub async fn audit_risks(
    oracle: &StructuredOracle,
    nominations: &[ProductNomination],
    feed_products: Option<&[FeedProduct]>,
    actual_week_skus: &[String],
    blacklist_skus: &BTreeSet<String>,
) -> Result<AuditOutcome> {
    let request = ChatRequest::new(
        prompts::RISK_AUDITOR_SYSTEM,
        prompts::build_risk_auditor_prompt(
            nominations,
            feed_products,
            actual_week_skus,
            blacklist_skus,
        ),
        ModelTier::Mini,
        0.1,
    );
    let response: AuditResponse = oracle.call(&request).await?;

    let mut overall_status = response.summary.overall_status;
    let has_high = response
        .risks
        .iter()
        .any(|r| r.severity == Severity::High);
    if has_high && overall_status == OverallStatus::Ok {
        warn!("auditor reported OK despite HIGH findings, escalating to WARNING");
        overall_status = OverallStatus::Warning;
    }

    info!(
        findings = response.risks.len(),
        status = %overall_status,
        "risk audit complete"
    );
    Ok(AuditOutcome {
        risks: response.risks,
        overall_status,
    })
}
