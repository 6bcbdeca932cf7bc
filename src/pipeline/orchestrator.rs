//! Pipeline orchestration.
//!
//! One run is a strictly ordered pass through the stages; each stage awaits
//! fully before the next starts because later prompts embed earlier results.
//! The orchestrator owns the write-back decision: dry runs compute the full
//! result and mutate nothing, write runs replace the target week's rows and
//! append to the run log afterwards.

use crate::config::{ClientConfig, RunMode};
use crate::error::Result;
use crate::feed::FeedSource;
use crate::oracle::{Oracle, StructuredOracle};
use crate::progress::ProgressObserver;
use crate::sheets::SheetStore;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::auditor;
use super::formatter;
use super::interpreter;
use super::loader;
use super::selector;
use super::signals;
use super::writeback::{self, RunLogEntry};
use super::{OverallStatus, PipelineStep};

/// Everything needed to execute one run.
#[derive(Debug, Clone)]
pub struct PipelineInput {
    pub week_start: NaiveDate,
    pub mode: RunMode,
    pub client: ClientConfig,
}

/// Aggregate numbers attached to every result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub campaign_count: usize,
    pub product_count: usize,
    pub unique_skus: usize,
    /// Unique nominated SKUs over signal count, two decimals.
    pub join_rate: f64,
}

impl RunStats {
    fn zero() -> Self {
        Self {
            campaign_count: 0,
            product_count: 0,
            unique_skus: 0,
            join_rate: 0.0,
        }
    }
}

/// Full result of one run, also the payload persisted to run history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub run_id: String,
    pub week_start: String,
    pub mode: RunMode,
    pub campaigns: Vec<interpreter::CampaignIntent>,
    pub signals: Vec<signals::ProductSignal>,
    pub nominations: Vec<selector::ProductNomination>,
    pub risks: Vec<auditor::RiskFinding>,
    pub final_rows: Vec<formatter::NominationRow>,
    pub stats: RunStats,
    pub fingerprints: BTreeMap<String, String>,
    pub overall_status: OverallStatus,
}

impl RunOutcome {
    fn empty(
        run_id: String,
        week_start: String,
        mode: RunMode,
        fingerprints: BTreeMap<String, String>,
        overall_status: OverallStatus,
    ) -> Self {
        Self {
            run_id,
            week_start,
            mode,
            campaigns: Vec::new(),
            signals: Vec::new(),
            nominations: Vec::new(),
            risks: Vec::new(),
            final_rows: Vec::new(),
            stats: RunStats::zero(),
            fingerprints,
            overall_status,
        }
    }
}

/// The six-stage weekly pipeline.
pub struct Pipeline {
    oracle: StructuredOracle,
    sheets: Arc<dyn SheetStore>,
    feed: Option<Arc<dyn FeedSource>>,
}

impl Pipeline {
    pub fn new(
        oracle: Arc<dyn Oracle>,
        sheets: Arc<dyn SheetStore>,
        feed: Option<Arc<dyn FeedSource>>,
    ) -> Self {
        Self {
            oracle: StructuredOracle::new(oracle),
            sheets,
            feed,
        }
    }

    /// Execute one run to completion.
    ///
    /// Returns the full outcome in both modes; only write mode touches
    /// external state. A zero-campaign week is not an error: the run
    /// short-circuits to an empty WARNING result without calling any
    /// downstream oracle stage.
    pub async fn execute(
        &self,
        input: &PipelineInput,
        progress: &dyn ProgressObserver,
    ) -> Result<RunOutcome> {
        let week = input.week_start.format("%Y-%m-%d").to_string();
        let run_id = format!("run-{}", Uuid::new_v4());
        let guardrails = input.client.resolved_guardrails();
        info!(run_id = %run_id, week = %week, mode = input.mode.as_str(), "run started");

        progress.on_step(PipelineStep::LoadingData, "Loading data from spreadsheets");
        let sources =
            loader::load_sources(self.sheets.as_ref(), self.feed.as_deref(), &input.client)
                .await?;

        progress.on_step(
            PipelineStep::InterpretingCampaigns,
            "Interpreting campaigns from MASTER",
        );
        let campaigns = interpreter::interpret_campaigns(
            &self.oracle,
            &week,
            &sources.master.rows,
            &sources.actual_week.rows,
            guardrails.max_campaigns_per_week,
        )
        .await?;

        if campaigns.is_empty() {
            warn!(week = %week, "no applicable campaigns, short-circuiting");
            let outcome = RunOutcome::empty(
                run_id,
                week.clone(),
                input.mode,
                sources.fingerprints,
                OverallStatus::Warning,
            );
            if input.mode.is_write() {
                self.write_back(&input.client, &outcome).await?;
            }
            progress.on_step(PipelineStep::Done, "No applicable campaigns this week");
            return Ok(outcome);
        }

        progress.on_step(
            PipelineStep::SynthesizingSignals,
            "Analyzing product sales data",
        );
        let signals = signals::synthesize_signals(
            &self.oracle,
            &sources.product_sales.rows,
            &sources.brand_sales.rows,
            guardrails.product_lookback_days,
        )
        .await?;

        progress.on_step(
            PipelineStep::SelectingProducts,
            "Selecting products for campaigns",
        );
        let actual_week_skus = sources.actual_week_skus();
        let nominations = selector::select_products(
            &self.oracle,
            &campaigns,
            &signals,
            sources.feed.as_deref(),
            &actual_week_skus,
            &guardrails,
        )
        .await?;

        progress.on_step(PipelineStep::AuditingRisks, "Auditing risks");
        let audit = auditor::audit_risks(
            &self.oracle,
            &nominations,
            sources.feed.as_deref(),
            &actual_week_skus,
            &guardrails.blacklist_skus,
        )
        .await?;

        progress.on_step(
            PipelineStep::WritingNominations,
            "Formatting final nominations",
        );
        let final_rows = formatter::format_nominations(
            &self.oracle,
            &week,
            &nominations,
            &campaigns,
            &audit.risks,
        )
        .await?;

        let unique_skus: HashSet<&str> = nominations.iter().map(|n| n.sku.as_str()).collect();
        let join_rate = if signals.is_empty() {
            0.0
        } else {
            round2(unique_skus.len() as f64 / signals.len() as f64)
        };
        let stats = RunStats {
            campaign_count: campaigns.len(),
            product_count: nominations.len(),
            unique_skus: unique_skus.len(),
            join_rate,
        };

        let outcome = RunOutcome {
            run_id,
            week_start: week,
            mode: input.mode,
            campaigns,
            signals,
            nominations,
            risks: audit.risks,
            final_rows,
            stats,
            fingerprints: sources.fingerprints,
            overall_status: audit.overall_status,
        };

        if input.mode.is_write() {
            self.write_back(&input.client, &outcome).await?;
        }

        info!(
            run_id = %outcome.run_id,
            campaigns = outcome.stats.campaign_count,
            nominations = outcome.stats.product_count,
            status = %outcome.overall_status,
            "run complete"
        );
        progress.on_step(PipelineStep::Done, "Pipeline complete");
        Ok(outcome)
    }

    async fn write_back(&self, client: &ClientConfig, outcome: &RunOutcome) -> Result<()> {
        writeback::write_nominations(
            self.sheets.as_ref(),
            client,
            &outcome.week_start,
            &outcome.final_rows,
        )
        .await?;

        let entry = RunLogEntry {
            run_id: outcome.run_id.clone(),
            timestamp: Utc::now(),
            client_name: client.name.clone(),
            week_start: outcome.week_start.clone(),
            campaign_count: outcome.stats.campaign_count,
            product_count: outcome.stats.product_count,
            join_rate: outcome.stats.join_rate,
            sources_hash: writeback::combined_fingerprint(&outcome.fingerprints),
            status: outcome.overall_status,
        };
        writeback::append_run_log(self.sheets.as_ref(), client, &entry).await
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_rate_rounds_to_two_decimals() {
        assert_eq!(round2(2.0 / 3.0), 0.67);
        assert_eq!(round2(1.0 / 3.0), 0.33);
        assert_eq!(round2(0.0), 0.0);
        assert_eq!(round2(1.0), 1.0);
    }
}
