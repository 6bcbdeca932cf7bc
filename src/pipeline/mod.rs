//! The weekly nomination pipeline.
//!
//! Six stages run strictly in sequence; each oracle-backed stage embeds the
//! validated output of the stage before it, so nothing here overlaps except
//! the initial fan-out of source reads. Oracle stages propose, deterministic
//! code disposes: every hard rule the oracle is told about is re-enforced
//! after the fact.
//!
//! - `loader` — parallel source reads plus the best-effort feed
//! - `interpreter` — MASTER rows to campaign intents
//! - `signals` — sales rows to per-product desirability scores
//! - `selector` — intents + signals to nominations, hard-rule filtered
//! - `auditor` — nominations to risk findings and an overall status
//! - `formatter` — nominations to final sheet rows
//! - `orchestrator` — the state machine tying it together
//! - `writeback` — sheet row/run-log serialization

pub mod auditor;
pub mod formatter;
pub mod interpreter;
pub mod loader;
pub mod orchestrator;
pub mod prompts;
pub mod selector;
pub mod signals;
pub mod writeback;

pub use auditor::{RiskFinding, RiskKind, Severity};
pub use formatter::{NominationRow, PENDING_APPROVAL_STATUS};
pub use interpreter::CampaignIntent;
pub use loader::SourceData;
pub use orchestrator::{Pipeline, PipelineInput, RunOutcome, RunStats};
pub use selector::ProductNomination;
pub use signals::ProductSignal;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stages of a run, in execution order. There are no backward transitions;
/// the only branch is the zero-campaign early exit after interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    LoadingData,
    InterpretingCampaigns,
    SynthesizingSignals,
    SelectingProducts,
    AuditingRisks,
    WritingNominations,
    Done,
}

impl PipelineStep {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStep::LoadingData => "loading_data",
            PipelineStep::InterpretingCampaigns => "interpreting_campaigns",
            PipelineStep::SynthesizingSignals => "synthesizing_signals",
            PipelineStep::SelectingProducts => "selecting_products",
            PipelineStep::AuditingRisks => "auditing_risks",
            PipelineStep::WritingNominations => "writing_nominations",
            PipelineStep::Done => "done",
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall verdict of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OverallStatus {
    Ok,
    Warning,
    Fail,
}

impl OverallStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OverallStatus::Ok => "OK",
            OverallStatus::Warning => "WARNING",
            OverallStatus::Fail => "FAIL",
        }
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
