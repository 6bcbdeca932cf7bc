//! Client configuration loading.
//!
//! Each retail client is described by a YAML file naming its spreadsheets,
//! tab names, optional catalog feed, and guardrail overrides. The guardrail
//! blob is kept raw here and resolved by [`guardrails::resolve`] at run time
//! so that a malformed blob degrades to defaults instead of failing the run.

pub mod guardrails;

pub use guardrails::Guardrails;

use crate::error::{PromoError, Result};
use crate::feed::FeedTagMapping;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Execution mode for a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Compute the full result but mutate nothing external.
    DryRun,
    /// Compute the result, then write nominations and the run log back.
    GenerateWrite,
}

impl RunMode {
    pub fn is_write(self) -> bool {
        matches!(self, RunMode::GenerateWrite)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunMode::DryRun => "dry_run",
            RunMode::GenerateWrite => "generate_write",
        }
    }
}

/// Per-client configuration: where to read planning and sales data, where to
/// write nominations, and how to constrain the selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Display name used in the run log and run records.
    pub name: String,

    /// Spreadsheet holding the planning tabs (MASTER, ACTUAL-WEEK, NEXT-WEEK, run log).
    pub process_sheet_id: String,
    pub master_tab: String,
    pub actual_week_tab: String,
    pub next_week_tab: String,
    pub run_log_tab: String,

    /// Spreadsheet holding product-level sales exports.
    pub product_sheet_id: String,
    pub product_tab: String,

    /// Spreadsheet holding brand-level sales exports.
    pub brand_sheet_id: String,
    pub brand_tab: String,

    /// Optional product catalog feed.
    #[serde(default)]
    pub feed_url: Option<String>,
    #[serde(default)]
    pub feed_tag_mapping: Option<FeedTagMapping>,

    /// Raw guardrail configuration; resolved with safe defaults at run time.
    #[serde(default)]
    pub guardrails: serde_json::Value,
}

impl ClientConfig {
    /// Load a client configuration from a YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PromoError::config_with_source(
                format!("failed to read client config {}", path.display()),
                e,
            )
        })?;
        Self::from_yaml(&raw)
    }

    /// Parse a client configuration from YAML text.
    pub fn from_yaml(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw)
            .map_err(|e| PromoError::config_with_source("invalid client config", e))
    }

    /// Resolve the raw guardrail blob into a fully-populated record.
    pub fn resolved_guardrails(&self) -> Guardrails {
        guardrails::resolve(&self.guardrails)
    }
}
