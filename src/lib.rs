//! # promopilot
//!
//! Weekly retail promotion pipeline. For each client, the pipeline reads
//! campaign definitions and sales data from Google Sheets, asks a language
//! model to interpret campaigns, score products, select nominations, and
//! audit risk, then writes approved nominations back to the planning sheet
//! together with an auditable run log.
//!
//! The model is an untrusted oracle: every reply is schema-validated, and
//! every hard rule it is told about is re-enforced deterministically.
//!
//! ## Modules
//!
//! - `config` - per-client configuration and guardrail resolution
//! - `error` - unified error type
//! - `feed` - optional product catalog feed
//! - `oracle` - schema-constrained access to the reasoning service
//! - `pipeline` - the six-stage orchestration core
//! - `progress` - stage progress reporting
//! - `run` - run history records and persistence
//! - `sheets` - spreadsheet snapshots and read/write access
//! - `testing` - in-memory fakes for the external seams

pub mod config;
pub mod error;
pub mod feed;
pub mod oracle;
pub mod pipeline;
pub mod progress;
pub mod run;
pub mod sheets;

pub mod testing;
