//! Structured access to the external reasoning service.
//!
//! The service is an untrusted oracle: it is asked for judgment calls under a
//! strict JSON output contract, and everything it returns is parsed and
//! validated before any stage may use it. Hard business rules are never
//! delegated to it; those live in the deterministic filters downstream.
//!
//! [`Oracle`] is the transport seam (one implementation talks HTTP, the test
//! fake replays a script). [`StructuredOracle`] owns the contract: parse the
//! reply as JSON, validate it against the stage schema, and retry the whole
//! attempt with linear backoff when anything in that chain fails.

pub mod api;

pub use api::OpenAiClient;

use crate::error::{PromoError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Model tier requested for a completion. Stages pick the tier by how much
/// judgment the task needs, not by payload size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    /// The stronger, slower model for interpretation and selection.
    Standard,
    /// The cheaper model for scoring, auditing, and formatting.
    Mini,
}

/// One completion request: a system/user prompt pair plus sampling settings.
/// The reply must be a single JSON object; no streaming, no partial output.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub model: ModelTier,
    pub temperature: f32,
}

impl ChatRequest {
    pub fn new(
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
        model: ModelTier,
        temperature: f32,
    ) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            model,
            temperature,
        }
    }
}

/// Transport-level access to the reasoning service.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Run one completion and return the raw reply text.
    async fn complete(&self, request: &ChatRequest) -> Result<String>;
}

/// Shape validation applied to a deserialized oracle reply.
///
/// Deserialization enforces types; `validate` enforces the ranges and
/// non-empty anchors the wire format cannot express. A violation fails the
/// attempt and is retried like any other transient oracle failure.
pub trait OracleSchema: DeserializeOwned {
    fn validate(&self) -> std::result::Result<(), String>;
}

/// Milliseconds multiplied by the attempt number for linear backoff.
const BACKOFF_UNIT: Duration = Duration::from_millis(1000);

/// Default number of retries after the first failed attempt.
const DEFAULT_MAX_RETRIES: u32 = 2;

/// Schema-enforcing wrapper around an [`Oracle`].
#[derive(Clone)]
pub struct StructuredOracle {
    oracle: Arc<dyn Oracle>,
    max_retries: u32,
}

impl StructuredOracle {
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self {
            oracle,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Run a completion and return a value conforming to `T`.
    ///
    /// Empty replies, malformed JSON, schema violations, and transport errors
    /// are all treated alike: wait `1000ms × attempt` and try again, up to
    /// `max_retries` additional attempts. Exhaustion carries the last
    /// failure's message.
    pub async fn call<T: OracleSchema>(&self, request: &ChatRequest) -> Result<T> {
        let mut last_error = String::new();
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = BACKOFF_UNIT * attempt;
                debug!(attempt, ?delay, "retrying oracle call");
                sleep(delay).await;
            }
            match self.attempt::<T>(request).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(attempt, error = %e, "oracle attempt failed");
                    last_error = e.to_string();
                }
            }
        }
        Err(PromoError::oracle(format!(
            "call failed after {} attempts: {last_error}",
            self.max_retries + 1
        )))
    }

    async fn attempt<T: OracleSchema>(&self, request: &ChatRequest) -> Result<T> {
        let reply = self.oracle.complete(request).await?;
        if reply.trim().is_empty() {
            return Err(PromoError::oracle("empty response"));
        }
        let value: T = serde_json::from_str(&reply)
            .map_err(|e| PromoError::oracle(format!("malformed JSON reply: {e}")))?;
        value
            .validate()
            .map_err(|reason| PromoError::oracle(format!("schema violation: {reason}")))?;
        Ok(value)
    }
}
