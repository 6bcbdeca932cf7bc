//! Signal synthesizer stage.
//!
//! Condenses raw product and brand sales rows into per-product desirability
//! scores. The prompt asks the oracle for its top 200 by composite score; the
//! cap is also enforced here after validation rather than trusted.

use crate::error::Result;
use crate::oracle::{ChatRequest, ModelTier, OracleSchema, StructuredOracle};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use super::prompts;

/// Composite desirability score for one product name seen in sales data.
/// The item name is the join key into sales data, not the SKU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSignal {
    pub item_name: String,
    #[serde(rename = "revenue30d")]
    pub revenue_30d: f64,
    #[serde(rename = "purchases30d")]
    pub purchases_30d: f64,
    /// added / viewed, 0..=1.
    pub atc_rate: f64,
    /// 0..=100, higher is more recent.
    pub recency_score: f64,
    /// 0..=100, from brand-level aggregates.
    pub brand_strength: f64,
    /// 0..=100 blend of the other factors.
    pub composite_score: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SignalResponse {
    pub(crate) signals: Vec<ProductSignal>,
}

impl OracleSchema for SignalResponse {
    fn validate(&self) -> std::result::Result<(), String> {
        for signal in &self.signals {
            if signal.item_name.is_empty() {
                return Err("signal with empty itemName".to_string());
            }
            if !(0.0..=1.0).contains(&signal.atc_rate) {
                return Err(format!("{}: atcRate outside 0-1", signal.item_name));
            }
            for (field, value) in [
                ("recencyScore", signal.recency_score),
                ("brandStrength", signal.brand_strength),
                ("compositeScore", signal.composite_score),
            ] {
                if !(0.0..=100.0).contains(&value) {
                    return Err(format!("{}: {field} outside 0-100", signal.item_name));
                }
            }
        }
        Ok(())
    }
}

/// Synthesize scoring signals from sales rows.
pub async fn synthesize_signals(
    oracle: &StructuredOracle,
    product_rows: &[HashMap<String, String>],
    brand_rows: &[HashMap<String, String>],
    lookback_days: u32,
) -> Result<Vec<ProductSignal>> {
    let request = ChatRequest::new(
        prompts::SIGNAL_SYNTHESIZER_SYSTEM,
        prompts::build_signal_synthesizer_prompt(product_rows, brand_rows, lookback_days),
        ModelTier::Mini,
        0.1,
    );
    let response: SignalResponse = oracle.call(&request).await?;
    let mut signals = response.signals;

    // The result cap is a prompt instruction the oracle may ignore.
    if signals.len() > prompts::SIGNAL_RESULT_CAP {
        debug!(
            dropped = signals.len() - prompts::SIGNAL_RESULT_CAP,
            "oracle exceeded the signal cap, keeping the best"
        );
        signals.sort_by(|a, b| {
            b.composite_score
                .partial_cmp(&a.composite_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        signals.truncate(prompts::SIGNAL_RESULT_CAP);
    }

    info!(count = signals.len(), "signals synthesized");
    Ok(signals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedOracle;
    use serde_json::json;
    use std::sync::Arc;

    fn signal_json(name: &str, composite: f64) -> serde_json::Value {
        json!({
            "itemName": name,
            "revenue30d": 1000.0,
            "purchases30d": 40,
            "atcRate": 0.25,
            "recencyScore": 80,
            "brandStrength": 60,
            "compositeScore": composite
        })
    }

    #[tokio::test]
    async fn parses_signals() {
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.push_json(&json!({ "signals": [signal_json("Alpha Lamp", 77.5)] }));

        let structured = StructuredOracle::new(oracle);
        let signals = synthesize_signals(&structured, &[], &[], 30).await.unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].item_name, "Alpha Lamp");
        assert_eq!(signals[0].composite_score, 77.5);
    }

    #[tokio::test(start_paused = true)]
    async fn atc_rate_above_one_is_rejected() {
        let oracle = Arc::new(ScriptedOracle::new());
        for _ in 0..3 {
            let mut signal = signal_json("Alpha Lamp", 50.0);
            signal["atcRate"] = json!(1.2);
            oracle.push_json(&json!({ "signals": [signal] }));
        }

        let structured = StructuredOracle::new(oracle);
        let err = synthesize_signals(&structured, &[], &[], 30)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("atcRate"));
    }

    #[tokio::test]
    async fn overflow_is_cut_to_the_best_two_hundred() {
        let overflow: Vec<_> = (0..250)
            .map(|i| signal_json(&format!("P-{i}"), f64::from(i) * 0.4))
            .collect();
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.push_json(&json!({ "signals": overflow }));

        let structured = StructuredOracle::new(oracle);
        let signals = synthesize_signals(&structured, &[], &[], 30).await.unwrap();
        assert_eq!(signals.len(), 200);
        let worst = signals
            .iter()
            .map(|s| s.composite_score)
            .fold(f64::INFINITY, f64::min);
        // The kept set is the top of the distribution, not the input prefix.
        assert!(worst >= 20.0, "worst kept composite was {worst}");
    }
}
