//! Source loading stage.
//!
//! The four sheet sources are independent read-only ranges, so they fan out
//! in parallel; the run waits for all of them. The feed is optional context:
//! a fetch or parse failure is swallowed, recorded as a sentinel fingerprint,
//! and the run continues as if no feed were configured.

use crate::config::ClientConfig;
use crate::error::Result;
use crate::feed::{FeedProduct, FeedSource};
use crate::sheets::{SheetSnapshot, SheetStore};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Fingerprint recorded for a configured feed that failed to load.
pub const FEED_FAILED_SENTINEL: &str = "FAILED";

/// Everything a run reads, loaded once and never mutated.
#[derive(Debug, Clone, Default)]
pub struct SourceData {
    pub master: SheetSnapshot,
    pub actual_week: SheetSnapshot,
    pub product_sales: SheetSnapshot,
    pub brand_sales: SheetSnapshot,
    pub feed: Option<Vec<FeedProduct>>,
    /// Per-source content fingerprints, keyed by logical source name.
    pub fingerprints: BTreeMap<String, String>,
}

impl SourceData {
    /// SKUs currently live in the ACTUAL-WEEK tab.
    pub fn actual_week_skus(&self) -> Vec<String> {
        self.actual_week.column_values(&["SKU", "sku"])
    }
}

/// Load all configured sources.
pub async fn load_sources(
    sheets: &dyn SheetStore,
    feed_source: Option<&dyn FeedSource>,
    config: &ClientConfig,
) -> Result<SourceData> {
    let (master, actual_week, product_sales, brand_sales) = futures::try_join!(
        sheets.read(&config.process_sheet_id, &config.master_tab),
        sheets.read(&config.process_sheet_id, &config.actual_week_tab),
        sheets.read(&config.product_sheet_id, &config.product_tab),
        sheets.read(&config.brand_sheet_id, &config.brand_tab),
    )?;

    let mut fingerprints = BTreeMap::new();
    fingerprints.insert("master".to_string(), master.fingerprint.clone());
    fingerprints.insert("actual_week".to_string(), actual_week.fingerprint.clone());
    fingerprints.insert("product_sales".to_string(), product_sales.fingerprint.clone());
    fingerprints.insert("brand_sales".to_string(), brand_sales.fingerprint.clone());

    let mut feed = None;
    if let (Some(url), Some(source)) = (config.feed_url.as_deref(), feed_source) {
        let mapping = config.feed_tag_mapping.clone().unwrap_or_default();
        match source.fetch(url, &mapping).await {
            Ok(products) => {
                fingerprints.insert("feed".to_string(), format!("{}_products", products.len()));
                feed = Some(products);
            }
            Err(e) => {
                warn!(error = %e, "feed load failed, continuing without feed");
                fingerprints.insert("feed".to_string(), FEED_FAILED_SENTINEL.to_string());
            }
        }
    }

    info!(
        master_rows = master.rows.len(),
        actual_rows = actual_week.rows.len(),
        product_rows = product_sales.rows.len(),
        brand_rows = brand_sales.rows.len(),
        feed_products = feed.as_ref().map(Vec::len),
        "sources loaded"
    );

    Ok(SourceData {
        master,
        actual_week,
        product_sales,
        brand_sales,
        feed,
        fingerprints,
    })
}
