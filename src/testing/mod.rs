//! Test fakes for the trait seams.
//!
//! Everything external - the oracle, the sheet service, the feed - is
//! reachable through a trait, so tests run the real pipeline against these
//! in-memory stand-ins with no network and no credentials.

use crate::config::ClientConfig;
use crate::error::{PromoError, Result};
use crate::feed::{FeedProduct, FeedSource, FeedTagMapping};
use crate::oracle::{ChatRequest, Oracle};
use crate::sheets::{SheetSnapshot, SheetStore};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Oracle that replays a queued script of replies and failures.
///
/// Every received request is recorded, so tests can assert how many oracle
/// calls a run made and what went into each prompt.
#[derive(Default)]
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<ChatRequest>>,
}

enum Reply {
    Text(String),
    Failure(String),
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw text reply.
    pub fn push_text(&self, text: impl Into<String>) {
        self.replies
            .lock()
            .expect("script lock poisoned")
            .push_back(Reply::Text(text.into()));
    }

    /// Queue a JSON reply.
    pub fn push_json(&self, value: &impl Serialize) {
        self.push_text(serde_json::to_string(value).expect("unserializable test value"));
    }

    /// Queue a transport failure.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.replies
            .lock()
            .expect("script lock poisoned")
            .push_back(Reply::Failure(message.into()));
    }

    /// All requests received so far, in order.
    pub fn calls(&self) -> Vec<ChatRequest> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .push(request.clone());
        let reply = self
            .replies
            .lock()
            .expect("script lock poisoned")
            .pop_front();
        match reply {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Failure(message)) => Err(PromoError::oracle(message)),
            None => Err(PromoError::oracle("scripted oracle exhausted")),
        }
    }
}

/// Sheet store backed by in-memory grids, one per (sheet, tab).
///
/// Implements the same replace-by-key semantics as the real store so
/// write-back tests exercise the actual contract.
#[derive(Default)]
pub struct InMemorySheetStore {
    tabs: Mutex<HashMap<(String, String), Vec<Vec<String>>>>,
}

impl InMemorySheetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a tab with a raw grid, header row first.
    pub fn seed_tab(&self, sheet_id: &str, tab: &str, grid: &[&[&str]]) {
        let grid: Vec<Vec<String>> = grid
            .iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect();
        self.tabs
            .lock()
            .expect("tabs lock poisoned")
            .insert((sheet_id.to_string(), tab.to_string()), grid);
    }

    /// Current raw grid of a tab, empty if the tab does not exist.
    pub fn grid(&self, sheet_id: &str, tab: &str) -> Vec<Vec<String>> {
        self.tabs
            .lock()
            .expect("tabs lock poisoned")
            .get(&(sheet_id.to_string(), tab.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl SheetStore for InMemorySheetStore {
    async fn read(&self, sheet_id: &str, tab: &str) -> Result<SheetSnapshot> {
        let tabs = self.tabs.lock().expect("tabs lock poisoned");
        let grid = tabs
            .get(&(sheet_id.to_string(), tab.to_string()))
            .ok_or_else(|| PromoError::sheet(format!("tab {tab:?} not found")))?;
        Ok(SheetSnapshot::from_grid(grid))
    }

    async fn append_rows(&self, sheet_id: &str, tab: &str, rows: &[Vec<String>]) -> Result<()> {
        let mut tabs = self.tabs.lock().expect("tabs lock poisoned");
        let grid = tabs
            .entry((sheet_id.to_string(), tab.to_string()))
            .or_default();
        grid.extend(rows.iter().cloned());
        Ok(())
    }

    async fn replace_rows_for_key(
        &self,
        sheet_id: &str,
        tab: &str,
        key_column: &str,
        key_value: &str,
        new_rows: &[Vec<String>],
        header_row: &[String],
    ) -> Result<()> {
        let mut tabs = self.tabs.lock().expect("tabs lock poisoned");
        let grid = tabs
            .entry((sheet_id.to_string(), tab.to_string()))
            .or_default();

        if grid.is_empty() {
            grid.push(header_row.to_vec());
            grid.extend(new_rows.iter().cloned());
            return Ok(());
        }

        match grid[0].iter().position(|h| h == key_column) {
            Some(key_index) => {
                let header = grid[0].clone();
                let kept: Vec<Vec<String>> = grid[1..]
                    .iter()
                    .filter(|row| row.get(key_index).map(String::as_str) != Some(key_value))
                    .cloned()
                    .collect();
                let mut rebuilt = vec![header];
                rebuilt.extend(kept);
                rebuilt.extend(new_rows.iter().cloned());
                *grid = rebuilt;
            }
            None => grid.extend(new_rows.iter().cloned()),
        }
        Ok(())
    }
}

/// Feed source returning a fixed product list, or always failing.
pub struct StaticFeedSource {
    products: Vec<FeedProduct>,
    failure: Option<String>,
}

impl StaticFeedSource {
    pub fn with_products(products: Vec<FeedProduct>) -> Self {
        Self {
            products,
            failure: None,
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            products: Vec::new(),
            failure: Some(message.into()),
        }
    }
}

#[async_trait]
impl FeedSource for StaticFeedSource {
    async fn fetch(&self, _url: &str, _mapping: &FeedTagMapping) -> Result<Vec<FeedProduct>> {
        match &self.failure {
            Some(message) => Err(PromoError::feed(message.clone())),
            None => Ok(self.products.clone()),
        }
    }
}

/// A minimal valid client configuration for tests.
pub fn sample_client_config() -> ClientConfig {
    ClientConfig {
        name: "Acme Retail".to_string(),
        process_sheet_id: "sheet-process".to_string(),
        master_tab: "MASTER".to_string(),
        actual_week_tab: "ACTUAL-WEEK".to_string(),
        next_week_tab: "NEXT-WEEK".to_string(),
        run_log_tab: "RUN-LOG".to_string(),
        product_sheet_id: "sheet-sales".to_string(),
        product_tab: "PRODUCT".to_string(),
        brand_sheet_id: "sheet-sales".to_string(),
        brand_tab: "BRAND".to_string(),
        feed_url: None,
        feed_tag_mapping: None,
        guardrails: serde_json::Value::Null,
    }
}

/// An in-stock feed product for tests.
pub fn sample_feed_product(sku: &str, stock: Option<u32>) -> FeedProduct {
    FeedProduct {
        sku: sku.to_string(),
        name: format!("Product {sku}"),
        category: "General".to_string(),
        brand: "Brand".to_string(),
        price: 19.90,
        availability: "in_stock".to_string(),
        url: format!("https://shop.example/{sku}"),
        stock,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[tokio::test]
    async fn replace_on_empty_tab_writes_header_and_rows() {
        let store = InMemorySheetStore::new();
        store
            .replace_rows_for_key(
                "s",
                "NEXT-WEEK",
                "Week",
                "2024-01-01",
                &[row(&["2024-01-01", "A"])],
                &row(&["Week", "SKU"]),
            )
            .await
            .unwrap();

        let grid = store.grid("s", "NEXT-WEEK");
        assert_eq!(grid.len(), 2);
        assert_eq!(grid[0], row(&["Week", "SKU"]));
        assert_eq!(grid[1], row(&["2024-01-01", "A"]));
    }

    #[tokio::test]
    async fn replace_without_key_column_degrades_to_append() {
        let store = InMemorySheetStore::new();
        store.seed_tab("s", "T", &[&["Other"], &["x"]]);
        store
            .replace_rows_for_key("s", "T", "Week", "2024-01-01", &[row(&["y"])], &row(&["Other"]))
            .await
            .unwrap();

        let grid = store.grid("s", "T");
        assert_eq!(grid.len(), 3);
        assert_eq!(grid[1], row(&["x"]), "existing rows untouched");
        assert_eq!(grid[2], row(&["y"]));
    }

    #[tokio::test]
    async fn replace_touches_only_the_matching_key() {
        let store = InMemorySheetStore::new();
        store.seed_tab(
            "s",
            "T",
            &[
                &["Week", "SKU"],
                &["W1", "old-1"],
                &["W2", "keep"],
                &["W1", "old-2"],
            ],
        );
        store
            .replace_rows_for_key(
                "s",
                "T",
                "Week",
                "W1",
                &[row(&["W1", "new-1"])],
                &row(&["Week", "SKU"]),
            )
            .await
            .unwrap();

        let grid = store.grid("s", "T");
        assert_eq!(grid.len(), 3);
        assert_eq!(grid[1], row(&["W2", "keep"]));
        assert_eq!(grid[2], row(&["W1", "new-1"]));
    }

    #[tokio::test]
    async fn scripted_oracle_exhausts_with_an_error() {
        let oracle = ScriptedOracle::new();
        let request = ChatRequest::new("s", "u", crate::oracle::ModelTier::Mini, 0.1);
        let err = oracle.complete(&request).await.unwrap_err();
        assert!(err.to_string().contains("exhausted"));
    }
}
