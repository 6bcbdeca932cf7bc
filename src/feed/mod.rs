//! External product catalog feed.
//!
//! The feed is optional context, not a hard dependency: when it is configured
//! it becomes the authority on SKU existence and stock, and when it fails to
//! load the pipeline continues as if no feed were configured. Tag names vary
//! per shop platform, so extraction is driven by a per-client
//! [`FeedTagMapping`] with the common defaults baked in.

use crate::error::{PromoError, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Availability value that marks a product as not promotable.
pub const OUT_OF_STOCK: &str = "out_of_stock";

/// One product from the catalog feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedProduct {
    pub sku: String,
    pub name: String,
    pub category: String,
    pub brand: String,
    pub price: f64,
    pub availability: String,
    pub url: String,
    pub stock: Option<u32>,
}

impl FeedProduct {
    pub fn is_out_of_stock(&self) -> bool {
        self.availability == OUT_OF_STOCK
    }
}

/// Element names used to pull product fields out of a feed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedTagMapping {
    pub root: String,
    pub item: String,
    pub sku: String,
    pub name: String,
    pub category: String,
    pub brand: String,
    pub price: String,
    pub availability: String,
    pub url: String,
    #[serde(default)]
    pub stock: Option<String>,
}

impl Default for FeedTagMapping {
    fn default() -> Self {
        Self {
            root: "SHOP".to_string(),
            item: "SHOPITEM".to_string(),
            sku: "ITEM_ID".to_string(),
            name: "PRODUCTNAME".to_string(),
            category: "CATEGORYTEXT".to_string(),
            brand: "MANUFACTURER".to_string(),
            price: "PRICE_VAT".to_string(),
            availability: "DELIVERY_DATE".to_string(),
            url: "URL".to_string(),
            stock: Some("STOCK".to_string()),
        }
    }
}

/// Source of catalog products.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, url: &str, mapping: &FeedTagMapping) -> Result<Vec<FeedProduct>>;
}

/// HTTP feed source with a tolerant tag scan.
///
/// Feeds in the wild are malformed often enough that a strict parse would
/// turn optional context into a recurring failure; missing fields default to
/// empty values instead.
pub struct HttpFeedSource {
    client: reqwest::Client,
}

impl HttpFeedSource {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| PromoError::config_with_source("failed to create HTTP client", e))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, url: &str, mapping: &FeedTagMapping) -> Result<Vec<FeedProduct>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PromoError::feed(format!("fetch failed: {e}")))?;
        if !response.status().is_success() {
            return Err(PromoError::feed(format!(
                "fetch failed: {}",
                response.status()
            )));
        }
        let body = response
            .text()
            .await
            .map_err(|e| PromoError::feed(format!("unreadable body: {e}")))?;
        extract_products(&body, mapping)
    }
}

/// Pull products out of a feed document using the tag mapping.
pub fn extract_products(document: &str, mapping: &FeedTagMapping) -> Result<Vec<FeedProduct>> {
    let item_pattern = element_pattern(&mapping.item)?;
    let sku = element_pattern(&mapping.sku)?;
    let name = element_pattern(&mapping.name)?;
    let category = element_pattern(&mapping.category)?;
    let brand = element_pattern(&mapping.brand)?;
    let price = element_pattern(&mapping.price)?;
    let availability = element_pattern(&mapping.availability)?;
    let url = element_pattern(&mapping.url)?;
    let stock = mapping
        .stock
        .as_deref()
        .map(element_pattern)
        .transpose()?;

    let products = item_pattern
        .captures_iter(document)
        .map(|item| {
            let body = item.get(1).map_or("", |m| m.as_str());
            FeedProduct {
                sku: element_text(&sku, body),
                name: element_text(&name, body),
                category: element_text(&category, body),
                brand: element_text(&brand, body),
                price: element_text(&price, body).parse().unwrap_or(0.0),
                availability: element_text(&availability, body),
                url: element_text(&url, body),
                stock: stock
                    .as_ref()
                    .and_then(|p| element_text(p, body).parse().ok()),
            }
        })
        .collect();
    Ok(products)
}

fn element_pattern(tag: &str) -> Result<Regex> {
    Regex::new(&format!(
        r"(?is)<{0}(?:\s[^>]*)?>(.*?)</{0}>",
        regex::escape(tag)
    ))
    .map_err(|e| PromoError::feed(format!("invalid tag mapping {tag:?}: {e}")))
}

fn element_text(pattern: &Regex, body: &str) -> String {
    let raw = pattern
        .captures(body)
        .and_then(|c| c.get(1))
        .map_or("", |m| m.as_str())
        .trim();
    raw.strip_prefix("<![CDATA[")
        .and_then(|s| s.strip_suffix("]]>"))
        .unwrap_or(raw)
        .trim()
        .to_string()
}
