//! System prompts and user-payload builders for the oracle stages.
//!
//! Payload sizes are bounded here: ACTUAL-WEEK context is capped at 50 rows,
//! product sales at 500, brand sales at 100, and the feed excerpt at 300
//! products. The caps are part of the stage contracts, not ad-hoc trimming.

use crate::config::Guardrails;
use crate::feed::FeedProduct;
use serde::Serialize;
use std::collections::HashMap;

use super::auditor::RiskFinding;
use super::interpreter::CampaignIntent;
use super::selector::ProductNomination;
use super::signals::ProductSignal;

/// ACTUAL-WEEK rows included for interpreter context.
pub const ACTUAL_WEEK_CONTEXT_ROWS: usize = 50;
/// Product sales rows included in the signal payload.
pub const PRODUCT_SALES_ROWS: usize = 500;
/// Brand sales rows included in the signal payload.
pub const BRAND_SALES_ROWS: usize = 100;
/// Feed products included in selector/auditor payloads.
pub const FEED_EXCERPT_PRODUCTS: usize = 300;
/// Signals the synthesizer is asked to return, best first.
pub const SIGNAL_RESULT_CAP: usize = 200;

fn pretty(value: &impl Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

fn compact(value: &impl Serialize) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

pub const CAMPAIGN_INTERPRETER_SYSTEM: &str = r#"You are a campaign planning assistant. You read raw campaign rows from a MASTER spreadsheet and extract structured campaign definitions for one target week.

RULES:
- Only return campaigns relevant to the target week: the WEEK column matches it, or the START-END date range overlaps it
- Skip campaigns whose status is "PAUSED", "CANCELLED", or "DONE"
- Every campaign needs a clear theme, discount type, and priority
- When a field is missing or ambiguous, write "UNKNOWN" instead of inventing a value
- Return valid JSON only

OUTPUT FORMAT:
{
  "campaigns": [
    {
      "id": "unique string identifier",
      "theme": "campaign theme/name",
      "discountType": "percentage|fixed|bogo|bundle|free_shipping|other",
      "constraints": ["constraints taken from the campaign row"],
      "priority": 1-10 (10 = highest),
      "targetCategory": "category if specified, null otherwise",
      "targetBrand": "brand if specified, null otherwise",
      "maxProducts": number of products to nominate
    }
  ]
}"#;

pub fn build_campaign_interpreter_prompt(
    week_start: &str,
    master_rows: &[HashMap<String, String>],
    actual_week_rows: &[HashMap<String, String>],
    max_campaigns: u32,
) -> String {
    let context = &actual_week_rows[..actual_week_rows.len().min(ACTUAL_WEEK_CONTEXT_ROWS)];
    format!(
        "Target week start: {week_start}\n\
         Maximum campaigns allowed: {max_campaigns}\n\n\
         MASTER CAMPAIGNS DATA:\n{master}\n\n\
         ACTUAL WEEK (currently live campaigns, context only):\n{context}\n\n\
         Return the campaigns relevant for week {week_start}, at most {max_campaigns}, \
         ordered by importance and urgency.",
        master = pretty(&master_rows),
        context = pretty(&context),
    )
}

pub const SIGNAL_SYNTHESIZER_SYSTEM: &str = r#"You are a data analyst for e-commerce campaign planning. You turn product and brand sales rows into a per-product scoring table used to pick campaign candidates.

RULES:
- Composite score blends revenue, purchases, add-to-cart rate, recency, and brand strength
- Revenue and purchases aggregate over the lookback period
- Add-to-cart rate = items_added_to_cart / items_viewed; when items_viewed is 0, the rate is 0
- Recency: more recent sales activity scores higher
- Brand strength comes from the brand-level rows
- Normalize every score to the 0-100 range
- Mark unknown values explicitly as UNKNOWN
- Return valid JSON only

OUTPUT FORMAT:
{
  "signals": [
    {
      "itemName": "product name",
      "revenue30d": number,
      "purchases30d": number,
      "atcRate": 0.0-1.0,
      "recencyScore": 0-100,
      "brandStrength": 0-100,
      "compositeScore": 0-100
    }
  ]
}"#;

pub fn build_signal_synthesizer_prompt(
    product_rows: &[HashMap<String, String>],
    brand_rows: &[HashMap<String, String>],
    lookback_days: u32,
) -> String {
    let products = &product_rows[..product_rows.len().min(PRODUCT_SALES_ROWS)];
    let brands = &brand_rows[..brand_rows.len().min(BRAND_SALES_ROWS)];
    format!(
        "Lookback period: {lookback_days} days\n\n\
         PRODUCT SALES DATA ({product_total} rows, showing first {product_shown}):\n{products}\n\n\
         BRAND SALES DATA ({brand_total} rows, showing first {brand_shown}):\n{brands}\n\n\
         Synthesize product-level scoring signals. Return the top {cap} products by composite score.",
        product_total = product_rows.len(),
        product_shown = products.len(),
        products = pretty(&products),
        brand_total = brand_rows.len(),
        brand_shown = brands.len(),
        brands = pretty(&brands),
        cap = SIGNAL_RESULT_CAP,
    )
}

pub const PRODUCT_SELECTOR_SYSTEM: &str = r#"You are a product selection engine for e-commerce campaigns. You assign the best products to each campaign using scored signals, the product feed, and the guardrails.

HARD RULES (enforce strictly):
- The SKU must exist in the product feed when a feed is provided
- The product must not be out_of_stock
- Known stock must be at or above the minimum stock threshold
- A SKU must not appear in more than one campaign in the same week
- Blacklisted SKUs are excluded
- Do not exceed max_products_per_campaign

SOFT FACTORS:
- Prefer higher composite scores
- Match product category/brand to the campaign's target category/brand
- Penalize unknown stock or margin
- Penalize products already running in the ACTUAL WEEK (discount fatigue)

RULES:
- Rank selections per campaign by suitability
- Give a concrete reason for every selection
- Flag risks and uncertainties in the risks list
- Return valid JSON only

OUTPUT FORMAT:
{
  "nominations": [
    {
      "campaignId": "campaign id from the interpreter",
      "sku": "product SKU",
      "productName": "product name",
      "reason": "why this product fits",
      "score": 0-100,
      "risks": ["risk tags"]
    }
  ]
}"#;

pub fn build_product_selector_prompt(
    campaigns: &[CampaignIntent],
    signals: &[ProductSignal],
    feed_products: Option<&[FeedProduct]>,
    actual_week_skus: &[String],
    guardrails: &Guardrails,
) -> String {
    let feed_section = match feed_products {
        Some(products) => {
            let excerpt = &products[..products.len().min(FEED_EXCERPT_PRODUCTS)];
            format!(
                "PRODUCT FEED ({} products, showing first {}):\n{}",
                products.len(),
                excerpt.len(),
                pretty(&excerpt)
            )
        }
        None => "NO PRODUCT FEED AVAILABLE - use product signals only".to_string(),
    };

    format!(
        "CAMPAIGNS TO FILL:\n{campaigns}\n\n\
         PRODUCT SIGNALS (scored):\n{signals}\n\n\
         {feed_section}\n\n\
         PRODUCTS IN CURRENT ACTUAL WEEK (penalize for discount fatigue):\n{actual}\n\n\
         GUARDRAILS:\n\
         - Minimum stock: {min_stock}\n\
         - Max products per campaign: {max_products}\n\
         - Blacklisted SKUs: {blacklist}\n\
         - Discount fatigue lookback: {fatigue} days\n\n\
         Select the best products for each campaign. Enforce every hard rule. \
         No duplicate SKUs across campaigns.",
        campaigns = pretty(&campaigns),
        signals = pretty(&signals),
        actual = compact(&actual_week_skus),
        min_stock = guardrails.min_stock,
        max_products = guardrails.max_products_per_campaign,
        blacklist = compact(&guardrails.blacklist_skus),
        fatigue = guardrails.discount_fatigue_days,
    )
}

pub const RISK_AUDITOR_SYSTEM: &str = r#"You are a risk auditor for e-commerce campaign nominations. You review nominations against reference data and report concrete risks.

CHECK FOR:
1. UNKNOWN_STOCK - no stock information for the product
2. UNKNOWN_MARGIN - no margin/price data for the product
3. DUPLICATE - the SKU appears in more than one campaign (double-check even though the selector prevents it)
4. LOW_JOIN_RATE - the product could not be matched to feed or sales data
5. DISCOUNT_FATIGUE - the product ran in a campaign recently
6. BLACKLISTED - the product is on the blacklist (double-check)

SEVERITY:
- HIGH: must be resolved before publishing (blacklisted, duplicate)
- MEDIUM: should be reviewed (unknown stock, discount fatigue)
- LOW: informational (unknown margin)

RULES:
- Do not invent risks; every finding must name a specific SKU and campaign
- Return valid JSON only

OUTPUT FORMAT:
{
  "risks": [
    {
      "sku": "product SKU",
      "campaignId": "campaign id",
      "type": "UNKNOWN_STOCK|UNKNOWN_MARGIN|DUPLICATE|LOW_JOIN_RATE|DISCOUNT_FATIGUE|BLACKLISTED",
      "severity": "HIGH|MEDIUM|LOW",
      "message": "human-readable description"
    }
  ],
  "summary": {
    "totalRisks": number,
    "highCount": number,
    "mediumCount": number,
    "lowCount": number,
    "overallStatus": "OK|WARNING|FAIL"
  }
}"#;

pub fn build_risk_auditor_prompt(
    nominations: &[ProductNomination],
    feed_products: Option<&[FeedProduct]>,
    actual_week_skus: &[String],
    blacklist_skus: &std::collections::BTreeSet<String>,
) -> String {
    let feed_section = match feed_products {
        Some(products) => {
            let excerpt = &products[..products.len().min(FEED_EXCERPT_PRODUCTS)];
            format!(
                "PRODUCT FEED REFERENCE ({} products):\n{}",
                products.len(),
                pretty(&excerpt)
            )
        }
        None => "NO PRODUCT FEED AVAILABLE".to_string(),
    };

    format!(
        "NOMINATIONS TO AUDIT:\n{nominations}\n\n\
         {feed_section}\n\n\
         ACTUAL WEEK SKUs (currently running, check for fatigue):\n{actual}\n\n\
         BLACKLISTED SKUs:\n{blacklist}\n\n\
         Audit every nomination. Be thorough and precise.",
        nominations = pretty(&nominations),
        actual = compact(&actual_week_skus),
        blacklist = compact(&blacklist_skus),
    )
}

pub const NOMINATION_FORMATTER_SYSTEM: &str = r#"You are a nomination formatter. You turn product nominations, their campaigns, and risk findings into final sheet rows.

Each row carries: week, theme, discountType, sku, productName, reason, action, status, notes.

RULES:
- Summarize the auditor's findings for the SKU in the notes field
- Describe the concrete discount action in the action field
- status is always "PENDING APPROVAL" for new rows
- Format consistently
- Return valid JSON only

OUTPUT FORMAT:
{
  "rows": [
    {
      "week": "YYYY-MM-DD",
      "theme": "campaign theme",
      "discountType": "discount type",
      "sku": "SKU",
      "productName": "product name",
      "reason": "selection reason",
      "action": "discount action details",
      "status": "PENDING APPROVAL",
      "notes": "risk notes if any"
    }
  ]
}"#;

pub fn build_nomination_formatter_prompt(
    week_start: &str,
    nominations: &[ProductNomination],
    campaigns: &[CampaignIntent],
    risks: &[RiskFinding],
) -> String {
    format!(
        "WEEK START: {week_start}\n\n\
         CAMPAIGNS:\n{campaigns}\n\n\
         PRODUCT NOMINATIONS:\n{nominations}\n\n\
         RISK FINDINGS:\n{risks}\n\n\
         Format every nomination into a final sheet row with relevant risk notes.",
        campaigns = pretty(&campaigns),
        nominations = pretty(&nominations),
        risks = pretty(&risks),
    )
}
