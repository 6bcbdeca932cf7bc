//! End-to-end pipeline tests over the in-memory fakes.
//!
//! The full orchestrator runs against a scripted oracle, an in-memory sheet
//! store, and a static feed, so these tests exercise the real stage sequence,
//! the deterministic filter, and the write-back contract.

use promopilot::config::{ClientConfig, RunMode};
use promopilot::feed::FeedSource;
use promopilot::pipeline::{OverallStatus, Pipeline, PipelineInput, PipelineStep};
use promopilot::progress::RecordingProgress;
use promopilot::testing::{
    sample_client_config, sample_feed_product, InMemorySheetStore, ScriptedOracle,
    StaticFeedSource,
};
use serde_json::json;
use std::sync::Arc;

const WEEK: &str = "2024-01-01";

fn seeded_store(config: &ClientConfig) -> Arc<InMemorySheetStore> {
    let store = Arc::new(InMemorySheetStore::new());
    store.seed_tab(
        &config.process_sheet_id,
        &config.master_tab,
        &[
            &["Week", "Theme", "Status"],
            &[WEEK, "Spring push", "PLANNED"],
        ],
    );
    store.seed_tab(
        &config.process_sheet_id,
        &config.actual_week_tab,
        &[&["SKU", "Campaign"], &["OLD-1", "Winter clearance"]],
    );
    store.seed_tab(
        &config.product_sheet_id,
        &config.product_tab,
        &[
            &["Item name", "Item revenue"],
            &["Alpha Lamp", "1200"],
            &["Beta Mug", "800"],
            &["Gamma Chair", "400"],
        ],
    );
    store.seed_tab(
        &config.brand_sheet_id,
        &config.brand_tab,
        &[&["Brand", "Item revenue"], &["Lumen", "2400"]],
    );
    store.seed_tab(
        &config.process_sheet_id,
        &config.run_log_tab,
        &[&[
            "Run ID",
            "Timestamp",
            "Client",
            "Week",
            "Campaigns",
            "Products",
            "Join rate",
            "Hash",
            "Status",
        ]],
    );
    store
}

fn campaign_reply() -> serde_json::Value {
    json!({
        "campaigns": [{
            "id": "c1",
            "theme": "Spring push",
            "discountType": "percentage",
            "constraints": [],
            "priority": 8,
            "targetCategory": null,
            "targetBrand": null,
            "maxProducts": 2
        }]
    })
}

fn signal_reply() -> serde_json::Value {
    let signal = |name: &str, composite: f64| {
        json!({
            "itemName": name,
            "revenue30d": 1000.0,
            "purchases30d": 40,
            "atcRate": 0.2,
            "recencyScore": 75,
            "brandStrength": 60,
            "compositeScore": composite
        })
    };
    json!({
        "signals": [
            signal("Alpha Lamp", 90.0),
            signal("Beta Mug", 80.0),
            signal("Gamma Chair", 70.0),
        ]
    })
}

fn nomination_reply() -> serde_json::Value {
    let nomination = |sku: &str, name: &str| {
        json!({
            "campaignId": "c1",
            "sku": sku,
            "productName": name,
            "reason": "strong signals",
            "score": 85.0,
            "risks": []
        })
    };
    json!({
        "nominations": [
            nomination("SKU-A", "Alpha Lamp"),
            nomination("SKU-B", "Beta Mug"),
            nomination("SKU-C", "Gamma Chair"),
        ]
    })
}

fn audit_reply() -> serde_json::Value {
    json!({
        "risks": [],
        "summary": {
            "totalRisks": 0,
            "highCount": 0,
            "mediumCount": 0,
            "lowCount": 0,
            "overallStatus": "OK"
        }
    })
}

fn rows_reply() -> serde_json::Value {
    let row = |sku: &str, name: &str| {
        json!({
            "week": WEEK,
            "theme": "Spring push",
            "discountType": "percentage",
            "sku": sku,
            "productName": name,
            "reason": "strong signals",
            "action": "15% off",
            "status": "PENDING APPROVAL",
            "notes": ""
        })
    };
    json!({ "rows": [row("SKU-A", "Alpha Lamp"), row("SKU-B", "Beta Mug")] })
}

fn scripted_full_run() -> Arc<ScriptedOracle> {
    let oracle = Arc::new(ScriptedOracle::new());
    oracle.push_json(&campaign_reply());
    oracle.push_json(&signal_reply());
    oracle.push_json(&nomination_reply());
    oracle.push_json(&audit_reply());
    oracle.push_json(&rows_reply());
    oracle
}

fn feed_with_two_of_three() -> Arc<StaticFeedSource> {
    Arc::new(StaticFeedSource::with_products(vec![
        sample_feed_product("SKU-A", Some(20)),
        sample_feed_product("SKU-B", None),
    ]))
}

fn input(config: &ClientConfig, mode: RunMode) -> PipelineInput {
    PipelineInput {
        week_start: WEEK.parse().unwrap(),
        mode,
        client: config.clone(),
    }
}

#[tokio::test]
async fn dry_run_computes_stats_and_filters_unfed_skus() {
    let mut config = sample_client_config();
    config.feed_url = Some("https://feed.example/products.xml".to_string());
    let store = seeded_store(&config);
    let oracle = scripted_full_run();
    let feed: Arc<dyn FeedSource> = feed_with_two_of_three();

    let pipeline = Pipeline::new(oracle.clone(), store.clone(), Some(feed));
    let progress = RecordingProgress::new();
    let outcome = pipeline
        .execute(&input(&config, RunMode::DryRun), &progress)
        .await
        .unwrap();

    // SKU-C is missing from the feed, so the deterministic filter drops it.
    let skus: Vec<_> = outcome.nominations.iter().map(|n| n.sku.as_str()).collect();
    assert_eq!(skus, vec!["SKU-A", "SKU-B"]);

    assert_eq!(outcome.stats.campaign_count, 1);
    assert_eq!(outcome.stats.product_count, 2);
    assert_eq!(outcome.stats.unique_skus, 2);
    assert_eq!(outcome.stats.join_rate, 0.67);
    assert_eq!(outcome.overall_status, OverallStatus::Ok);
    assert_eq!(outcome.final_rows.len(), 2);
    assert_eq!(outcome.fingerprints.get("feed").unwrap(), "2_products");

    assert_eq!(
        progress.steps(),
        vec![
            PipelineStep::LoadingData,
            PipelineStep::InterpretingCampaigns,
            PipelineStep::SynthesizingSignals,
            PipelineStep::SelectingProducts,
            PipelineStep::AuditingRisks,
            PipelineStep::WritingNominations,
            PipelineStep::Done,
        ]
    );

    // Dry run: the NEXT-WEEK tab and the run log were never touched.
    assert!(store.grid(&config.process_sheet_id, &config.next_week_tab).is_empty());
    let log = store.grid(&config.process_sheet_id, &config.run_log_tab);
    assert_eq!(log.len(), 1, "only the seeded header row");
}

#[tokio::test]
async fn zero_campaigns_short_circuits_with_warning() {
    let config = sample_client_config();
    let store = seeded_store(&config);
    let oracle = Arc::new(ScriptedOracle::new());
    oracle.push_json(&json!({ "campaigns": [] }));

    let pipeline = Pipeline::new(oracle.clone(), store.clone(), None);
    let progress = RecordingProgress::new();
    let outcome = pipeline
        .execute(&input(&config, RunMode::DryRun), &progress)
        .await
        .unwrap();

    assert_eq!(outcome.overall_status, OverallStatus::Warning);
    assert!(outcome.campaigns.is_empty());
    assert!(outcome.signals.is_empty());
    assert!(outcome.nominations.is_empty());
    assert!(outcome.risks.is_empty());
    assert!(outcome.final_rows.is_empty());
    assert_eq!(outcome.stats.campaign_count, 0);
    assert_eq!(outcome.stats.join_rate, 0.0);

    // Exactly one oracle call: no downstream stage ran.
    assert_eq!(oracle.calls().len(), 1);
    assert_eq!(
        progress.steps(),
        vec![
            PipelineStep::LoadingData,
            PipelineStep::InterpretingCampaigns,
            PipelineStep::Done,
        ]
    );
}

#[tokio::test]
async fn write_mode_replaces_only_the_target_week() {
    let mut config = sample_client_config();
    config.feed_url = Some("https://feed.example/products.xml".to_string());
    let store = seeded_store(&config);

    // Pre-existing rows: a stale set for the target week and one other week.
    store.seed_tab(
        &config.process_sheet_id,
        &config.next_week_tab,
        &[
            &["Week", "Theme", "Discount Type", "SKU", "Product Name", "Reason", "Action", "Status", "Notes"],
            &[WEEK, "Old theme", "fixed", "STALE-1", "Stale", "old", "", "PENDING APPROVAL", ""],
            &["2023-12-25", "Xmas", "bogo", "KEEP-1", "Keeper", "", "", "APPROVED", ""],
        ],
    );

    let oracle = scripted_full_run();
    let feed: Arc<dyn FeedSource> = feed_with_two_of_three();
    let pipeline = Pipeline::new(oracle, store.clone(), Some(feed));
    let progress = RecordingProgress::new();
    let outcome = pipeline
        .execute(&input(&config, RunMode::GenerateWrite), &progress)
        .await
        .unwrap();

    let grid = store.grid(&config.process_sheet_id, &config.next_week_tab);
    let weeks: Vec<_> = grid[1..].iter().map(|row| row[0].as_str()).collect();
    assert!(!grid[1..].iter().any(|row| row[3] == "STALE-1"));
    assert!(weeks.contains(&"2023-12-25"), "other week untouched");
    let new_skus: Vec<_> = grid[1..]
        .iter()
        .filter(|row| row[0] == WEEK)
        .map(|row| row[3].as_str())
        .collect();
    assert_eq!(new_skus, vec!["SKU-A", "SKU-B"]);

    // One run-log row was appended after the seeded header.
    let log = store.grid(&config.process_sheet_id, &config.run_log_tab);
    assert_eq!(log.len(), 2);
    assert_eq!(log[1][0], outcome.run_id);
    assert_eq!(log[1][3], WEEK);
    assert_eq!(log[1][8], "OK");
}

#[tokio::test]
async fn repeating_a_write_is_idempotent() {
    let mut config = sample_client_config();
    config.feed_url = Some("https://feed.example/products.xml".to_string());
    let store = seeded_store(&config);

    for _ in 0..2 {
        let oracle = scripted_full_run();
        let feed: Arc<dyn FeedSource> = feed_with_two_of_three();
        let pipeline = Pipeline::new(oracle, store.clone(), Some(feed));
        pipeline
            .execute(&input(&config, RunMode::GenerateWrite), &RecordingProgress::new())
            .await
            .unwrap();
    }

    // The second write replaced the first attempt's rows instead of stacking.
    let grid = store.grid(&config.process_sheet_id, &config.next_week_tab);
    let week_rows = grid[1..].iter().filter(|row| row[0] == WEEK).count();
    assert_eq!(week_rows, 2);

    // The run log is append-only: one row per write-mode run.
    let log = store.grid(&config.process_sheet_id, &config.run_log_tab);
    assert_eq!(log.len(), 3);
}

#[tokio::test]
async fn oracle_exhaustion_fails_the_run_without_writing() {
    let mut config = sample_client_config();
    config.feed_url = Some("https://feed.example/products.xml".to_string());
    let store = seeded_store(&config);

    let oracle = Arc::new(ScriptedOracle::new());
    oracle.push_json(&campaign_reply());
    // Signal synthesizer fails all three attempts.
    oracle.push_failure("rate limited");
    oracle.push_failure("rate limited");
    oracle.push_failure("rate limited");

    let feed: Arc<dyn FeedSource> = feed_with_two_of_three();
    let pipeline = Pipeline::new(oracle, store.clone(), Some(feed));
    let started = tokio::time::Instant::now();
    tokio::time::pause();
    let err = pipeline
        .execute(&input(&config, RunMode::GenerateWrite), &RecordingProgress::new())
        .await
        .unwrap_err();
    tokio::time::resume();

    assert!(err.to_string().contains("after 3 attempts"), "{err}");
    assert!(started.elapsed() >= std::time::Duration::from_millis(3000));
    assert!(store.grid(&config.process_sheet_id, &config.next_week_tab).is_empty());
    assert_eq!(store.grid(&config.process_sheet_id, &config.run_log_tab).len(), 1);
}

#[tokio::test]
async fn high_risk_findings_floor_the_status_at_warning() {
    let config = sample_client_config();
    let store = seeded_store(&config);

    let oracle = Arc::new(ScriptedOracle::new());
    oracle.push_json(&campaign_reply());
    oracle.push_json(&signal_reply());
    oracle.push_json(&nomination_reply());
    oracle.push_json(&json!({
        "risks": [{
            "sku": "SKU-A",
            "campaignId": "c1",
            "type": "DUPLICATE",
            "severity": "HIGH",
            "message": "also nominated elsewhere"
        }],
        "summary": {
            "totalRisks": 1,
            "highCount": 1,
            "mediumCount": 0,
            "lowCount": 0,
            "overallStatus": "OK"
        }
    }));
    oracle.push_json(&rows_reply());

    let pipeline = Pipeline::new(oracle, store, None);
    let outcome = pipeline
        .execute(&input(&config, RunMode::DryRun), &RecordingProgress::new())
        .await
        .unwrap();

    assert_eq!(outcome.overall_status, OverallStatus::Warning);
    assert_eq!(outcome.risks.len(), 1);
}
