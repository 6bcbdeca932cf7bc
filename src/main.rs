use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use promopilot::config::{ClientConfig, RunMode};
use promopilot::feed::{FeedSource, HttpFeedSource};
use promopilot::oracle::OpenAiClient;
use promopilot::pipeline::{Pipeline, PipelineInput};
use promopilot::progress::ConsoleProgress;
use promopilot::run::{FileRunStore, RunRecord, RunStore};
use promopilot::sheets::{validate_tab, GoogleSheetStore, SheetStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error};

/// Plan weekly promotions from Google Sheets campaign data
#[derive(Parser)]
#[command(name = "promopilot", version)]
#[command(about = "Plan weekly promotions from Google Sheets campaign data", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute the nomination pipeline for one client and week
    Run {
        /// Path to the client configuration file
        #[arg(long)]
        client: PathBuf,

        /// Week start date, YYYY-MM-DD
        #[arg(long)]
        week: NaiveDate,

        /// Write nominations and the run log back to the sheet
        #[arg(long)]
        write: bool,

        /// Directory for run history records
        #[arg(long, default_value = "runs")]
        runs_dir: PathBuf,
    },
    /// Check that a client's configured tabs are reachable
    Validate {
        /// Path to the client configuration file
        #[arg(long)]
        client: PathBuf,
    },
    /// Show recorded runs for a client, newest first
    History {
        /// Path to the client configuration file
        #[arg(long)]
        client: PathBuf,

        /// Maximum number of runs to show
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Directory holding run history records
        #[arg(long, default_value = "runs")]
        runs_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(cli.verbose >= 2)
        .init();

    let result = match cli.command {
        Commands::Run {
            client,
            week,
            write,
            runs_dir,
        } => run_pipeline(client, week, write, runs_dir).await,
        Commands::Validate { client } => validate_client(client).await,
        Commands::History {
            client,
            limit,
            runs_dir,
        } => show_history(client, limit, runs_dir).await,
    };

    if let Err(e) = result {
        error!("fatal: {e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn build_sheet_store() -> Result<GoogleSheetStore> {
    let token = std::env::var("GOOGLE_SHEETS_TOKEN")
        .context("GOOGLE_SHEETS_TOKEN is not set (OAuth bearer token for the Sheets API)")?;
    GoogleSheetStore::new(token).context("failed to build sheet client")
}

async fn run_pipeline(
    client_path: PathBuf,
    week: NaiveDate,
    write: bool,
    runs_dir: PathBuf,
) -> Result<()> {
    let client = ClientConfig::from_yaml_file(&client_path)?;
    let mode = if write {
        RunMode::GenerateWrite
    } else {
        RunMode::DryRun
    };

    let api_key =
        std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY is not set")?;
    let oracle = Arc::new(OpenAiClient::new(api_key)?);
    let sheets: Arc<dyn SheetStore> = Arc::new(build_sheet_store()?);
    let feed: Option<Arc<dyn FeedSource>> = if client.feed_url.is_some() {
        Some(Arc::new(HttpFeedSource::new()?))
    } else {
        None
    };
    let run_store = FileRunStore::new(runs_dir);

    let pipeline = Pipeline::new(oracle, sheets, feed);
    let input = PipelineInput {
        week_start: week,
        mode,
        client: client.clone(),
    };
    let progress = ConsoleProgress::new();

    debug!(client = %client.name, week = %week, mode = mode.as_str(), "starting run");
    match pipeline.execute(&input, &progress).await {
        Ok(outcome) => {
            run_store.record(&RunRecord::success(&client.name, &outcome)).await?;
            println!(
                "{} {} | campaigns: {}, nominations: {}, unique SKUs: {}, join rate: {:.2}",
                outcome.overall_status,
                outcome.run_id,
                outcome.stats.campaign_count,
                outcome.stats.product_count,
                outcome.stats.unique_skus,
                outcome.stats.join_rate,
            );
            if mode == RunMode::DryRun {
                println!("dry run: nothing was written");
            }
            Ok(())
        }
        Err(e) => {
            // History must stay complete even for failed attempts.
            let record = RunRecord::failure(
                &client.name,
                &week.format("%Y-%m-%d").to_string(),
                mode,
                &e,
            );
            if let Err(store_err) = run_store.record(&record).await {
                error!("failed to persist failure record: {store_err}");
            }
            Err(e.into())
        }
    }
}

async fn show_history(client_path: PathBuf, limit: usize, runs_dir: PathBuf) -> Result<()> {
    let client = ClientConfig::from_yaml_file(&client_path)?;
    let store = FileRunStore::new(runs_dir);
    let records = store.list_for_client(&client.name).await?;

    if records.is_empty() {
        println!("no recorded runs for {}", client.name);
        return Ok(());
    }

    for record in records.iter().take(limit) {
        match &record.stats {
            Some(stats) => println!(
                "{} {} {} {} | campaigns: {}, products: {}, join rate: {:.2}",
                record.recorded_at.format("%Y-%m-%d %H:%M"),
                record.status,
                record.mode.as_str(),
                record.run_id,
                stats.campaign_count,
                stats.product_count,
                stats.join_rate,
            ),
            None => println!(
                "{} {} {} {} | {}",
                record.recorded_at.format("%Y-%m-%d %H:%M"),
                record.status,
                record.mode.as_str(),
                record.run_id,
                record.error.as_deref().unwrap_or("no result"),
            ),
        }
    }
    Ok(())
}

async fn validate_client(client_path: PathBuf) -> Result<()> {
    let client = ClientConfig::from_yaml_file(&client_path)?;
    let sheets = build_sheet_store()?;

    let tabs = [
        (client.process_sheet_id.as_str(), client.master_tab.as_str()),
        (client.process_sheet_id.as_str(), client.actual_week_tab.as_str()),
        (client.process_sheet_id.as_str(), client.next_week_tab.as_str()),
        (client.process_sheet_id.as_str(), client.run_log_tab.as_str()),
        (client.product_sheet_id.as_str(), client.product_tab.as_str()),
        (client.brand_sheet_id.as_str(), client.brand_tab.as_str()),
    ];

    let mut failures = 0;
    for (sheet_id, tab) in tabs {
        let report = validate_tab(&sheets, sheet_id, tab, &[]).await;
        if report.ok {
            println!("ok   {tab} ({} columns)", report.found_columns.len());
        } else {
            failures += 1;
            println!(
                "FAIL {tab}: {}",
                report.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} tab(s) failed validation");
    }
    Ok(())
}
