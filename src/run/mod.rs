//! Run history.
//!
//! Every pipeline execution leaves a record, success or failure, so the
//! history view stays complete even for runs that never produced a result.
//! Records are immutable once written. The file store keeps one JSON file
//! per run under `<root>/<client>/`, human-readable and greppable.

use crate::config::RunMode;
use crate::error::{PromoError, Result};
use crate::pipeline::{OverallStatus, RunOutcome, RunStats};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One recorded pipeline execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub run_id: String,
    pub client_name: String,
    pub week_start: String,
    pub mode: RunMode,
    pub recorded_at: DateTime<Utc>,
    pub status: OverallStatus,
    #[serde(default)]
    pub stats: Option<RunStats>,
    #[serde(default)]
    pub fingerprints: BTreeMap<String, String>,
    /// Full stage output set, present for successful runs only.
    #[serde(default)]
    pub result: Option<RunOutcome>,
    /// Failure details, present for failed runs only.
    #[serde(default)]
    pub error: Option<String>,
}

impl RunRecord {
    /// Record a completed run with its full result payload.
    pub fn success(client_name: &str, outcome: &RunOutcome) -> Self {
        Self {
            run_id: outcome.run_id.clone(),
            client_name: client_name.to_string(),
            week_start: outcome.week_start.clone(),
            mode: outcome.mode,
            recorded_at: Utc::now(),
            status: outcome.overall_status,
            stats: Some(outcome.stats),
            fingerprints: outcome.fingerprints.clone(),
            result: Some(outcome.clone()),
            error: None,
        }
    }

    /// Record a run that failed before producing a result. Status is FAIL
    /// and no counts are attached.
    pub fn failure(
        client_name: &str,
        week_start: &str,
        mode: RunMode,
        error: impl std::fmt::Display,
    ) -> Self {
        Self {
            run_id: format!("run-{}", uuid::Uuid::new_v4()),
            client_name: client_name.to_string(),
            week_start: week_start.to_string(),
            mode,
            recorded_at: Utc::now(),
            status: OverallStatus::Fail,
            stats: None,
            fingerprints: BTreeMap::new(),
            result: None,
            error: Some(error.to_string()),
        }
    }
}

/// Persistence for run records.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Persist a record. Records are append-only; `record` must not be
    /// called twice with the same run id.
    async fn record(&self, record: &RunRecord) -> Result<()>;

    /// All records for a client, newest first.
    async fn list_for_client(&self, client_name: &str) -> Result<Vec<RunRecord>>;
}

/// JSON-file-per-run store.
pub struct FileRunStore {
    root: PathBuf,
}

impl FileRunStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn client_dir(&self, client_name: &str) -> PathBuf {
        // Keep directory names filesystem-safe.
        let safe: String = client_name
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.root.join(safe)
    }
}

#[async_trait]
impl RunStore for FileRunStore {
    async fn record(&self, record: &RunRecord) -> Result<()> {
        let dir = self.client_dir(&record.client_name);
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            PromoError::storage(format!("failed to create {}: {e}", dir.display()), Some(dir.clone()))
        })?;

        let path = dir.join(format!("{}.json", record.run_id));
        let encoded = serde_json::to_vec_pretty(record)
            .map_err(|e| PromoError::storage(format!("failed to encode run record: {e}"), None))?;
        tokio::fs::write(&path, encoded).await.map_err(|e| {
            PromoError::storage(format!("failed to write {}: {e}", path.display()), Some(path.clone()))
        })?;
        debug!(path = %path.display(), "run record written");
        Ok(())
    }

    async fn list_for_client(&self, client_name: &str) -> Result<Vec<RunRecord>> {
        let dir = self.client_dir(client_name);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(PromoError::storage(
                    format!("failed to read {}: {e}", dir.display()),
                    Some(dir),
                ))
            }
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            PromoError::storage(format!("failed to read directory entry: {e}"), None)
        })? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_record(&path).await {
                Ok(record) => records.push(record),
                Err(e) => debug!(path = %path.display(), error = %e, "skipping unreadable record"),
            }
        }

        records.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(records)
    }
}

async fn read_record(path: &Path) -> Result<RunRecord> {
    let raw = tokio::fs::read(path).await.map_err(|e| {
        PromoError::storage(
            format!("failed to read {}: {e}", path.display()),
            Some(path.to_path_buf()),
        )
    })?;
    serde_json::from_slice(&raw).map_err(|e| {
        PromoError::storage(
            format!("invalid run record {}: {e}", path.display()),
            Some(path.to_path_buf()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn failure_record(run_suffix: &str) -> RunRecord {
        let mut record = RunRecord::failure(
            "Acme Retail",
            "2024-01-01",
            RunMode::DryRun,
            "oracle call failed",
        );
        record.run_id = format!("run-{run_suffix}");
        record
    }

    #[tokio::test]
    async fn records_round_trip_through_the_file_store() {
        let dir = TempDir::new().unwrap();
        let store = FileRunStore::new(dir.path());

        store.record(&failure_record("1")).await.unwrap();
        let records = store.list_for_client("Acme Retail").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].run_id, "run-1");
        assert_eq!(records[0].status, OverallStatus::Fail);
        assert_eq!(records[0].error.as_deref(), Some("oracle call failed"));
        assert!(records[0].stats.is_none());
    }

    #[tokio::test]
    async fn listing_unknown_client_is_empty_not_an_error() {
        let dir = TempDir::new().unwrap();
        let store = FileRunStore::new(dir.path());
        assert!(store.list_for_client("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn newest_records_come_first() {
        let dir = TempDir::new().unwrap();
        let store = FileRunStore::new(dir.path());

        let mut old = failure_record("old");
        old.recorded_at = Utc::now() - chrono::Duration::hours(2);
        let new = failure_record("new");
        store.record(&old).await.unwrap();
        store.record(&new).await.unwrap();

        let records = store.list_for_client("Acme Retail").await.unwrap();
        assert_eq!(records[0].run_id, "run-new");
        assert_eq!(records[1].run_id, "run-old");
    }

    #[tokio::test]
    async fn client_names_are_sanitized_for_paths() {
        let dir = TempDir::new().unwrap();
        let store = FileRunStore::new(dir.path());
        let mut record = failure_record("1");
        record.client_name = "Acme / Retail GmbH".to_string();
        store.record(&record).await.unwrap();

        let records = store.list_for_client("Acme / Retail GmbH").await.unwrap();
        assert_eq!(records.len(), 1);
    }
}
