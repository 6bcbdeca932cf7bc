//! Sheet write-back.
//!
//! Two writes end a write-mode run: the target week's rows in the NEXT-WEEK
//! tab are replaced (other weeks untouched), and one row is appended to the
//! run log. The replace is keyed on the week column and is not transactional
//! across its delete+append pair; re-running the whole write is the recovery
//! path, since delete-by-key removes whatever the previous attempt left.

use crate::config::ClientConfig;
use crate::error::Result;
use crate::sheets::SheetStore;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::info;

use super::formatter::NominationRow;
use super::OverallStatus;

/// Header row of the NEXT-WEEK tab.
pub const NEXT_WEEK_HEADERS: [&str; 9] = [
    "Week",
    "Theme",
    "Discount Type",
    "SKU",
    "Product Name",
    "Reason",
    "Action",
    "Status",
    "Notes",
];

/// Column the replace is keyed on.
pub const WEEK_KEY_COLUMN: &str = "Week";

/// One appended run-log row.
#[derive(Debug, Clone)]
pub struct RunLogEntry {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub client_name: String,
    pub week_start: String,
    pub campaign_count: usize,
    pub product_count: usize,
    pub join_rate: f64,
    pub sources_hash: String,
    pub status: OverallStatus,
}

fn row_cells(row: &NominationRow) -> Vec<String> {
    vec![
        row.week.clone(),
        row.theme.clone(),
        row.discount_type.clone(),
        row.sku.clone(),
        row.product_name.clone(),
        row.reason.clone(),
        row.action.clone(),
        row.status.clone(),
        row.notes.clone(),
    ]
}

/// Replace the target week's rows in the NEXT-WEEK tab.
pub async fn write_nominations(
    sheets: &dyn SheetStore,
    config: &ClientConfig,
    week_start: &str,
    rows: &[NominationRow],
) -> Result<()> {
    let sheet_rows: Vec<Vec<String>> = rows.iter().map(row_cells).collect();
    let header_row: Vec<String> = NEXT_WEEK_HEADERS.iter().map(|h| h.to_string()).collect();
    sheets
        .replace_rows_for_key(
            &config.process_sheet_id,
            &config.next_week_tab,
            WEEK_KEY_COLUMN,
            week_start,
            &sheet_rows,
            &header_row,
        )
        .await?;
    info!(
        rows = rows.len(),
        week = week_start,
        tab = %config.next_week_tab,
        "nominations written"
    );
    Ok(())
}

/// Append one row to the run log. Appends are never replaced, so the log is
/// the complete history of write-mode runs.
pub async fn append_run_log(
    sheets: &dyn SheetStore,
    config: &ClientConfig,
    entry: &RunLogEntry,
) -> Result<()> {
    let row = vec![
        entry.run_id.clone(),
        entry.timestamp.to_rfc3339(),
        entry.client_name.clone(),
        entry.week_start.clone(),
        entry.campaign_count.to_string(),
        entry.product_count.to_string(),
        entry.join_rate.to_string(),
        entry.sources_hash.clone(),
        entry.status.to_string(),
    ];
    sheets
        .append_rows(&config.process_sheet_id, &config.run_log_tab, &[row])
        .await?;
    info!(run_id = %entry.run_id, "run log appended");
    Ok(())
}

/// Combined digest over all source fingerprints, 16 hex chars. The map is
/// ordered, so the digest is stable for a given set of sources.
pub fn combined_fingerprint(fingerprints: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    for (source, fingerprint) in fingerprints {
        hasher.update(source.as_bytes());
        hasher.update(b"=");
        hasher.update(fingerprint.as_bytes());
        hasher.update(b";");
    }
    hasher
        .finalize()
        .iter()
        .take(8)
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingerprints(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn combined_fingerprint_is_stable_and_sensitive() {
        let base = fingerprints(&[("master", "aa"), ("feed", "bb")]);
        let same = fingerprints(&[("feed", "bb"), ("master", "aa")]);
        let changed = fingerprints(&[("master", "aa"), ("feed", "cc")]);

        assert_eq!(combined_fingerprint(&base), combined_fingerprint(&same));
        assert_ne!(combined_fingerprint(&base), combined_fingerprint(&changed));
        assert_eq!(combined_fingerprint(&base).len(), 16);
    }

    #[test]
    fn rows_serialize_in_header_order() {
        let row = NominationRow {
            week: "2024-01-01".to_string(),
            theme: "Spring push".to_string(),
            discount_type: "percentage".to_string(),
            sku: "A".to_string(),
            product_name: "Alpha Lamp".to_string(),
            reason: "top seller".to_string(),
            action: "15% off".to_string(),
            status: "PENDING APPROVAL".to_string(),
            notes: "".to_string(),
        };
        let cells = row_cells(&row);
        assert_eq!(cells.len(), NEXT_WEEK_HEADERS.len());
        assert_eq!(cells[0], "2024-01-01");
        assert_eq!(cells[3], "A");
        assert_eq!(cells[7], "PENDING APPROVAL");
    }
}
