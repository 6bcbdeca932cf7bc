//! Spreadsheet access.
//!
//! A spreadsheet is consumed as a key-value read/write service over named
//! tabs. Reads return an immutable [`SheetSnapshot`] whose fingerprint feeds
//! the run's audit trail; writes are either pure appends or a replace keyed
//! on a single column, which is the only consistency mechanism the write-back
//! relies on.

pub mod google;

pub use google::GoogleSheetStore;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// One read of a sheet tab: ordered headers, header-keyed rows, and a
/// content fingerprint of the raw grid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SheetSnapshot {
    pub headers: Vec<String>,
    pub rows: Vec<HashMap<String, String>>,
    pub fingerprint: String,
}

impl SheetSnapshot {
    /// Build a snapshot from a raw cell grid. The first row is the header
    /// row; a grid with fewer than two rows yields an empty snapshot whose
    /// fingerprint covers the empty grid.
    pub fn from_grid(grid: &[Vec<String>]) -> Self {
        if grid.len() < 2 {
            return Self {
                headers: Vec::new(),
                rows: Vec::new(),
                fingerprint: fingerprint_grid(&[]),
            };
        }

        let headers = grid[0].clone();
        let rows = grid[1..]
            .iter()
            .map(|row| {
                headers
                    .iter()
                    .enumerate()
                    .map(|(i, header)| {
                        (header.clone(), row.get(i).cloned().unwrap_or_default())
                    })
                    .collect()
            })
            .collect();

        Self {
            headers,
            rows,
            fingerprint: fingerprint_grid(grid),
        }
    }

    /// Values of the first matching column name, skipping empty cells.
    pub fn column_values(&self, names: &[&str]) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|row| {
                names
                    .iter()
                    .find_map(|name| row.get(*name))
                    .filter(|v| !v.is_empty())
                    .cloned()
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Content fingerprint of a raw grid: first 16 hex chars of SHA-256 over the
/// JSON encoding. Order-sensitive by construction.
pub fn fingerprint_grid(grid: &[Vec<String>]) -> String {
    let encoded = serde_json::to_string(grid).unwrap_or_default();
    let digest = Sha256::digest(encoded.as_bytes());
    digest
        .iter()
        .take(8)
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Read/write access to spreadsheet tabs.
#[async_trait]
pub trait SheetStore: Send + Sync {
    /// Read a whole tab into a snapshot.
    async fn read(&self, sheet_id: &str, tab: &str) -> Result<SheetSnapshot>;

    /// Append rows after the last populated row.
    async fn append_rows(&self, sheet_id: &str, tab: &str, rows: &[Vec<String>]) -> Result<()>;

    /// Replace all rows whose `key_column` cell equals `key_value`.
    ///
    /// Matching rows are deleted bottom-up, then `new_rows` are appended. An
    /// empty tab is seeded with `header_row` followed by the rows; a tab
    /// without the key column degrades to a pure append.
    async fn replace_rows_for_key(
        &self,
        sheet_id: &str,
        tab: &str,
        key_column: &str,
        key_value: &str,
        new_rows: &[Vec<String>],
        header_row: &[String],
    ) -> Result<()>;
}

/// Result of probing a tab for existence and expected columns.
#[derive(Debug, Clone, Serialize)]
pub struct TabValidation {
    pub ok: bool,
    pub found_columns: Vec<String>,
    pub missing_columns: Vec<String>,
    pub error: Option<String>,
}

/// Check that a tab is readable and carries the expected header columns.
pub async fn validate_tab(
    store: &dyn SheetStore,
    sheet_id: &str,
    tab: &str,
    expected_columns: &[String],
) -> TabValidation {
    let snapshot = match store.read(sheet_id, tab).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            return TabValidation {
                ok: false,
                found_columns: Vec::new(),
                missing_columns: expected_columns.to_vec(),
                error: Some(e.to_string()),
            }
        }
    };

    let missing: Vec<String> = expected_columns
        .iter()
        .filter(|c| !snapshot.headers.contains(c))
        .cloned()
        .collect();

    TabValidation {
        ok: missing.is_empty(),
        found_columns: snapshot.headers,
        missing_columns: missing,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(cells: &[&[&str]]) -> Vec<Vec<String>> {
        cells
            .iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn header_row_keys_the_records() {
        let snapshot = SheetSnapshot::from_grid(&grid(&[
            &["SKU", "Name"],
            &["A-1", "Alpha"],
            &["B-2", "Beta"],
        ]));
        assert_eq!(snapshot.headers, vec!["SKU", "Name"]);
        assert_eq!(snapshot.rows.len(), 2);
        assert_eq!(snapshot.rows[0]["SKU"], "A-1");
        assert_eq!(snapshot.rows[1]["Name"], "Beta");
    }

    #[test]
    fn short_rows_pad_with_empty_cells() {
        let snapshot =
            SheetSnapshot::from_grid(&grid(&[&["SKU", "Name", "Stock"], &["A-1", "Alpha"]]));
        assert_eq!(snapshot.rows[0]["Stock"], "");
    }

    #[test]
    fn header_only_grid_is_empty_but_well_formed() {
        let snapshot = SheetSnapshot::from_grid(&grid(&[&["SKU", "Name"]]));
        assert!(snapshot.headers.is_empty());
        assert!(snapshot.rows.is_empty());
        assert_eq!(snapshot.fingerprint, fingerprint_grid(&[]));
    }

    #[test]
    fn identical_grids_share_a_fingerprint() {
        let a = grid(&[&["SKU"], &["A-1"]]);
        let b = grid(&[&["SKU"], &["A-1"]]);
        assert_eq!(fingerprint_grid(&a), fingerprint_grid(&b));
        assert_eq!(fingerprint_grid(&a).len(), 16);
    }

    #[test]
    fn any_cell_change_changes_the_fingerprint() {
        let base = grid(&[&["SKU"], &["A-1"]]);
        let changed = grid(&[&["SKU"], &["A-2"]]);
        assert_ne!(fingerprint_grid(&base), fingerprint_grid(&changed));
    }

    #[test]
    fn row_order_is_significant() {
        let ab = grid(&[&["SKU"], &["A-1"], &["B-2"]]);
        let ba = grid(&[&["SKU"], &["B-2"], &["A-1"]]);
        assert_ne!(fingerprint_grid(&ab), fingerprint_grid(&ba));
    }

    #[test]
    fn column_values_tries_names_in_order() {
        let snapshot = SheetSnapshot::from_grid(&grid(&[
            &["sku", "Campaign"],
            &["A-1", "Spring"],
            &["", "Summer"],
        ]));
        assert_eq!(snapshot.column_values(&["SKU", "sku"]), vec!["A-1"]);
    }
}
