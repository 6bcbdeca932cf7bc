//! Google Sheets v4 REST implementation of [`SheetStore`].
//!
//! Auth is a bearer token handed to the constructor; token acquisition is the
//! caller's concern so the store itself stays free of ambient credentials.

use super::{SheetSnapshot, SheetStore};
use crate::error::{PromoError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com/v4";

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    #[serde(rename = "sheetId")]
    sheet_id: i64,
    title: String,
}

pub struct GoogleSheetStore {
    client: Client,
    token: String,
    base_url: String,
}

impl GoogleSheetStore {
    pub fn new(token: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| PromoError::config_with_source("failed to create HTTP client", e))?;
        Ok(Self {
            client,
            token,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn url(&self, path: &str) -> Result<Url> {
        Url::parse(&format!("{}{path}", self.base_url))
            .map_err(|e| PromoError::sheet(format!("invalid request URL: {e}")))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| PromoError::sheet(format!("request failed: {e}")))?;
        Self::decode(response).await
    }

    async fn post_json<T: serde::de::DeserializeOwned>(&self, url: Url, body: &Value) -> Result<T> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| PromoError::sheet(format!("request failed: {e}")))?;
        Self::decode(response).await
    }

    async fn put_json(&self, url: Url, body: &Value) -> Result<()> {
        let response = self
            .client
            .put(url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| PromoError::sheet(format!("request failed: {e}")))?;
        Self::decode::<Value>(response).await.map(|_| ())
    }

    async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(PromoError::sheet(format!(
                "API returned {status}: {}",
                detail.chars().take(200).collect::<String>()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| PromoError::sheet(format!("unreadable response: {e}")))
    }

    /// Read a tab as a raw string grid.
    async fn read_grid(&self, sheet_id: &str, tab: &str) -> Result<Vec<Vec<String>>> {
        let url = self.url(&format!(
            "/spreadsheets/{sheet_id}/values/{tab}?valueRenderOption=UNFORMATTED_VALUE&dateTimeRenderOption=FORMATTED_STRING"
        ))?;
        let range: ValueRange = self.get_json(url).await?;
        Ok(range
            .values
            .iter()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect())
    }

    /// Numeric grid id of a tab, needed for structural row deletes.
    async fn tab_grid_id(&self, sheet_id: &str, tab: &str) -> Result<i64> {
        let url = self.url(&format!("/spreadsheets/{sheet_id}?fields=sheets.properties"))?;
        let meta: SpreadsheetMeta = self.get_json(url).await?;
        meta.sheets
            .into_iter()
            .find(|s| s.properties.title == tab)
            .map(|s| s.properties.sheet_id)
            .ok_or_else(|| PromoError::sheet(format!("tab {tab:?} not found")))
    }

    async fn delete_rows(&self, sheet_id: &str, grid_id: i64, row_indices: &[usize]) -> Result<()> {
        if row_indices.is_empty() {
            return Ok(());
        }
        // Bottom-up so earlier deletes do not shift later indices.
        let mut ordered = row_indices.to_vec();
        ordered.sort_unstable_by(|a, b| b.cmp(a));
        let requests: Vec<Value> = ordered
            .iter()
            .map(|&index| {
                json!({
                    "deleteDimension": {
                        "range": {
                            "sheetId": grid_id,
                            "dimension": "ROWS",
                            "startIndex": index,
                            "endIndex": index + 1,
                        }
                    }
                })
            })
            .collect();
        let url = self.url(&format!("/spreadsheets/{sheet_id}:batchUpdate"))?;
        self.post_json::<Value>(url, &json!({ "requests": requests }))
            .await
            .map(|_| ())
    }
}

fn cell_to_string(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl SheetStore for GoogleSheetStore {
    async fn read(&self, sheet_id: &str, tab: &str) -> Result<SheetSnapshot> {
        let grid = self.read_grid(sheet_id, tab).await?;
        Ok(SheetSnapshot::from_grid(&grid))
    }

    async fn append_rows(&self, sheet_id: &str, tab: &str, rows: &[Vec<String>]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let url = self.url(&format!(
            "/spreadsheets/{sheet_id}/values/{tab}:append?valueInputOption=USER_ENTERED"
        ))?;
        self.post_json::<Value>(url, &json!({ "values": rows }))
            .await
            .map(|_| ())
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
        let grid = self.read_grid(sheet_id, tab).await?;

        if grid.is_empty() {
            let mut values = vec![header_row.to_vec()];
            values.extend(new_rows.iter().cloned());
            let url = self.url(&format!(
                "/spreadsheets/{sheet_id}/values/{tab}?valueInputOption=USER_ENTERED"
            ))?;
            return self.put_json(url, &json!({ "values": values })).await;
        }

        let key_index = match grid[0].iter().position(|h| h == key_column) {
            Some(index) => index,
            None => return self.append_rows(sheet_id, tab, new_rows).await,
        };

        let matching: Vec<usize> = grid
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, row)| row.get(key_index).map(String::as_str) == Some(key_value))
            .map(|(index, _)| index)
            .collect();

        if !matching.is_empty() {
            let grid_id = self.tab_grid_id(sheet_id, tab).await?;
            self.delete_rows(sheet_id, grid_id, &matching).await?;
        }

        self.append_rows(sheet_id, tab, new_rows).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_stringify_like_the_sheet_shows_them() {
        assert_eq!(cell_to_string(&json!("abc")), "abc");
        assert_eq!(cell_to_string(&json!(12)), "12");
        assert_eq!(cell_to_string(&json!(2.5)), "2.5");
        assert_eq!(cell_to_string(&json!(true)), "true");
        assert_eq!(cell_to_string(&Value::Null), "");
    }

    #[test]
    fn value_range_tolerates_missing_values() {
        let range: ValueRange = serde_json::from_str(r#"{"range": "A1:B2"}"#).unwrap();
        assert!(range.values.is_empty());
    }
}
