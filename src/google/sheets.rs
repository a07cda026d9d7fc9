//! Google Sheets API v4 — read-only spreadsheet access.
//!
//! Two calls: list the tab titles of a spreadsheet, and fetch one tab as a
//! raw string grid for the table normalizer. Values arrive as formatted
//! strings but the API will hand back bare numbers for unformatted cells,
//! so every cell is stringified on the way in.

use serde::Deserialize;

use super::ReadError;
use crate::table::RawGrid;

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

// ============================================================================
// API response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchGetResponse {
    #[serde(default)]
    value_ranges: Vec<ValueRange>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

// ============================================================================
// Client
// ============================================================================

/// Thin read client over the Sheets REST API.
#[derive(Default)]
pub struct SheetsClient {
    http: reqwest::Client,
}

impl SheetsClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// List the tab titles of a spreadsheet.
    pub async fn sheet_names(
        &self,
        access_token: &str,
        spreadsheet_id: &str,
    ) -> Result<Vec<String>, ReadError> {
        let url = format!("{}/{}", SHEETS_API_BASE, spreadsheet_id);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[("fields", "sheets.properties.title")])
            .send()
            .await?;

        let resp = check_status(resp, spreadsheet_id).await?;
        let meta: SpreadsheetMeta = resp.json().await?;
        Ok(meta.sheets.into_iter().map(|s| s.properties.title).collect())
    }

    /// Fetch an entire tab as a raw grid of string cells.
    ///
    /// A tab with no data (or a missing `values` field) comes back as an
    /// empty grid, which the normalizer turns into an empty table.
    pub async fn read_grid(
        &self,
        access_token: &str,
        spreadsheet_id: &str,
        sheet_name: &str,
    ) -> Result<RawGrid, ReadError> {
        // batchGet takes the range as a query parameter, which spares us
        // path-encoding tab titles containing spaces or quotes.
        let url = format!("{}/{}/values:batchGet", SHEETS_API_BASE, spreadsheet_id);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[("ranges", sheet_name)])
            .send()
            .await?;

        let resp = check_status(resp, spreadsheet_id).await?;
        let body: BatchGetResponse = resp.json().await?;

        let values = body
            .value_ranges
            .into_iter()
            .next()
            .map(|r| r.values)
            .unwrap_or_default();

        Ok(values
            .into_iter()
            .map(|row| row.into_iter().map(stringify_cell).collect())
            .collect())
    }
}

async fn check_status(
    resp: reqwest::Response,
    spreadsheet_id: &str,
) -> Result<reqwest::Response, ReadError> {
    let status = resp.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        Err(ReadError::AuthExpired)
    } else if status == reqwest::StatusCode::FORBIDDEN {
        Err(ReadError::PermissionDenied(spreadsheet_id.to_string()))
    } else if status == reqwest::StatusCode::NOT_FOUND {
        Err(ReadError::NotFound(spreadsheet_id.to_string()))
    } else if !status.is_success() {
        let message = resp.text().await.unwrap_or_default();
        Err(ReadError::Api {
            status: status.as_u16(),
            message,
        })
    } else {
        Ok(resp)
    }
}

/// The values endpoint mixes strings, numbers, and booleans depending on
/// cell formatting; the normalizer expects text cells only.
fn stringify_cell(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Extract the spreadsheet id from a shared Google Sheets URL, e.g.
/// `https://docs.google.com/spreadsheets/d/<id>/edit#gid=0`. A bare id
/// (no slashes) passes through unchanged.
pub fn spreadsheet_id_from_url(url: &str) -> Option<String> {
    if !url.contains('/') {
        return Some(url.to_string());
    }
    let mut segments = url.split('/');
    segments
        .by_ref()
        .find(|s| *s == "d")
        .and_then(|_| segments.next())
        .filter(|id| !id.is_empty())
        .map(|id| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spreadsheet_id_from_share_url() {
        let url = "https://docs.google.com/spreadsheets/d/1AbC_dEf-123/edit#gid=0";
        assert_eq!(
            spreadsheet_id_from_url(url).as_deref(),
            Some("1AbC_dEf-123")
        );
    }

    #[test]
    fn test_spreadsheet_id_from_bare_id() {
        assert_eq!(
            spreadsheet_id_from_url("1AbC_dEf-123").as_deref(),
            Some("1AbC_dEf-123")
        );
    }

    #[test]
    fn test_spreadsheet_id_missing() {
        assert!(spreadsheet_id_from_url("https://example.com/no/sheet/here").is_none());
    }

    #[test]
    fn test_metadata_deserialization() {
        let json = r#"{
            "sheets": [
                {"properties": {"title": "Sprint 12"}},
                {"properties": {"title": "Backlog"}}
            ]
        }"#;
        let meta: SpreadsheetMeta = serde_json::from_str(json).unwrap();
        let titles: Vec<&str> = meta
            .sheets
            .iter()
            .map(|s| s.properties.title.as_str())
            .collect();
        assert_eq!(titles, vec!["Sprint 12", "Backlog"]);
    }

    #[test]
    fn test_batch_get_deserialization_mixed_cells() {
        let json = r#"{
            "valueRanges": [{
                "range": "Sprint 12!A1:C3",
                "majorDimension": "ROWS",
                "values": [["Task", "Estimate"], ["A", 3.5], ["B", true]]
            }]
        }"#;
        let body: BatchGetResponse = serde_json::from_str(json).unwrap();
        let grid: RawGrid = body.value_ranges[0]
            .values
            .clone()
            .into_iter()
            .map(|row| row.into_iter().map(stringify_cell).collect())
            .collect();

        assert_eq!(grid[0], vec!["Task", "Estimate"]);
        assert_eq!(grid[1], vec!["A", "3.5"]);
        assert_eq!(grid[2], vec!["B", "true"]);
    }

    #[test]
    fn test_batch_get_missing_values_is_empty_grid() {
        let json = r#"{"valueRanges": [{"range": "Empty!A1:Z1000"}]}"#;
        let body: BatchGetResponse = serde_json::from_str(json).unwrap();
        assert!(body.value_ranges[0].values.is_empty());
    }
}
