//! Spreadsheet backend port
//!
//! Range reads return plain string grids. The directory fetcher reads the
//! task sheet through this port; the resolver uses it to enumerate and
//! read every tab of a referenced spreadsheet.

use crate::error::OriginError;
use crate::origin::HttpClient;
use crate::relay::percent_encode;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt::Debug;
use std::sync::Arc;

/// Cell grid, row-major
pub type Grid = Vec<Vec<String>>;

/// Read access to a spreadsheet host
#[async_trait]
pub trait SheetsBackend: Debug + Send + Sync {
    /// Titles of every tab, in display order
    async fn sheet_titles(&self, spreadsheet_id: &str) -> Result<Vec<String>, OriginError>;

    /// Cell values of `range` (A1 notation, optionally prefixed by a tab title)
    async fn values(&self, spreadsheet_id: &str, range: &str) -> Result<Grid, OriginError>;
}

/// Sheets v4 REST adapter
#[derive(Debug, Clone)]
pub struct SheetsApiClient {
    http: Arc<dyn HttpClient>,
    api_key: String,
    base_url: String,
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
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

fn cell_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl SheetsApiClient {
    /// Public Sheets v4 endpoint
    pub const DEFAULT_BASE_URL: &'static str = "https://sheets.googleapis.com/v4/spreadsheets";

    /// Create adapter with an API key
    #[must_use]
    pub fn new(http: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
        }
    }

    /// With alternative endpoint
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Metadata URL listing tab titles
    #[must_use]
    pub fn metadata_url(&self, spreadsheet_id: &str) -> String {
        format!(
            "{}/{}?fields=sheets.properties.title&key={}",
            self.base_url, spreadsheet_id, self.api_key
        )
    }

    /// Values URL for a range
    #[must_use]
    pub fn values_url(&self, spreadsheet_id: &str, range: &str) -> String {
        format!(
            "{}/{}/values/{}?key={}",
            self.base_url,
            spreadsheet_id,
            percent_encode(range),
            self.api_key
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, OriginError> {
        let response = self.http.get(url).await?.error_for_status(url)?;
        serde_json::from_slice(&response.body).map_err(|e| OriginError::decode(url, e.to_string()))
    }
}

#[async_trait]
impl SheetsBackend for SheetsApiClient {
    async fn sheet_titles(&self, spreadsheet_id: &str) -> Result<Vec<String>, OriginError> {
        let meta: SpreadsheetMeta = self.get_json(&self.metadata_url(spreadsheet_id)).await?;
        Ok(meta.sheets.into_iter().map(|s| s.properties.title).collect())
    }

    async fn values(&self, spreadsheet_id: &str, range: &str) -> Result<Grid, OriginError> {
        let body: ValueRange = self.get_json(&self.values_url(spreadsheet_id, range)).await?;
        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }
}

/// A1 range covering a whole tab
#[must_use]
pub fn whole_tab_range(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}
