use crate::{
    a1::{
        column_range,
        row_range,
    },
    credentials::ServiceAccountKey,
    CellValue,
    Error,
    Result,
};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com/";

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Root of the Sheets API, `https://sheets.googleapis.com/` unless testing.
    pub api_base: Url,
    /// Applied to every HTTP request, including the token exchange.
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            api_base: Url::parse(DEFAULT_API_BASE).expect("valid default API base"),
            timeout: Duration::from_secs(60),
        }
    }
}

/// An authorized Sheets API client.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    api_base: Url,
    token: String,
}

#[derive(Debug, Clone)]
pub struct Spreadsheet {
    client: Client,
    id: String,
    titles: Vec<String>,
}

/// One tab of a spreadsheet.
#[derive(Debug, Clone)]
pub struct Worksheet {
    client: Client,
    spreadsheet_id: String,
    title: String,
}

#[derive(Deserialize)]
struct SpreadsheetMetadata {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

impl Client {
    pub async fn authorize(key: &ServiceAccountKey, options: ClientOptions) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(options.timeout).build()?;
        let token = key.fetch_token(&http).await?;
        debug!(expires_at = %token.expires_at, "authorized service account");
        Ok(Self {
            http,
            api_base: options.api_base,
            token: token.token,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Url(self.api_base.to_string()))?
            .pop_if_empty()
            .push("v4")
            .push("spreadsheets")
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, method: &'static str, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let request = request.bearer_auth(&self.token).build()?;
        let url = request.url().to_string();
        trace!(method, %url, "sheets request");

        let response = self.http.execute(request).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::Status {
            method,
            url,
            status,
            body,
        })
    }

    /// Open a spreadsheet by the key found in its URL (`/spreadsheets/d/<key>/edit`).
    pub async fn open_by_key(&self, key: &str) -> Result<Spreadsheet> {
        let url = self.url(&[key])?;
        let request = self
            .http
            .get(url)
            .query(&[("fields", "sheets.properties.title")]);
        let metadata: SpreadsheetMetadata = self.send("GET", request).await?.json().await?;

        Ok(Spreadsheet {
            client: self.clone(),
            id: key.to_string(),
            titles: metadata.sheets.into_iter().map(|s| s.properties.title).collect(),
        })
    }
}

impl Spreadsheet {
    pub fn worksheet(&self, title: &str) -> Result<Worksheet> {
        if !self.titles.iter().any(|t| t == title) {
            return Err(Error::WorksheetNotFound(title.to_string()));
        }
        Ok(Worksheet {
            client: self.client.clone(),
            spreadsheet_id: self.id.clone(),
            title: title.to_string(),
        })
    }
}

impl Worksheet {
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Values of a column (1-based) from the first row down to the last non-empty cell.
    /// Blank cells in between come back as empty strings.
    pub async fn col_values(&self, column: u32) -> Result<Vec<String>> {
        let range = column_range(&self.title, column);
        let url = self.client.url(&[&self.spreadsheet_id, "values", &range])?;
        let request = self.client.http.get(url).query(&[("majorDimension", "COLUMNS")]);
        let values: ValueRange = self.client.send("GET", request).await?.json().await?;

        let column = values.values.into_iter().next().unwrap_or_default();
        Ok(column
            .into_iter()
            .map(|value| match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            })
            .collect())
    }

    /// Write `cells` into `row` starting at column A as one request, letting the sheet parse the
    /// values as if they were typed in (`USER_ENTERED`).
    pub async fn update_row(&self, row: u32, cells: &[CellValue]) -> Result<()> {
        let range = row_range(&self.title, row, cells.len() as u32);
        let url = self.client.url(&[&self.spreadsheet_id, "values", &range])?;
        let request = self
            .client
            .http
            .put(url)
            .query(&[("valueInputOption", "USER_ENTERED")])
            .json(&json!({
                "range": range,
                "majorDimension": "ROWS",
                "values": [cells],
            }));
        self.client.send("PUT", request).await?;
        debug!(worksheet = %self.title, %range, "updated cells");
        Ok(())
    }
}
